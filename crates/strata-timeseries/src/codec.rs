//! Binary document format for a whole [`Host`].
//!
//! Layout (integers big-endian):
//!
//! ```text
//! version u8 | encoding tag u8 | id | measurement count u32 | measurements | observations
//!
//! measurement  = name | max_resolution u8 | max_gap | last | series per kept level
//! max_gap      = 0u8 | 1u8 secs u64 nanos u32
//! last         = 0u8 | 1u8 point
//! observations = count u32 | (name | first point | current point)*
//! string       = len u32 | utf-8 bytes
//! ```
//!
//! Single points are written with [`AbsoluteEncoding::encode_point`]; series use
//! the document's [`PointEncoding`].

use crate::config::MeasurementConfig;
use crate::encoding::{AbsoluteEncoding, EncodingError, PointEncoding};
use crate::host::{Host, ObservationSummary, Observations};
use crate::measurement::Measurement;
use crate::point::Point;
use crate::resolution::ResolutionLevel;
use std::time::Duration;

const FORMAT_VERSION: u8 = 1;
const POINT_SIZE: usize = 20;

/// Serializes `host` with series encoded by `E`.
pub fn encode_host<E: PointEncoding>(host: &Host) -> Result<Vec<u8>, EncodingError> {
    let mut buf = vec![FORMAT_VERSION, E::TAG];
    write_str(host.id(), &mut buf)?;
    write_len(host.measurements().len(), &mut buf)?;

    for measurement in host.measurements() {
        write_str(measurement.name(), &mut buf)?;
        buf.push(index_byte(measurement.max_resolution()));

        match measurement.config().max_gap {
            Some(gap) => {
                buf.push(1);
                buf.extend_from_slice(&gap.as_secs().to_be_bytes());
                buf.extend_from_slice(&gap.subsec_nanos().to_be_bytes());
            }
            None => buf.push(0),
        }

        write_optional_point(measurement.last(), &mut buf);

        for points in &measurement.series {
            E::encode(points, &mut buf);
        }
    }

    write_len(host.observations().len(), &mut buf)?;
    for (name, summary) in host.observations().iter() {
        write_str(name, &mut buf)?;
        AbsoluteEncoding::encode_point(&summary.first, &mut buf);
        AbsoluteEncoding::encode_point(&summary.current, &mut buf);
    }

    Ok(buf)
}

/// Reads a document written by [`encode_host`] with the same `E`.
///
/// Every measurement invariant is re-checked on the way in.
pub fn decode_host<E: PointEncoding>(bytes: &[u8]) -> Result<Host, EncodingError> {
    let mut reader = Reader::new(bytes);

    let version = reader.u8()?;
    if version != FORMAT_VERSION {
        return Err(EncodingError::InvalidData(format!(
            "Unsupported host format version {version}"
        )));
    }
    let tag = reader.u8()?;
    if tag != E::TAG {
        return Err(EncodingError::InvalidData(format!(
            "Series encoded with tag {tag}, expected {}",
            E::TAG
        )));
    }

    let id = reader.string()?;
    let count = reader.u32()?;
    let mut measurements = Vec::new();
    for _ in 0..count {
        measurements.push(reader.measurement::<E>()?);
    }

    let count = reader.u32()?;
    let mut observations = Observations::new();
    for _ in 0..count {
        let name = reader.string()?;
        let first = reader.point()?;
        let current = reader.point()?;
        observations.insert(name, ObservationSummary { first, current });
    }

    if reader.remaining() != 0 {
        return Err(EncodingError::InvalidData(format!(
            "{} trailing bytes after host {id}",
            reader.remaining()
        )));
    }

    Host::from_parts(id, measurements, observations)
}

fn index_byte(level: ResolutionLevel) -> u8 {
    match level {
        ResolutionLevel::Raw => 0,
        ResolutionLevel::Year => 1,
        ResolutionLevel::Month => 2,
        ResolutionLevel::Week => 3,
        ResolutionLevel::Day => 4,
    }
}

fn write_len(len: usize, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
    let len = u32::try_from(len)
        .map_err(|_| EncodingError::InvalidData(format!("Length {len} exceeds u32")))?;
    buf.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_str(s: &str, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
    write_len(s.len(), buf)?;
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn write_optional_point(point: Option<Point>, buf: &mut Vec<u8>) {
    match point {
        Some(point) => {
            buf.push(1);
            AbsoluteEncoding::encode_point(&point, buf);
        }
        None => buf.push(0),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], EncodingError> {
        if self.remaining() < len {
            return Err(EncodingError::InvalidData(format!(
                "Unexpected end of host data at offset {}: need {} bytes, {} left",
                self.offset,
                len,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], EncodingError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, EncodingError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, EncodingError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, EncodingError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn flag(&mut self) -> Result<bool, EncodingError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(EncodingError::InvalidData(format!("Invalid flag byte {other}"))),
        }
    }

    fn string(&mut self) -> Result<String, EncodingError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| EncodingError::InvalidData(format!("Invalid UTF-8 string: {e}")))
    }

    fn point(&mut self) -> Result<Point, EncodingError> {
        AbsoluteEncoding::decode_point(self.take(POINT_SIZE)?)
    }

    fn points<E: PointEncoding>(&mut self) -> Result<Vec<Point>, EncodingError> {
        let (points, used) = E::decode(&self.bytes[self.offset..])?;
        self.offset += used;
        Ok(points)
    }

    fn measurement<E: PointEncoding>(&mut self) -> Result<Measurement, EncodingError> {
        let name = self.string()?;

        let index = self.u8()?;
        let max_resolution = ResolutionLevel::from_index(usize::from(index)).ok_or_else(|| {
            EncodingError::InvalidData(format!("Invalid resolution index {index} for {name}"))
        })?;

        let max_gap = if self.flag()? {
            let secs = self.u64()?;
            let nanos = self.u32()?;
            if nanos >= 1_000_000_000 {
                return Err(EncodingError::InvalidData(format!(
                    "Invalid max gap nanoseconds {nanos} for {name}"
                )));
            }
            Some(Duration::new(secs, nanos))
        } else {
            None
        };

        let last = if self.flag()? { Some(self.point()?) } else { None };

        let mut series = Vec::with_capacity(max_resolution.index() + 1);
        for _ in max_resolution.up_to() {
            series.push(self.points::<E>()?);
        }

        let config = MeasurementConfig {
            max_resolution,
            max_gap,
        };
        Measurement::from_parts(name, config, series, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeasurementSpec;
    use crate::encoding::DeltaEncoding;
    use chrono::{DateTime, TimeZone, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn sample_host() -> Host {
        let mut host = Host::with_measurements(
            "AAPL",
            [
                MeasurementSpec::new("price"),
                MeasurementSpec::new("volume").with_config(
                    MeasurementConfig::new(ResolutionLevel::Week)
                        .with_max_gap(Duration::from_secs(90 * 86_400)),
                ),
                MeasurementSpec::new("unused")
                    .with_config(MeasurementConfig::new(ResolutionLevel::Raw)),
            ],
        )
        .unwrap();

        for (day, value) in [(1, 1000), (3, 1500), (20, 900), (45, 2000)] {
            let t = utc(2000, 1, 1, 9) + chrono::TimeDelta::days(day);
            host.append("price", t, value).unwrap();
            host.append("volume", t, value * 10).unwrap();
        }
        host
    }

    #[test]
    fn test_host_document_with_delta_series() {
        let host = sample_host();
        let bytes = encode_host::<DeltaEncoding>(&host).unwrap();
        let decoded = decode_host::<DeltaEncoding>(&bytes).unwrap();
        assert_eq!(decoded, host);
    }

    #[test]
    fn test_host_document_with_absolute_series() {
        let host = sample_host();
        let bytes = encode_host::<AbsoluteEncoding>(&host).unwrap();
        let decoded = decode_host::<AbsoluteEncoding>(&bytes).unwrap();
        assert_eq!(decoded, host);
    }

    #[test]
    fn test_mismatched_encoding_is_rejected() {
        let bytes = encode_host::<DeltaEncoding>(&sample_host()).unwrap();
        let err = decode_host::<AbsoluteEncoding>(&bytes).unwrap_err();
        assert!(err.to_string().contains("tag"));
    }

    #[test]
    fn test_truncated_document_is_rejected() {
        let bytes = encode_host::<DeltaEncoding>(&sample_host()).unwrap();
        for len in [0, 1, 2, 10, bytes.len() / 2, bytes.len() - 1] {
            assert!(decode_host::<DeltaEncoding>(&bytes[..len]).is_err());
        }
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = encode_host::<DeltaEncoding>(&sample_host()).unwrap();
        bytes.push(0);
        assert!(decode_host::<DeltaEncoding>(&bytes).is_err());
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut bytes = encode_host::<DeltaEncoding>(&Host::new("empty")).unwrap();
        bytes[0] = 99;
        let err = decode_host::<DeltaEncoding>(&bytes).unwrap_err();
        assert!(err.to_string().contains("version"));
    }
}
