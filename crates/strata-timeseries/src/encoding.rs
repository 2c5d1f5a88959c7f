//! Binary encoding strategies for point sequences.

use crate::point::Point;
use chrono::{DateTime, Utc};
use std::io;

/// Error type for encoding/decoding operations.
#[derive(Debug)]
pub enum EncodingError {
    /// Invalid encoded data.
    InvalidData(String),
    /// IO error during encoding/decoding.
    Io(io::Error),
}

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidData(msg) => write!(f, "Invalid encoded data: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for EncodingError {}

impl From<io::Error> for EncodingError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Trait for encoding point sequences into a compact byte representation.
///
/// Different encoding strategies optimize for different use cases:
/// - `AbsoluteEncoding`: Fixed width, trivially seekable
/// - `DeltaEncoding`: Space-efficient for dense, regular series
///
/// Every strategy round-trips instants to the nanosecond and values exactly.
pub trait PointEncoding: Send + Sync {
    /// Tag stored alongside encoded data so a reader can reject a mismatched strategy.
    const TAG: u8;

    /// Appends `points` (prefixed with their count) to `buf`.
    fn encode(points: &[Point], buf: &mut Vec<u8>);

    /// Decodes a sequence written by [`PointEncoding::encode`].
    ///
    /// Returns the points and the number of bytes consumed.
    fn decode(bytes: &[u8]) -> Result<(Vec<Point>, usize), EncodingError>;
}

/// Absolute encoding: every point is stored as big-endian seconds, nanoseconds and value.
///
/// **Characteristics:**
/// - Fixed 20-byte encoding per point after an 8-byte count
/// - Fast encoding/decoding
/// - Any point can be located directly by offset
#[derive(Debug, Clone, Copy)]
pub struct AbsoluteEncoding;

/// Size of one point under [`AbsoluteEncoding`].
const ABSOLUTE_POINT_SIZE: usize = 8 + 4 + 8;

impl AbsoluteEncoding {
    /// Writes a single point.
    pub fn encode_point(point: &Point, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&point.timestamp.timestamp().to_be_bytes());
        buf.extend_from_slice(&point.timestamp.timestamp_subsec_nanos().to_be_bytes());
        buf.extend_from_slice(&point.value.to_be_bytes());
    }

    /// Reads a single point.
    pub fn decode_point(bytes: &[u8]) -> Result<Point, EncodingError> {
        if bytes.len() < ABSOLUTE_POINT_SIZE {
            return Err(EncodingError::InvalidData(format!(
                "Expected {} bytes for a point, got {}",
                ABSOLUTE_POINT_SIZE,
                bytes.len()
            )));
        }
        let secs = i64::from_be_bytes(array(&bytes[0..8])?);
        let nanos = u32::from_be_bytes(array(&bytes[8..12])?);
        let value = i64::from_be_bytes(array(&bytes[12..20])?);
        Ok(Point::new(timestamp(secs, nanos)?, value))
    }
}

impl PointEncoding for AbsoluteEncoding {
    const TAG: u8 = 1;

    fn encode(points: &[Point], buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(points.len() as u64).to_be_bytes());
        for point in points {
            Self::encode_point(point, buf);
        }
    }

    fn decode(bytes: &[u8]) -> Result<(Vec<Point>, usize), EncodingError> {
        if bytes.len() < 8 {
            return Err(EncodingError::InvalidData(
                "Truncated point count".to_string(),
            ));
        }
        let count = u64::from_be_bytes(array(&bytes[0..8])?);
        let count = usize::try_from(count)
            .map_err(|_| EncodingError::InvalidData(format!("Point count {count} too large")))?;
        let body = count
            .checked_mul(ABSOLUTE_POINT_SIZE)
            .filter(|len| 8 + len <= bytes.len())
            .ok_or_else(|| {
                EncodingError::InvalidData(format!(
                    "Expected {} points, only {} bytes available",
                    count,
                    bytes.len() - 8
                ))
            })?;

        let points = bytes[8..8 + body]
            .chunks_exact(ABSOLUTE_POINT_SIZE)
            .map(Self::decode_point)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((points, 8 + body))
    }
}

/// Delta encoding with zigzag varint compression.
///
/// **Encoding format:**
/// - Point count as a varint
/// - Per point: zigzag varint of the seconds delta from the previous point,
///   varint of the sub-second nanoseconds, zigzag varint of the value delta
/// - The first point is encoded as a delta from zero
///
/// **Characteristics:**
/// - Variable-length encoding (3 to 30 bytes per point)
/// - Rollup series (exact period starts, slowly moving values) shrink to a few
///   bytes per point
/// - Sequential decode only
#[derive(Debug, Clone, Copy)]
pub struct DeltaEncoding;

impl DeltaEncoding {
    /// Encodes a value using unsigned varint encoding.
    pub fn encode_varint(value: u64, buf: &mut Vec<u8>) {
        let mut n = value;
        while n >= 0x80 {
            buf.push((n as u8) | 0x80);
            n >>= 7;
        }
        buf.push(n as u8);
    }

    /// Decodes a varint from bytes, returning (value, bytes_consumed).
    pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize), EncodingError> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;

        for (i, &byte) in bytes.iter().enumerate() {
            if shift >= 64 {
                return Err(EncodingError::InvalidData("Varint overflow".to_string()));
            }

            let value = u64::from(byte & 0x7F);
            result |= value << shift;

            if (byte & 0x80) == 0 {
                return Ok((result, i + 1));
            }

            shift += 7;
        }

        Err(EncodingError::InvalidData("Incomplete varint".to_string()))
    }

    /// Maps signed integers onto unsigned ones so small magnitudes stay small.
    pub fn zigzag(value: i64) -> u64 {
        ((value << 1) ^ (value >> 63)) as u64
    }

    /// Inverse of [`DeltaEncoding::zigzag`].
    pub fn unzigzag(value: u64) -> i64 {
        ((value >> 1) as i64) ^ -((value & 1) as i64)
    }
}

impl PointEncoding for DeltaEncoding {
    const TAG: u8 = 2;

    fn encode(points: &[Point], buf: &mut Vec<u8>) {
        Self::encode_varint(points.len() as u64, buf);

        let mut prev_secs = 0i64;
        let mut prev_value = 0i64;
        for point in points {
            let secs = point.timestamp.timestamp();
            // Wrapping keeps extreme deltas lossless; decode wraps back.
            Self::encode_varint(Self::zigzag(secs.wrapping_sub(prev_secs)), buf);
            Self::encode_varint(u64::from(point.timestamp.timestamp_subsec_nanos()), buf);
            Self::encode_varint(Self::zigzag(point.value.wrapping_sub(prev_value)), buf);
            prev_secs = secs;
            prev_value = point.value;
        }
    }

    fn decode(bytes: &[u8]) -> Result<(Vec<Point>, usize), EncodingError> {
        let (count, mut offset) = Self::decode_varint(bytes)?;

        let mut points = Vec::new();
        let mut secs = 0i64;
        let mut value = 0i64;
        for _ in 0..count {
            let (secs_delta, used) = Self::decode_varint(&bytes[offset..])?;
            offset += used;
            let (nanos, used) = Self::decode_varint(&bytes[offset..])?;
            offset += used;
            let (value_delta, used) = Self::decode_varint(&bytes[offset..])?;
            offset += used;

            secs = secs.wrapping_add(Self::unzigzag(secs_delta));
            value = value.wrapping_add(Self::unzigzag(value_delta));
            let nanos = u32::try_from(nanos)
                .map_err(|_| EncodingError::InvalidData(format!("Invalid nanoseconds: {nanos}")))?;
            points.push(Point::new(timestamp(secs, nanos)?, value));
        }

        Ok((points, offset))
    }
}

fn array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], EncodingError> {
    bytes
        .try_into()
        .map_err(|_| EncodingError::InvalidData("Failed to convert bytes to array".to_string()))
}

fn timestamp(secs: i64, nanos: u32) -> Result<DateTime<Utc>, EncodingError> {
    DateTime::from_timestamp(secs, nanos).ok_or_else(|| {
        EncodingError::InvalidData(format!("Timestamp out of range: {secs}s {nanos}ns"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn sample() -> Vec<Point> {
        let start = Utc.with_ymd_and_hms(2000, 1, 1, 6, 0, 0).unwrap();
        vec![
            Point::new(start, 1000),
            Point::new(start + TimeDelta::hours(6), 2000),
            Point::new(start + TimeDelta::nanoseconds(86_400_000_000_123), -3000),
            Point::new(start + TimeDelta::days(400), i64::MAX),
            Point::new(start + TimeDelta::days(401), i64::MIN),
        ]
    }

    #[test]
    fn test_absolute_encoding() {
        let points = sample();
        let mut buf = Vec::new();
        AbsoluteEncoding::encode(&points, &mut buf);
        assert_eq!(buf.len(), 8 + points.len() * ABSOLUTE_POINT_SIZE);

        let (decoded, used) = AbsoluteEncoding::decode(&buf).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(decoded, points);
    }

    #[test]
    fn test_delta_encoding_preserves_extremes_and_nanos() {
        let points = sample();
        let mut buf = Vec::new();
        DeltaEncoding::encode(&points, &mut buf);

        let (decoded, used) = DeltaEncoding::decode(&buf).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(decoded, points);
        assert_eq!(decoded[2].timestamp.timestamp_subsec_nanos(), 123);
    }

    #[test]
    fn test_delta_encoding_is_compact_for_daily_rollups() {
        let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let points: Vec<Point> = (0..365)
            .map(|day| Point::new(start + TimeDelta::days(day), 5000 + day))
            .collect();

        let mut delta = Vec::new();
        DeltaEncoding::encode(&points, &mut delta);
        let mut absolute = Vec::new();
        AbsoluteEncoding::encode(&points, &mut absolute);

        assert!(delta.len() * 3 < absolute.len());
    }

    #[test]
    fn test_absolute_decode_truncated() {
        let mut buf = Vec::new();
        AbsoluteEncoding::encode(&sample(), &mut buf);
        assert!(AbsoluteEncoding::decode(&buf[..buf.len() - 1]).is_err());
        assert!(AbsoluteEncoding::decode(&buf[..4]).is_err());
    }

    #[test]
    fn test_delta_decode_truncated() {
        let mut buf = Vec::new();
        DeltaEncoding::encode(&sample(), &mut buf);
        assert!(DeltaEncoding::decode(&buf[..buf.len() - 1]).is_err());
    }

    #[test]
    fn test_varint_encoding() {
        let test_cases = vec![
            0u64,
            127,
            128,
            16383,
            16384,
            2_097_151,
            2_097_152,
            268_435_455,
            268_435_456,
            u64::MAX,
        ];

        for value in test_cases {
            let mut buf = Vec::new();
            DeltaEncoding::encode_varint(value, &mut buf);
            let (decoded, consumed) = DeltaEncoding::decode_varint(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(DeltaEncoding::zigzag(0), 0);
        assert_eq!(DeltaEncoding::zigzag(-1), 1);
        assert_eq!(DeltaEncoding::zigzag(1), 2);
        assert_eq!(DeltaEncoding::unzigzag(DeltaEncoding::zigzag(i64::MIN)), i64::MIN);
        assert_eq!(DeltaEncoding::unzigzag(DeltaEncoding::zigzag(i64::MAX)), i64::MAX);
    }

    #[test]
    fn test_encoding_tags_differ() {
        assert_ne!(AbsoluteEncoding::TAG, DeltaEncoding::TAG);
    }
}
