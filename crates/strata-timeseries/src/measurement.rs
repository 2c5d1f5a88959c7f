//! Measurement data model with multi-resolution support.

use crate::config::MeasurementConfig;
use crate::encoding::EncodingError;
use crate::point::Point;
use crate::resolution::ResolutionLevel;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// A named series of observations together with its rollups.
///
/// A measurement keeps one ordered point sequence per resolution level, from
/// `Raw` up to and including its configured `max_resolution`. Coarser levels are
/// absent rather than empty. Points are only ever added through
/// [`Measurement::append`](crate::engine); existing points are never changed or
/// removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    name: String,
    config: MeasurementConfig,
    /// Indexed by [`ResolutionLevel::index`]; always `max_resolution.index() + 1` long.
    pub(crate) series: Vec<Vec<Point>>,
    pub(crate) last: Option<Point>,
}

impl Measurement {
    /// Creates an empty measurement.
    pub fn new(name: impl Into<String>, config: MeasurementConfig) -> Self {
        let levels = config.max_resolution.index() + 1;
        Self {
            name: name.into(),
            config,
            series: vec![Vec::new(); levels],
            last: None,
        }
    }

    /// Rebuilds a measurement from previously stored parts, checking every invariant.
    ///
    /// `series` must hold one sequence per level from `Raw` through
    /// `config.max_resolution`.
    pub fn from_parts(
        name: impl Into<String>,
        config: MeasurementConfig,
        series: Vec<Vec<Point>>,
        last: Option<Point>,
    ) -> Result<Self, EncodingError> {
        let measurement = Self {
            name: name.into(),
            config,
            series,
            last,
        };
        measurement.check_invariants()?;
        Ok(measurement)
    }

    /// Returns the name of this measurement.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration of this measurement.
    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    /// Returns the coarsest level kept by this measurement.
    pub fn max_resolution(&self) -> ResolutionLevel {
        self.config.max_resolution
    }

    /// Returns the levels kept by this measurement, finest first.
    pub fn levels(&self) -> &'static [ResolutionLevel] {
        self.config.max_resolution.up_to()
    }

    /// Returns `true` if `level` is kept by this measurement.
    pub fn has_level(&self, level: ResolutionLevel) -> bool {
        level <= self.config.max_resolution
    }

    /// Returns the most recently appended raw point.
    pub fn last(&self) -> Option<Point> {
        self.last
    }

    /// Returns the number of raw points.
    pub fn len(&self) -> usize {
        self.series[ResolutionLevel::Raw.index()].len()
    }

    /// Returns `true` if nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    pub(crate) fn points(&self, level: ResolutionLevel) -> Option<&[Point]> {
        self.series.get(level.index()).map(Vec::as_slice)
    }

    fn check_invariants(&self) -> Result<(), EncodingError> {
        let expected = self.config.max_resolution.index() + 1;
        if self.series.len() != expected {
            return Err(EncodingError::InvalidData(format!(
                "{}: expected {} series for max resolution {}, got {}",
                self.name,
                expected,
                self.config.max_resolution,
                self.series.len()
            )));
        }

        for (level, points) in self.levels().iter().zip(&self.series) {
            if points
                .windows(2)
                .any(|pair| pair[0].timestamp >= pair[1].timestamp)
            {
                return Err(EncodingError::InvalidData(format!(
                    "{}: {} series is not strictly increasing",
                    self.name, level
                )));
            }

            if let Some(period) = level.period() {
                if let Some(point) = points
                    .iter()
                    .find(|point| period.period_start(point.timestamp) != point.timestamp)
                {
                    return Err(EncodingError::InvalidData(format!(
                        "{}: {} point at {} is not a period start",
                        self.name, level, point.timestamp
                    )));
                }
            }
        }

        let raw_last = self.series[ResolutionLevel::Raw.index()].last().copied();
        if raw_last != self.last {
            return Err(EncodingError::InvalidData(format!(
                "{}: last point does not match the final raw point",
                self.name
            )));
        }

        Ok(())
    }
}

/// Serializes every kept level, keyed by level name.
struct SeriesView<'a>(&'a Measurement);

impl Serialize for SeriesView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.series.len()))?;
        for (level, points) in self.0.levels().iter().zip(&self.0.series) {
            map.serialize_entry(level.name(), points)?;
        }
        map.end()
    }
}

impl Serialize for Measurement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Measurement", 4)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("config", &self.config)?;
        state.serialize_field("last", &self.last)?;
        state.serialize_field("series", &SeriesView(self))?;
        state.end()
    }
}
