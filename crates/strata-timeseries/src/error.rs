//! Errors raised by measurements, hosts and their persistence.

use crate::encoding::EncodingError;
use crate::resolution::{ParseResolutionError, ResolutionLevel};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::time::Duration;
use strata::StorageError;

/// Error type for time series operations.
#[derive(Debug)]
#[non_exhaustive]
pub enum TimeSeriesError {
    /// An append was not strictly later than the last raw point.
    ///
    /// The measurement is left unchanged.
    OutOfOrderAppend {
        /// Name of the measurement.
        measurement: String,
        /// Timestamp of the last accepted raw point.
        last: DateTime<Utc>,
        /// Timestamp of the rejected point.
        attempted: DateTime<Utc>,
    },
    /// A level coarser than the measurement's `max_resolution` was requested.
    UnsupportedResolution {
        /// Name of the measurement.
        measurement: String,
        /// Requested level.
        requested: ResolutionLevel,
        /// Coarsest level kept by the measurement.
        max_resolution: ResolutionLevel,
    },
    /// Interpolation or period arithmetic left the representable range.
    ///
    /// The measurement is left unchanged.
    ArithmeticOverflow {
        /// Name of the measurement.
        measurement: String,
        /// Level being rolled up when the overflow occurred.
        level: ResolutionLevel,
    },
    /// The gap since the last raw point exceeds the configured `max_gap`.
    ///
    /// The measurement is left unchanged.
    GapTooLarge {
        /// Name of the measurement.
        measurement: String,
        /// Gap between the last raw point and the rejected one.
        gap: TimeDelta,
        /// Configured limit.
        max_gap: Duration,
    },
    /// The host owns no measurement with this name.
    UnknownMeasurement(String),
    /// The host already owns a measurement with this name.
    DuplicateMeasurement(String),
    /// A resolution string could not be parsed.
    InvalidResolution(ParseResolutionError),
    /// Encoded series data could not be read back.
    Encoding(EncodingError),
    /// The backing record store failed.
    Storage(StorageError),
}

impl fmt::Display for TimeSeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfOrderAppend {
                measurement,
                last,
                attempted,
            } => write!(
                f,
                "Out of order append to {measurement}: {attempted} is not after {last}"
            ),
            Self::UnsupportedResolution {
                measurement,
                requested,
                max_resolution,
            } => write!(
                f,
                "Resolution {requested} is not kept by {measurement} (max resolution {max_resolution})"
            ),
            Self::ArithmeticOverflow { measurement, level } => {
                write!(f, "Arithmetic overflow rolling up {measurement} at {level}")
            }
            Self::GapTooLarge {
                measurement,
                gap,
                max_gap,
            } => write!(
                f,
                "Gap of {gap} in {measurement} exceeds the maximum of {max_gap:?}"
            ),
            Self::UnknownMeasurement(name) => write!(f, "Unknown measurement: {name}"),
            Self::DuplicateMeasurement(name) => write!(f, "Measurement already exists: {name}"),
            Self::InvalidResolution(err) => write!(f, "{err}"),
            Self::Encoding(err) => write!(f, "Encoding error: {err}"),
            Self::Storage(err) => write!(f, "Storage error: {err}"),
        }
    }
}

impl std::error::Error for TimeSeriesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidResolution(err) => Some(err),
            Self::Encoding(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseResolutionError> for TimeSeriesError {
    fn from(err: ParseResolutionError) -> Self {
        Self::InvalidResolution(err)
    }
}

impl From<EncodingError> for TimeSeriesError {
    fn from(err: EncodingError) -> Self {
        Self::Encoding(err)
    }
}

impl From<StorageError> for TimeSeriesError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}
