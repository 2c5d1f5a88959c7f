//! Per-measurement configuration.

use crate::resolution::ResolutionLevel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of a single measurement.
///
/// Absent keys fall back to their defaults, so `{}` deserializes to a
/// measurement that keeps every level down to `Day`. The `resolution` key is
/// accepted as an alias for `max_resolution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Coarsest resolution level maintained.
    ///
    /// Default: `Day`
    #[serde(alias = "resolution")]
    pub max_resolution: ResolutionLevel,

    /// Largest allowed time gap between consecutive raw points.
    ///
    /// A single append across a long gap emits one rollup point per completed
    /// period for every kept level; setting this bounds that work.
    ///
    /// Default: unbounded
    pub max_gap: Option<Duration>,
}

impl MeasurementConfig {
    /// Creates a configuration keeping levels up to `max_resolution`.
    pub fn new(max_resolution: ResolutionLevel) -> Self {
        Self {
            max_resolution,
            ..Self::default()
        }
    }

    /// Sets the largest allowed gap between consecutive raw points.
    #[must_use]
    pub fn with_max_gap(mut self, max_gap: Duration) -> Self {
        self.max_gap = Some(max_gap);
        self
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            max_resolution: ResolutionLevel::Day,
            max_gap: None,
        }
    }
}

/// Declaration of a named measurement owned by a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementSpec {
    /// Name of the measurement, unique within its host.
    pub name: String,
    /// Configuration of the measurement.
    #[serde(default)]
    pub config: MeasurementConfig,
}

impl MeasurementSpec {
    /// Creates a declaration with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: MeasurementConfig::default(),
        }
    }

    /// Replaces the configuration of this declaration.
    #[must_use]
    pub fn with_config(mut self, config: MeasurementConfig) -> Self {
        self.config = config;
        self
    }
}
