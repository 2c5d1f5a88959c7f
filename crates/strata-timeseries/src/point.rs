//! Timestamped observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single `(timestamp, value)` observation or rollup point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Instant of the observation, or the period start for rollup points.
    pub timestamp: DateTime<Utc>,
    /// Observed or interpolated value.
    pub value: i64,
}

impl Point {
    /// Creates a new point.
    pub fn new(timestamp: DateTime<Utc>, value: i64) -> Self {
        Self { timestamp, value }
    }
}

impl From<(DateTime<Utc>, i64)> for Point {
    fn from((timestamp, value): (DateTime<Utc>, i64)) -> Self {
        Self { timestamp, value }
    }
}

impl From<Point> for (DateTime<Utc>, i64) {
    fn from(point: Point) -> Self {
        (point.timestamp, point.value)
    }
}
