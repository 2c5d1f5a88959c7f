//! Rollup engine: appending observations and reading them back per resolution.
//!
//! Each append walks every kept rollup level, finds the period boundaries that
//! fall between the previous raw point and the new one, and records one point per
//! completed period. The recorded value is the straight-line interpolation of the
//! two raw points at the boundary (the end of the period); the recorded timestamp
//! is the start of that period.

use crate::config::MeasurementConfig;
use crate::error::TimeSeriesError;
use crate::host::ObservationHost;
use crate::measurement::Measurement;
use crate::point::Point;
use crate::resolution::{Period, ResolutionLevel};
use chrono::{DateTime, TimeDelta, Utc};

/// Number of rollup points produced by a single append, per level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    emitted: [usize; ResolutionLevel::ALL.len()],
}

impl AppendOutcome {
    /// Returns how many points `level` received. Always 1 for `Raw`.
    pub fn emitted(&self, level: ResolutionLevel) -> usize {
        self.emitted[level.index()]
    }

    /// Returns the number of rollup points added across all levels (excluding `Raw`).
    pub fn rollup_points(&self) -> usize {
        self.emitted[1..].iter().sum()
    }
}

/// Rollup points computed for one append before anything is written.
struct StagedAppend {
    point: Point,
    rollups: Vec<(Period, Vec<Point>)>,
}

impl Measurement {
    /// Appends an observation and updates every kept rollup level.
    ///
    /// The host is told about the observation afterwards: through
    /// [`ObservationHost::on_first_observation`] if it has no first observation
    /// recorded for this measurement yet, and always through
    /// [`ObservationHost::on_current_observation`].
    ///
    /// Validation and all interpolation happen before any sequence is touched, so
    /// on error the measurement is exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`TimeSeriesError::OutOfOrderAppend`] if `timestamp` is not strictly after
    ///   the last raw point
    /// - [`TimeSeriesError::GapTooLarge`] if a `max_gap` is configured and exceeded
    /// - [`TimeSeriesError::ArithmeticOverflow`] if an interpolated value does not
    ///   fit in an `i64`
    pub fn append<H: ObservationHost + ?Sized>(
        &mut self,
        timestamp: DateTime<Utc>,
        value: i64,
        host: &mut H,
    ) -> Result<AppendOutcome, TimeSeriesError> {
        let staged = self.stage(Point::new(timestamp, value))?;
        let outcome = self.apply(staged);

        if host.first_observation(self.name()).is_none() {
            host.on_first_observation(self.name(), Point::new(timestamp, value));
        }
        host.on_current_observation(self.name(), Point::new(timestamp, value));

        Ok(outcome)
    }

    /// Returns every point recorded at `level`, in timestamp order.
    ///
    /// Reading never modifies the measurement.
    ///
    /// # Errors
    ///
    /// [`TimeSeriesError::UnsupportedResolution`] if `level` is coarser than the
    /// measurement's `max_resolution`.
    pub fn query(&self, level: ResolutionLevel) -> Result<&[Point], TimeSeriesError> {
        self.points(level)
            .ok_or_else(|| TimeSeriesError::UnsupportedResolution {
                measurement: self.name().to_string(),
                requested: level,
                max_resolution: self.max_resolution(),
            })
    }

    /// Returns the points recorded at `level` with `from <= timestamp < to`.
    ///
    /// An empty or inverted range yields an empty slice.
    pub fn query_range(
        &self,
        level: ResolutionLevel,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<&[Point], TimeSeriesError> {
        let points = self.query(level)?;
        if from >= to {
            return Ok(&[]);
        }
        let start = points.partition_point(|point| point.timestamp < from);
        let end = points.partition_point(|point| point.timestamp < to);
        Ok(&points[start..end])
    }

    fn stage(&self, point: Point) -> Result<StagedAppend, TimeSeriesError> {
        let Some(prev) = self.last else {
            return Ok(StagedAppend {
                point,
                rollups: Vec::new(),
            });
        };

        if point.timestamp <= prev.timestamp {
            #[cfg(feature = "logging")]
            log::warn!(
                "Rejecting out of order append to {}: {} <= {}",
                self.name(),
                point.timestamp,
                prev.timestamp
            );
            return Err(TimeSeriesError::OutOfOrderAppend {
                measurement: self.name().to_string(),
                last: prev.timestamp,
                attempted: point.timestamp,
            });
        }

        let gap = point.timestamp - prev.timestamp;
        if let Some(max_gap) = self.config().max_gap {
            let limit = TimeDelta::from_std(max_gap).unwrap_or(TimeDelta::MAX);
            if gap > limit {
                return Err(TimeSeriesError::GapTooLarge {
                    measurement: self.name().to_string(),
                    gap,
                    max_gap,
                });
            }
        }

        let mut rollups = Vec::new();
        for period in self.levels().iter().filter_map(|level| level.period()) {
            let points = self.rollup(period, prev, point)?;
            rollups.push((period, points));
        }

        Ok(StagedAppend { point, rollups })
    }

    /// Interpolated points for every `period` boundary in `(prev, cur]`.
    fn rollup(&self, period: Period, prev: Point, cur: Point) -> Result<Vec<Point>, TimeSeriesError> {
        let overflow = || TimeSeriesError::ArithmeticOverflow {
            measurement: self.name().to_string(),
            level: period.level(),
        };

        let mut points = Vec::new();
        // The first boundary is the end of the period containing `prev`.
        let mut next = period.advance(prev.timestamp);
        while let Some(boundary) = next.filter(|boundary| *boundary <= cur.timestamp) {
            let value = interpolate(prev, cur, boundary).ok_or_else(overflow)?;
            let period_start = period.retreat(boundary).ok_or_else(overflow)?;
            points.push(Point::new(period_start, value));
            next = period.advance(boundary);
        }
        Ok(points)
    }

    fn apply(&mut self, staged: StagedAppend) -> AppendOutcome {
        let mut outcome = AppendOutcome::default();

        self.series[ResolutionLevel::Raw.index()].push(staged.point);
        outcome.emitted[ResolutionLevel::Raw.index()] = 1;

        for (period, points) in staged.rollups {
            let index = period.level().index();
            outcome.emitted[index] = points.len();
            self.series[index].extend(points);
        }

        self.last = Some(staged.point);

        #[cfg(feature = "logging")]
        log::debug!(
            "Appended {} to {} with {} rollup points",
            staged.point.value,
            self.name(),
            outcome.rollup_points()
        );

        outcome
    }
}

/// Value at `at` on the line through `prev` and `cur`, truncated toward zero.
///
/// Evaluates `v1 - (t1 - at) * (v1 - v0) / (t1 - t0)` exactly over nanoseconds in
/// `i128`. `None` if the product or the result does not fit.
fn interpolate(prev: Point, cur: Point, at: DateTime<Utc>) -> Option<i64> {
    let span = nanos(cur.timestamp - prev.timestamp);
    let remaining = nanos(cur.timestamp - at);
    let rise = i128::from(cur.value) - i128::from(prev.value);

    let fall = remaining.checked_mul(rise)?;
    let quotient = fall.checked_div(span)?;
    let remainder = fall.checked_rem(span)?;

    // `span > 0`, so the exact value is `whole - remainder / span` with a
    // fractional part strictly between -1 and 1.
    let whole = i128::from(cur.value) - quotient;
    let value = if remainder > 0 && whole > 0 {
        whole - 1
    } else if remainder < 0 && whole < 0 {
        whole + 1
    } else {
        whole
    };
    i64::try_from(value).ok()
}

fn nanos(delta: TimeDelta) -> i128 {
    i128::from(delta.num_seconds()) * 1_000_000_000 + i128::from(delta.subsec_nanos())
}

/// Creates an empty measurement keeping levels `Raw` through `max_resolution`.
pub fn create_measurement(name: impl Into<String>, max_resolution: ResolutionLevel) -> Measurement {
    Measurement::new(name, MeasurementConfig::new(max_resolution))
}

/// Appends an observation to `measurement`. See [`Measurement::append`].
pub fn append<H: ObservationHost + ?Sized>(
    measurement: &mut Measurement,
    timestamp: DateTime<Utc>,
    value: i64,
    host: &mut H,
) -> Result<AppendOutcome, TimeSeriesError> {
    measurement.append(timestamp, value, host)
}

/// Returns every point of `measurement` at `level`. See [`Measurement::query`].
pub fn query(measurement: &Measurement, level: ResolutionLevel) -> Result<&[Point], TimeSeriesError> {
    measurement.query(level)
}
