//! Hosts: owners of measurements and their first/current observation cache.

use crate::config::{MeasurementConfig, MeasurementSpec};
use crate::encoding::EncodingError;
use crate::engine::AppendOutcome;
use crate::error::TimeSeriesError;
use crate::measurement::Measurement;
use crate::point::Point;
use crate::resolution::ResolutionLevel;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Receiver of observation callbacks from [`Measurement::append`].
///
/// Appending to a measurement asks its host whether a first observation has
/// already been recorded under the measurement's name; if not, the host is handed
/// the new point as the first observation. Every successful append then reports
/// the point as the current observation.
///
/// # Example
///
/// ```rust
/// use strata_timeseries::{create_measurement, ObservationHost, Point, ResolutionLevel};
/// use chrono::{TimeZone, Utc};
///
/// #[derive(Default)]
/// struct Counter {
///     first: Option<Point>,
///     appends: usize,
/// }
///
/// impl ObservationHost for Counter {
///     fn first_observation(&self, _measurement: &str) -> Option<Point> {
///         self.first
///     }
///     fn on_first_observation(&mut self, _measurement: &str, point: Point) {
///         self.first = Some(point);
///     }
///     fn on_current_observation(&mut self, _measurement: &str, _point: Point) {
///         self.appends += 1;
///     }
/// }
///
/// let mut counter = Counter::default();
/// let mut price = create_measurement("price", ResolutionLevel::Day);
/// price.append(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(), 10, &mut counter).unwrap();
/// price.append(Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap(), 20, &mut counter).unwrap();
/// assert_eq!(counter.first.map(|p| p.value), Some(10));
/// assert_eq!(counter.appends, 2);
/// ```
pub trait ObservationHost {
    /// Returns the first observation recorded for `measurement`, if any.
    fn first_observation(&self, measurement: &str) -> Option<Point>;

    /// Called once, on the first append to `measurement`.
    fn on_first_observation(&mut self, measurement: &str, point: Point);

    /// Called on every successful append to `measurement`.
    fn on_current_observation(&mut self, measurement: &str, point: Point);
}

/// First and most recent observation of one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObservationSummary {
    /// The first point ever appended.
    pub first: Point,
    /// The most recently appended point.
    pub current: Point,
}

/// First/current observation cache keyed by measurement name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Observations {
    entries: BTreeMap<String, ObservationSummary>,
}

impl Observations {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the summary for `measurement`.
    pub fn get(&self, measurement: &str) -> Option<&ObservationSummary> {
        self.entries.get(measurement)
    }

    /// Returns the first observation of `measurement`.
    pub fn first(&self, measurement: &str) -> Option<Point> {
        self.get(measurement).map(|summary| summary.first)
    }

    /// Returns the most recent observation of `measurement`.
    pub fn current(&self, measurement: &str) -> Option<Point> {
        self.get(measurement).map(|summary| summary.current)
    }

    /// Iterates over all summaries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObservationSummary)> {
        self.entries.iter().map(|(name, summary)| (name.as_str(), summary))
    }

    /// Returns the number of measurements with at least one observation.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been observed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, measurement: String, summary: ObservationSummary) {
        self.entries.insert(measurement, summary);
    }

    fn remove(&mut self, measurement: &str) {
        self.entries.remove(measurement);
    }
}

impl ObservationHost for Observations {
    fn first_observation(&self, measurement: &str) -> Option<Point> {
        self.first(measurement)
    }

    fn on_first_observation(&mut self, measurement: &str, point: Point) {
        self.entries.insert(
            measurement.to_string(),
            ObservationSummary {
                first: point,
                current: point,
            },
        );
    }

    fn on_current_observation(&mut self, measurement: &str, point: Point) {
        match self.entries.entry(measurement.to_string()) {
            Entry::Occupied(mut entry) => entry.get_mut().current = point,
            Entry::Vacant(entry) => {
                entry.insert(ObservationSummary {
                    first: point,
                    current: point,
                });
            }
        }
    }
}

/// An identified owner of named measurements.
///
/// A host is created from a list of [`MeasurementSpec`]s; each becomes a
/// [`Measurement`] owned exclusively by the host. Appends go through the host,
/// which keeps the first and current observation of every measurement. Dropping
/// (or removing from a [`HostStore`](crate::HostStore)) a host destroys its
/// measurements.
///
/// # Example
///
/// ```rust
/// use strata_timeseries::{Host, MeasurementSpec, ResolutionLevel};
/// use chrono::{TimeZone, Utc};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut host = Host::with_measurements("AAPL", [MeasurementSpec::new("price")])?;
/// host.append("price", Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap(), 2000)?;
/// host.append("price", Utc.with_ymd_and_hms(2000, 1, 2, 12, 0, 0).unwrap(), 3000)?;
///
/// let daily = host.query("price", ResolutionLevel::Day)?;
/// assert_eq!(daily.len(), 1);
/// assert_eq!(daily[0].value, 2500);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Host {
    id: String,
    measurements: Vec<Measurement>,
    observations: Observations,
}

impl Host {
    /// Creates a host with no measurements.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            measurements: Vec::new(),
            observations: Observations::new(),
        }
    }

    /// Creates a host owning one empty measurement per declaration.
    ///
    /// # Errors
    ///
    /// [`TimeSeriesError::DuplicateMeasurement`] if two declarations share a name.
    pub fn with_measurements(
        id: impl Into<String>,
        specs: impl IntoIterator<Item = MeasurementSpec>,
    ) -> Result<Self, TimeSeriesError> {
        let mut host = Self::new(id);
        for spec in specs {
            host.add_measurement(spec.name, spec.config)?;
        }
        Ok(host)
    }

    /// Rebuilds a host from stored parts.
    pub(crate) fn from_parts(
        id: String,
        measurements: Vec<Measurement>,
        observations: Observations,
    ) -> Result<Self, EncodingError> {
        for (i, measurement) in measurements.iter().enumerate() {
            if measurements[..i]
                .iter()
                .any(|other| other.name() == measurement.name())
            {
                return Err(EncodingError::InvalidData(format!(
                    "Duplicate measurement {} in host {}",
                    measurement.name(),
                    id
                )));
            }
        }
        if let Some((name, _)) = observations
            .iter()
            .find(|(name, _)| !measurements.iter().any(|m| m.name() == *name))
        {
            return Err(EncodingError::InvalidData(format!(
                "Observation for unknown measurement {name} in host {id}"
            )));
        }

        Ok(Self {
            id,
            measurements,
            observations,
        })
    }

    /// Returns the identifier of this host.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adds an empty measurement.
    ///
    /// # Errors
    ///
    /// [`TimeSeriesError::DuplicateMeasurement`] if the name is already taken.
    pub fn add_measurement(
        &mut self,
        name: impl Into<String>,
        config: MeasurementConfig,
    ) -> Result<&mut Measurement, TimeSeriesError> {
        let name = name.into();
        if self.index_of(&name).is_some() {
            return Err(TimeSeriesError::DuplicateMeasurement(name));
        }
        self.measurements.push(Measurement::new(name, config));
        let last = self.measurements.len() - 1;
        Ok(&mut self.measurements[last])
    }

    /// Removes a measurement together with its observations.
    pub fn remove_measurement(&mut self, name: &str) -> Option<Measurement> {
        let index = self.index_of(name)?;
        self.observations.remove(name);
        Some(self.measurements.remove(index))
    }

    /// Appends an observation to the named measurement.
    ///
    /// See [`Measurement::append`] for the rollup semantics and errors.
    pub fn append(
        &mut self,
        name: &str,
        timestamp: DateTime<Utc>,
        value: i64,
    ) -> Result<AppendOutcome, TimeSeriesError> {
        let measurement = self
            .measurements
            .iter_mut()
            .find(|m| m.name() == name)
            .ok_or_else(|| TimeSeriesError::UnknownMeasurement(name.to_string()))?;
        measurement.append(timestamp, value, &mut self.observations)
    }

    /// Returns every point of the named measurement at `level`.
    pub fn query(&self, name: &str, level: ResolutionLevel) -> Result<&[Point], TimeSeriesError> {
        self.require(name)?.query(level)
    }

    /// Returns the daily rollup of the named measurement.
    pub fn query_default(&self, name: &str) -> Result<&[Point], TimeSeriesError> {
        self.query(name, ResolutionLevel::Day)
    }

    /// Returns points of the named measurement at `level` with `from <= timestamp < to`.
    pub fn query_range(
        &self,
        name: &str,
        level: ResolutionLevel,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<&[Point], TimeSeriesError> {
        self.require(name)?.query_range(level, from, to)
    }

    /// Returns the first observation of the named measurement.
    pub fn first(&self, name: &str) -> Option<Point> {
        self.observations.first(name)
    }

    /// Returns the most recent observation of the named measurement.
    pub fn current(&self, name: &str) -> Option<Point> {
        self.observations.current(name)
    }

    /// Returns the observation cache.
    pub fn observations(&self) -> &Observations {
        &self.observations
    }

    /// Returns the named measurement.
    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.name() == name)
    }

    /// Returns all measurements in declaration order.
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Returns measurement names in declaration order.
    pub fn measurement_names(&self) -> impl Iterator<Item = &str> {
        self.measurements.iter().map(Measurement::name)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.measurements.iter().position(|m| m.name() == name)
    }

    fn require(&self, name: &str) -> Result<&Measurement, TimeSeriesError> {
        self.measurement(name)
            .ok_or_else(|| TimeSeriesError::UnknownMeasurement(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn stock() -> Host {
        Host::with_measurements(
            "AAPL",
            [
                MeasurementSpec::new("price"),
                MeasurementSpec::new("volume")
                    .with_config(MeasurementConfig::new(ResolutionLevel::Month)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_specs_rejected() {
        let err = Host::with_measurements(
            "AAPL",
            [MeasurementSpec::new("price"), MeasurementSpec::new("price")],
        )
        .unwrap_err();
        assert!(matches!(err, TimeSeriesError::DuplicateMeasurement(name) if name == "price"));
    }

    #[test]
    fn test_first_recorded_once_current_every_time() {
        let mut host = stock();
        host.append("price", utc(2000, 1, 1, 0), 100).unwrap();
        host.append("price", utc(2000, 1, 2, 0), 200).unwrap();
        host.append("price", utc(2000, 1, 3, 0), 300).unwrap();

        assert_eq!(host.first("price"), Some(Point::new(utc(2000, 1, 1, 0), 100)));
        assert_eq!(host.current("price"), Some(Point::new(utc(2000, 1, 3, 0), 300)));
        assert_eq!(host.first("volume"), None);
        assert_eq!(host.observations().len(), 1);
    }

    #[test]
    fn test_failed_append_does_not_touch_observations() {
        let mut host = stock();
        host.append("price", utc(2000, 1, 2, 0), 200).unwrap();
        assert!(host.append("price", utc(2000, 1, 1, 0), 100).is_err());

        assert_eq!(host.current("price"), Some(Point::new(utc(2000, 1, 2, 0), 200)));
        assert_eq!(host.query("price", ResolutionLevel::Raw).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_measurement() {
        let mut host = stock();
        assert!(matches!(
            host.append("bid", utc(2000, 1, 1, 0), 1),
            Err(TimeSeriesError::UnknownMeasurement(_))
        ));
        assert!(matches!(
            host.query("bid", ResolutionLevel::Raw),
            Err(TimeSeriesError::UnknownMeasurement(_))
        ));
    }

    #[test]
    fn test_query_default_reads_day() {
        let mut host = stock();
        host.append("price", utc(2000, 1, 1, 12), 2000).unwrap();
        host.append("price", utc(2000, 1, 2, 12), 3000).unwrap();
        assert_eq!(
            host.query_default("price").unwrap(),
            host.query("price", ResolutionLevel::Day).unwrap()
        );

        // volume stops at Month, so Day is absent
        assert!(matches!(
            host.query_default("volume"),
            Err(TimeSeriesError::UnsupportedResolution { .. })
        ));
    }

    #[test]
    fn test_measurement_names_keep_declaration_order() {
        let mut host = stock();
        host.add_measurement("bid", MeasurementConfig::default())
            .unwrap();
        let names: Vec<_> = host.measurement_names().collect();
        assert_eq!(names, vec!["price", "volume", "bid"]);
    }

    #[test]
    fn test_remove_measurement_drops_observations() {
        let mut host = stock();
        host.append("price", utc(2000, 1, 1, 0), 1).unwrap();
        let removed = host.remove_measurement("price").unwrap();
        assert_eq!(removed.len(), 1);
        assert!(host.first("price").is_none());
        assert!(host.measurement("price").is_none());
        assert!(host.remove_measurement("price").is_none());
    }

    #[test]
    fn test_observations_host_without_first_callback() {
        let mut observations = Observations::new();
        observations.on_current_observation("price", Point::new(utc(2000, 1, 1, 0), 5));
        assert_eq!(observations.first("price"), observations.current("price"));
    }

    #[test]
    fn test_serialize_host() {
        let mut host = stock();
        host.append("price", utc(2000, 1, 1, 12), 2000).unwrap();
        host.append("price", utc(2000, 1, 2, 12), 3000).unwrap();

        let json = serde_json::to_value(&host).unwrap();
        assert_eq!(json["id"], "AAPL");
        assert_eq!(json["measurements"].as_array().unwrap().len(), 2);
        assert_eq!(json["observations"]["price"]["current"]["value"], 3000);
        assert_eq!(json["measurements"][0]["series"]["day"][0]["value"], 2500);
    }
}
