//! # strata-timeseries
//!
//! Multi-resolution rollup series on top of the Strata record store.
//!
//! A [`Measurement`] is a named stream of integer observations. Alongside the raw
//! stream it keeps calendar rollups at up to four resolutions (year, month,
//! Sunday-aligned week and day), each holding one value per completed period. The
//! value recorded for a period is the linear interpolation of the two raw
//! observations straddling the end of that period, truncated toward zero.
//!
//! ## Features
//!
//! - **Configurable depth**: a measurement keeps `Raw` up to its `max_resolution`
//! - **Exact arithmetic**: interpolation is done in 128-bit integer nanoseconds
//! - **Atomic appends**: a rejected append leaves every sequence untouched
//! - **Hosts**: named owners of measurements with first/current observation tracking
//! - **Persistence**: hosts saved as binary documents with absolute or delta point encoding
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_timeseries::{Host, MeasurementSpec, ResolutionLevel};
//! use chrono::{TimeZone, Utc};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut host = Host::with_measurements("AAPL", [MeasurementSpec::new("price")])?;
//!
//! host.append("price", Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap(), 2000)?;
//! host.append("price", Utc.with_ymd_and_hms(2000, 1, 2, 12, 0, 0).unwrap(), 3000)?;
//!
//! // The day starting 2000-01-01 ended halfway between the two observations
//! let daily = host.query("price", ResolutionLevel::Day)?;
//! assert_eq!(daily[0].timestamp, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
//! assert_eq!(daily[0].value, 2500);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

pub mod codec;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod host;
pub mod measurement;
pub mod point;
pub mod resolution;
pub mod store;

pub use config::{MeasurementConfig, MeasurementSpec};
pub use encoding::{AbsoluteEncoding, DeltaEncoding, EncodingError, PointEncoding};
pub use engine::{AppendOutcome, append, create_measurement, query};
pub use error::TimeSeriesError;
pub use host::{Host, ObservationHost, ObservationSummary, Observations};
pub use measurement::Measurement;
pub use point::Point;
pub use resolution::{ParseResolutionError, Period, ResolutionLevel};
pub use store::{HOST_COLLECTION, HostStore};
