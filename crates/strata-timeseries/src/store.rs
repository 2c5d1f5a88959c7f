//! Durable storage of hosts in a [`strata::RecordStore`].

use crate::codec::{decode_host, encode_host};
use crate::encoding::{DeltaEncoding, PointEncoding};
use crate::error::TimeSeriesError;
use crate::host::Host;
use std::marker::PhantomData;
use std::path::Path;
use strata::RecordStore;

/// Collection holding host documents.
pub const HOST_COLLECTION: &str = "hosts";

/// Saves and loads whole hosts, one record per host id.
///
/// Series inside each record are encoded with `E`; a store must always be read
/// with the encoding it was written with.
///
/// # Type Parameters
///
/// - `E`: The point encoding strategy (`DeltaEncoding` by default, or `AbsoluteEncoding`)
///
/// # Example
///
/// ```rust,no_run
/// use strata_timeseries::{Host, HostStore, MeasurementSpec};
/// use chrono::Utc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store: HostStore = HostStore::open("stocks.strata")?;
///
/// let mut host = Host::with_measurements("AAPL", [MeasurementSpec::new("price")])?;
/// host.append("price", Utc::now(), 18_950)?;
/// store.save(&host)?;
///
/// let reloaded = store.load("AAPL")?.expect("saved above");
/// assert_eq!(reloaded, host);
/// # Ok(())
/// # }
/// ```
pub struct HostStore<E: PointEncoding = DeltaEncoding> {
    records: RecordStore,
    _encoding: PhantomData<E>,
}

impl<E: PointEncoding> HostStore<E> {
    /// Opens or creates a host store at `path` with default journal settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TimeSeriesError> {
        Ok(Self::new(RecordStore::open(path)?))
    }

    /// Wraps an already opened record store.
    pub fn new(records: RecordStore) -> Self {
        Self {
            records,
            _encoding: PhantomData,
        }
    }

    /// Writes `host`, replacing any previous record with the same id.
    pub fn save(&self, host: &Host) -> Result<(), TimeSeriesError> {
        let bytes = encode_host::<E>(host)?;

        #[cfg(feature = "logging")]
        log::debug!("Saving host {} ({} bytes)", host.id(), bytes.len());

        self.records.put(HOST_COLLECTION, host.id(), &bytes)?;
        Ok(())
    }

    /// Reads the host stored under `id`.
    pub fn load(&self, id: &str) -> Result<Option<Host>, TimeSeriesError> {
        let Some(bytes) = self.records.get(HOST_COLLECTION, id)? else {
            return Ok(None);
        };
        let host = decode_host::<E>(&bytes)?;

        #[cfg(feature = "logging")]
        log::debug!(
            "Loaded host {} with {} measurements",
            id,
            host.measurements().len()
        );

        Ok(Some(host))
    }

    /// Deletes the host stored under `id` and every measurement it owns.
    ///
    /// Returns `true` if the host existed.
    pub fn remove(&self, id: &str) -> Result<bool, TimeSeriesError> {
        let removed = self.records.remove(HOST_COLLECTION, id)?;

        #[cfg(feature = "logging")]
        if removed {
            log::info!("Removed host {id}");
        }

        Ok(removed)
    }

    /// Lists stored host ids in ascending order.
    pub fn ids(&self) -> Result<Vec<String>, TimeSeriesError> {
        Ok(self.records.keys(HOST_COLLECTION)?)
    }

    /// Flushes pending writes to disk.
    pub fn sync(&self) -> Result<(), TimeSeriesError> {
        Ok(self.records.sync()?)
    }

    /// Returns the underlying record store.
    pub fn records(&self) -> &RecordStore {
        &self.records
    }
}
