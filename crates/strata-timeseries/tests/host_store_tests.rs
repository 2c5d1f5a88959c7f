//! Host Persistence Tests
//!
//! Hosts saved to a `HostStore` must come back identical after the store is
//! closed and reopened, including rollups and first/current observations.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::time::Duration;
use strata::RecordStore;
use strata_timeseries::{
    AbsoluteEncoding, Host, HostStore, MeasurementConfig, MeasurementSpec, Point,
    ResolutionLevel, TimeSeriesError,
};
use tempfile::tempdir;

fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn stock(id: &str) -> Host {
    Host::with_measurements(
        id,
        [
            MeasurementSpec::new("price"),
            MeasurementSpec::new("volume").with_config(
                MeasurementConfig::new(ResolutionLevel::Month)
                    .with_max_gap(Duration::from_secs(31 * 86_400)),
            ),
        ],
    )
    .unwrap()
}

#[test]
fn test_host_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stocks.strata");

    let mut host = stock("AAPL");
    let mut t = utc(2000, 1, 1, 14);
    for i in 0..120 {
        host.append("price", t, 10_000 + i * 7).unwrap();
        host.append("volume", t, 1_000_000 - i * 300).unwrap();
        t += TimeDelta::hours(29);
    }

    {
        let store: HostStore = HostStore::open(&path).unwrap();
        store.save(&host).unwrap();
    }

    let store: HostStore = HostStore::open(&path).unwrap();
    let loaded = store.load("AAPL").unwrap().unwrap();

    assert_eq!(loaded, host);
    assert_eq!(
        loaded.first("price"),
        Some(Point::new(utc(2000, 1, 1, 14), 10_000))
    );
    assert_eq!(loaded.current("volume"), host.current("volume"));
    assert_eq!(
        loaded.query("volume", ResolutionLevel::Month).unwrap(),
        host.query("volume", ResolutionLevel::Month).unwrap()
    );
    assert!(loaded.query("volume", ResolutionLevel::Week).is_err());
}

#[test]
fn test_appends_continue_after_reload() {
    let dir = tempdir().unwrap();
    let store: HostStore = HostStore::open(dir.path().join("stocks.strata")).unwrap();

    let mut host = stock("MSFT");
    host.append("price", utc(2000, 1, 1, 12), 2000).unwrap();
    store.save(&host).unwrap();

    let mut reloaded = store.load("MSFT").unwrap().unwrap();
    assert!(matches!(
        reloaded.append("price", utc(2000, 1, 1, 11), 1),
        Err(TimeSeriesError::OutOfOrderAppend { .. })
    ));
    reloaded.append("price", utc(2000, 1, 2, 12), 3000).unwrap();
    store.save(&reloaded).unwrap();

    let again = store.load("MSFT").unwrap().unwrap();
    assert_eq!(
        again.query_default("price").unwrap(),
        &[Point::new(utc(2000, 1, 1, 0), 2500)]
    );
    assert_eq!(again.first("price"), Some(Point::new(utc(2000, 1, 1, 12), 2000)));
}

#[test]
fn test_removed_host_stays_removed_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stocks.strata");

    {
        let store: HostStore<AbsoluteEncoding> = HostStore::open(&path).unwrap();
        store.save(&stock("AAPL")).unwrap();
        store.save(&stock("MSFT")).unwrap();
        assert!(store.remove("AAPL").unwrap());
        store.sync().unwrap();
    }

    let store: HostStore<AbsoluteEncoding> = HostStore::open(&path).unwrap();
    assert_eq!(store.ids().unwrap(), vec!["MSFT".to_string()]);
    assert!(store.load("AAPL").unwrap().is_none());
}

#[test]
fn test_corrupt_record_is_reported() {
    let dir = tempdir().unwrap();
    let records = RecordStore::open(dir.path().join("stocks.strata")).unwrap();
    records
        .put(strata_timeseries::HOST_COLLECTION, "BAD", &[1, 2, 0, 0])
        .unwrap();

    let store: HostStore = HostStore::new(records);
    assert!(matches!(
        store.load("BAD"),
        Err(TimeSeriesError::Encoding(_))
    ));
}
