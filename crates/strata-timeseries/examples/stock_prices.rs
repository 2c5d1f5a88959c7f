//! Tracks a closing price in cents and prints its weekly and monthly rollups.
//!
//! Run with `cargo run -p strata-timeseries --example stock_prices`.

use chrono::{TimeDelta, TimeZone, Utc};
use strata_timeseries::{Host, HostStore, MeasurementConfig, MeasurementSpec, ResolutionLevel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store: HostStore = HostStore::open(dir.path().join("stocks.strata"))?;

    let mut host = Host::with_measurements(
        "ACME",
        [
            MeasurementSpec::new("close"),
            MeasurementSpec::new("volume")
                .with_config(MeasurementConfig::new(ResolutionLevel::Month)),
        ],
    )?;

    let open = Utc
        .with_ymd_and_hms(2024, 1, 2, 21, 0, 0)
        .single()
        .ok_or("invalid start time")?;
    let mut close = 18_250i64;
    for session in 0..90i64 {
        let t = open + TimeDelta::days(session);
        close += (session % 7 - 3) * 41;
        host.append("close", t, close)?;
        host.append("volume", t, 2_000_000 + (session % 5) * 150_000)?;
    }

    store.save(&host)?;
    let host = store.load("ACME")?.ok_or("host was not saved")?;

    for level in [ResolutionLevel::Month, ResolutionLevel::Week] {
        println!("close by {level}:");
        for point in host.query("close", level)? {
            println!(
                "  {}  {}.{:02}",
                point.timestamp.date_naive(),
                point.value / 100,
                point.value % 100
            );
        }
    }

    if let (Some(first), Some(current)) = (host.first("close"), host.current("close")) {
        println!(
            "first {} at {}, current {} at {}",
            first.value, first.timestamp, current.value, current.timestamp
        );
    }

    let json = serde_json::to_string_pretty(host.measurement("volume").ok_or("no volume")?)?;
    println!("{json}");

    Ok(())
}
