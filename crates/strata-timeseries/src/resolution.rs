//! Resolution levels and the calendar periods behind them.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity at which a measurement is kept.
///
/// Levels are ordered from the raw stream to the coarsest-configurable rollup in
/// the order `Raw < Year < Month < Week < Day`. A measurement configured with
/// `max_resolution = Week` keeps `Raw`, `Year`, `Month` and `Week` and never
/// accumulates `Day`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionLevel {
    /// Every appended observation, unmodified.
    Raw,
    /// One interpolated point per calendar year.
    Year,
    /// One interpolated point per calendar month.
    Month,
    /// One interpolated point per Sunday-aligned week.
    Week,
    /// One interpolated point per calendar day.
    Day,
}

impl ResolutionLevel {
    /// All levels in ascending order.
    pub const ALL: [ResolutionLevel; 5] = [
        ResolutionLevel::Raw,
        ResolutionLevel::Year,
        ResolutionLevel::Month,
        ResolutionLevel::Week,
        ResolutionLevel::Day,
    ];

    /// Returns the position of this level in [`ResolutionLevel::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::Raw => 0,
            Self::Year => 1,
            Self::Month => 2,
            Self::Week => 3,
            Self::Day => 4,
        }
    }

    /// Returns the level at `index`, if any.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Returns the calendar period rolled up at this level, or `None` for `Raw`.
    pub fn period(self) -> Option<Period> {
        match self {
            Self::Raw => None,
            Self::Year => Some(Period::Year),
            Self::Month => Some(Period::Month),
            Self::Week => Some(Period::Week),
            Self::Day => Some(Period::Day),
        }
    }

    /// Returns the lowercase name of this level.
    pub fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Year => "year",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
        }
    }

    /// Returns every level from `Raw` up to and including `self`.
    pub fn up_to(self) -> &'static [ResolutionLevel] {
        &Self::ALL[..=self.index()]
    }
}

impl fmt::Display for ResolutionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string names no resolution level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResolutionError(String);

impl fmt::Display for ParseResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown resolution: {}", self.0)
    }
}

impl std::error::Error for ParseResolutionError {}

impl FromStr for ResolutionLevel {
    type Err = ParseResolutionError;

    /// Accepts a level name (`"day"`, case-insensitive) or its numeric index (`"4"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(index) = trimmed.parse::<usize>() {
            return Self::from_index(index).ok_or_else(|| ParseResolutionError(s.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseResolutionError(s.to_string()))
    }
}

/// A calendar period used to bucket a rollup level, evaluated in UTC.
///
/// Each variant is a pure alignment/advancement rule:
///
/// | Period  | `period_start(t)`                         | one period forward |
/// |---------|-------------------------------------------|--------------------|
/// | `Year`  | January 1, 00:00 of `t`'s year            | next January 1     |
/// | `Month` | the 1st of `t`'s month, 00:00             | next 1st           |
/// | `Week`  | the Sunday on or before `t`'s day, 00:00  | 7 days             |
/// | `Day`   | `t`'s day, 00:00                          | 1 day              |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    /// Calendar year.
    Year,
    /// Calendar month.
    Month,
    /// Sunday-aligned week.
    Week,
    /// Calendar day.
    Day,
}

impl Period {
    /// All periods from coarsest to finest, in level order.
    pub const ALL: [Period; 4] = [Period::Year, Period::Month, Period::Week, Period::Day];

    /// Returns the resolution level this period feeds.
    pub fn level(self) -> ResolutionLevel {
        match self {
            Self::Year => ResolutionLevel::Year,
            Self::Month => ResolutionLevel::Month,
            Self::Week => ResolutionLevel::Week,
            Self::Day => ResolutionLevel::Day,
        }
    }

    /// Normalizes `t` to the start of the period containing it.
    ///
    /// Saturates at the earliest representable date for instants within a week of it.
    pub fn period_start(self, t: DateTime<Utc>) -> DateTime<Utc> {
        let date = t.date_naive();
        let start = match self {
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
            Self::Month => date.with_day(1),
            Self::Week => date.checked_sub_days(Days::new(u64::from(
                date.weekday().num_days_from_sunday(),
            ))),
            Self::Day => Some(date),
        };
        midnight(start.unwrap_or(NaiveDate::MIN))
    }

    /// Returns the start of the period following the one containing `t`.
    ///
    /// `None` if the result is past the last representable instant.
    pub fn advance(self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = self.period_start(t);
        match self {
            Self::Year => start.checked_add_months(Months::new(12)),
            Self::Month => start.checked_add_months(Months::new(1)),
            Self::Week => start.checked_add_signed(TimeDelta::days(7)),
            Self::Day => start.checked_add_signed(TimeDelta::days(1)),
        }
    }

    /// Returns the length of the period containing `t`.
    ///
    /// Calendar-relative for `Year` (365 or 366 days) and `Month` (28 to 31 days).
    pub fn interval(self, t: DateTime<Utc>) -> Option<TimeDelta> {
        Some(self.advance(t)? - self.period_start(t))
    }

    /// Returns the start of the period preceding the one containing `t`.
    pub fn retreat(self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = self.period_start(t);
        match self {
            Self::Year => start.checked_sub_months(Months::new(12)),
            Self::Month => start.checked_sub_months(Months::new(1)),
            Self::Week => start.checked_sub_signed(TimeDelta::days(7)),
            Self::Day => start.checked_sub_signed(TimeDelta::days(1)),
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
