//! Interval Algebra
//!
//! Pure functions over wall-clock shift ranges. A shift is described by a
//! `HH:MM` start and end time plus an inclusive date range. When the end time
//! is at or before the start time the range crosses midnight (overnight) and
//! its effective end is pushed into the next day, giving offsets in
//! `[0, 2880)`.
//!
//! Ranges are half-open: `10:00-14:00` and `14:00-18:00` touch but do not
//! overlap.
//!
//! # Example
//!
//! ```rust
//! use inventory_ws::shared::schedule::TimeRange;
//!
//! let night = TimeRange::parse("22:00", "06:00").unwrap();
//! let early = TimeRange::parse("05:00", "09:00").unwrap();
//! assert!(night.is_overnight());
//! assert!(night.overlaps(&early));
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::SharedError;

/// Minutes in one day
pub const MINUTES_PER_DAY: u16 = 1440;

/// Wire/storage format for shift dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A wall-clock time of day, stored as minutes since midnight (`0..1440`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    /// Build from hours and minutes; `None` when out of range
    pub fn from_hm(hours: u16, minutes: u16) -> Option<Self> {
        if hours < 24 && minutes < 60 {
            Some(Self(hours * 60 + minutes))
        } else {
            None
        }
    }

    /// Minutes since midnight
    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl FromStr for ClockTime {
    type Err = SharedError;

    /// Accepts exactly `HH:MM` with hours `00-23` and minutes `00-59`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SharedError::validation("time", "invalid time format, use HH:MM (e.g., 08:30, 17:59)");
        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let digit = |b: u8| -> Result<u16, SharedError> {
            if b.is_ascii_digit() {
                Ok(u16::from(b - b'0'))
            } else {
                Err(invalid())
            }
        };
        let hours = digit(bytes[0])? * 10 + digit(bytes[1])?;
        let minutes = digit(bytes[3])? * 10 + digit(bytes[4])?;
        Self::from_hm(hours, minutes).ok_or_else(invalid)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A time-of-day range, possibly crossing midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: ClockTime,
    end: ClockTime,
}

impl TimeRange {
    /// Build a range; start and end must differ
    pub fn new(start: ClockTime, end: ClockTime) -> Result<Self, SharedError> {
        if start == end {
            return Err(SharedError::validation(
                "end_time",
                "start time and end time cannot be the same",
            ));
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from `HH:MM` strings
    pub fn parse(start: &str, end: &str) -> Result<Self, SharedError> {
        let start = start
            .parse::<ClockTime>()
            .map_err(|_| SharedError::validation("start_time", "invalid time format, use HH:MM (e.g., 08:30, 17:59)"))?;
        let end = end
            .parse::<ClockTime>()
            .map_err(|_| SharedError::validation("end_time", "invalid time format, use HH:MM (e.g., 08:30, 17:59)"))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> ClockTime {
        self.start
    }

    pub fn end(&self) -> ClockTime {
        self.end
    }

    /// End at or before start means the range ends on the following day
    pub fn is_overnight(&self) -> bool {
        self.end <= self.start
    }

    /// `(start, end)` in the extended `[0, 2880)` range
    pub fn normalized(&self) -> (u16, u16) {
        let start = self.start.minutes();
        let end = if self.is_overnight() {
            self.end.minutes() + MINUTES_PER_DAY
        } else {
            self.end.minutes()
        };
        (start, end)
    }

    /// Half-open overlap test that accounts for ranges wrapping past midnight
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        let (s1, e1) = self.normalized();
        let (s2, e2) = other.normalized();

        if !(e1 <= s2 || e2 <= s1) {
            return true;
        }

        // A same-day range can still collide with the early-morning tail of an
        // overnight range, which the extended comparison above places a day later.
        if self.is_overnight() && !other.is_overnight() && s2 < e1 - MINUTES_PER_DAY {
            return true;
        }
        if other.is_overnight() && !self.is_overnight() && s1 < e2 - MINUTES_PER_DAY {
            return true;
        }

        false
    }
}

/// An inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateSpan {
    /// Build a span; the end may not precede the start
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, SharedError> {
        if end < start {
            return Err(SharedError::validation("end_date", "end date cannot be before start date"));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Both spans share at least one day
    pub fn intersects(&self, other: &DateSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Inclusive day count
    pub fn total_days(&self) -> i32 {
        let days = (self.end - self.start).num_days() + 1;
        i32::try_from(days).unwrap_or(i32::MAX)
    }
}

/// Parse a strict `YYYY-MM-DD` date
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, SharedError> {
    if raw.len() != 10 {
        return Err(SharedError::validation(field, "invalid date format, use YYYY-MM-DD"));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| SharedError::validation(field, "invalid date format, use YYYY-MM-DD"))
}

/// Fixed local zone used for day-granularity comparisons
pub fn local_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// Calendar date of `now` in the fixed local zone
pub fn local_date(now: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDate {
    now.with_timezone(&local_offset(utc_offset_minutes)).date_naive()
}

/// Calendar window for listing shifts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    Daily,
    Weekly,
    Monthly,
    #[default]
    All,
}

impl ViewType {
    /// Days covered by this view around `reference`; `None` means unbounded.
    /// Weeks start on Monday.
    pub fn span(self, reference: NaiveDate) -> Option<DateSpan> {
        match self {
            Self::Daily => Some(DateSpan { start: reference, end: reference }),
            Self::Weekly => {
                let offset = i64::from(reference.weekday().num_days_from_monday());
                let start = reference - Duration::days(offset);
                Some(DateSpan { start, end: start + Duration::days(6) })
            }
            Self::Monthly => {
                let start = reference.with_day(1)?;
                let next_month = if start.month() == 12 {
                    NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)?
                };
                Some(DateSpan { start, end: next_month - Duration::days(1) })
            }
            Self::All => None,
        }
    }
}

impl FromStr for ViewType {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "all" | "" => Ok(Self::All),
            _ => Err(SharedError::validation("view_type", "must be one of daily, weekly, monthly, all")),
        }
    }
}
