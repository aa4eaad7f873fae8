//! `HH:MM` slot parsing and validation.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::types::SchedulerError;

/// Maximum number of daily slots a schedule holds.
pub const MAX_TIMES: usize = 3;

/// A daily wall-clock slot, 24-hour, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ScheduleTime {
    hour: u8,
    minute: u8,
}

impl ScheduleTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, SchedulerError> {
        if hour > 23 || minute > 59 {
            return Err(SchedulerError::InvalidTime(format!("{:02}:{:02}", hour, minute)));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// The instant this slot falls on for a given local date.
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        // hour/minute are range-checked at construction.
        let time = NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), 0)
            .unwrap_or(NaiveTime::MIN);
        date.and_time(time)
    }
}

impl Default for ScheduleTime {
    fn default() -> Self {
        Self { hour: 6, minute: 0 }
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Strict `HH:MM`: two-digit hour 00-23, colon, two-digit minute 00-59.
impl FromStr for ScheduleTime {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchedulerError::InvalidTime(s.to_string());
        // chrono alone would also take `9:05` or ` 9:05`.
        if s.len() != 5 || !s.bytes().all(|b| b.is_ascii_digit() || b == b':') {
            return Err(invalid());
        }
        let time = NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| invalid())?;
        Self::new(time.hour() as u8, time.minute() as u8)
    }
}

impl From<ScheduleTime> for String {
    fn from(t: ScheduleTime) -> Self {
        t.to_string()
    }
}

impl TryFrom<String> for ScheduleTime {
    type Error = SchedulerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Outcome of validating a list of raw slot candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTimes {
    /// Valid, deduplicated slots in input order, at most [`MAX_TIMES`].
    pub accepted: Vec<ScheduleTime>,
    /// Non-blank candidates that failed validation.
    pub invalid: Vec<String>,
    /// Valid slots dropped because the limit was already reached.
    pub overflow: Vec<ScheduleTime>,
}

/// Trim, validate and deduplicate raw candidates. Blank entries are ignored.
pub fn parse_times<S: AsRef<str>>(candidates: &[S]) -> ParsedTimes {
    let mut parsed = ParsedTimes::default();
    for raw in candidates {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            continue;
        }
        match raw.parse::<ScheduleTime>() {
            Ok(t) if parsed.accepted.contains(&t) => {}
            Ok(t) if parsed.accepted.len() >= MAX_TIMES => parsed.overflow.push(t),
            Ok(t) => parsed.accepted.push(t),
            Err(_) => parsed.invalid.push(raw.to_string()),
        }
    }
    parsed
}
