use std::{fmt, str::FromStr};

use chrono::{NaiveTime, Timelike};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
}

/// Wall-clock time of day with minute resolution, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn hour(self) -> u32 {
        self.0.hour()
    }

    pub fn minute(self) -> u32 {
        self.0.minute()
    }

    pub fn as_naive(self) -> NaiveTime {
        self.0
    }
}

impl FromStr for ClockTime {
    type Err = ScheduleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (hour, minute) = trimmed
            .split_once(':')
            .ok_or_else(|| ScheduleError::InvalidTime(value.to_string()))?;

        let parse = |part: &str| {
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse::<u32>().ok()
        };

        match (parse(hour), parse(minute)) {
            (Some(hour), Some(minute)) => {
                Self::new(hour, minute).ok_or_else(|| ScheduleError::InvalidTime(value.to_string()))
            }
            _ => Err(ScheduleError::InvalidTime(value.to_string())),
        }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Daily window during which the light is forced off.
///
/// A window whose start is later than its end wraps past midnight, so
/// `22:00`-`06:00` covers the night. Equal bounds describe an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for ScheduleWindow {
    fn default() -> Self {
        Self::new(Self::default_start(), Self::default_end())
    }
}

impl ScheduleWindow {
    pub fn new(start_time: ClockTime, end_time: ClockTime) -> Self {
        Self {
            start_time,
            end_time,
            enabled: true,
        }
    }

    pub fn default_start() -> ClockTime {
        ClockTime(NaiveTime::default())
    }

    pub fn default_end() -> ClockTime {
        ClockTime(NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default())
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start_time > self.end_time
    }

    /// Whether `now` falls inside the off-window. Ignores `enabled`.
    pub fn contains(&self, now: NaiveTime) -> bool {
        let start = self.start_time.as_naive();
        let end = self.end_time.as_naive();

        if start <= end {
            start <= now && now < end
        } else {
            now >= start || now < end
        }
    }
}
