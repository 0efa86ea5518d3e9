use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::span::Span;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScheduleError {
    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("invalid weekday '{0}'")]
    InvalidWeekday(String),

    #[error("window {start}-{end} must end after it starts")]
    EmptyWindow { start: String, end: String },

    #[error("windows {0} and {1} overlap")]
    OverlappingWindows(String, String),

    #[error("an unavailable override cannot carry windows")]
    UnavailableWithWindows,

    #[error("blackout must end after it starts")]
    EmptyBlackout,

    #[error("resource blackouts require a resource_id")]
    MissingResource,

    #[error("unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
}

/// A time-of-day range inside a single date, serialized as `"HH:MM"` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleError> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, ScheduleError> {
        Self::new(parse_time(start)?, parse_time(end)?)
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.end <= self.start {
            return Err(ScheduleError::EmptyWindow {
                start: self.start.format("%H:%M").to_string(),
                end: self.end.format("%H:%M").to_string(),
            });
        }
        Ok(())
    }

    pub fn on(&self, date: NaiveDate) -> Span {
        Span::new(date.and_time(self.start), date.and_time(self.end))
    }

    fn label(&self) -> String {
        format!("{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Checks every window and rejects any pair that overlaps.
pub fn validate_windows(windows: &[TimeWindow]) -> Result<(), ScheduleError> {
    for w in windows {
        w.validate()?;
    }
    let mut sorted = windows.to_vec();
    sorted.sort();
    for pair in sorted.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(ScheduleError::OverlappingWindows(pair[0].label(), pair[1].label()));
        }
    }
    Ok(())
}

pub fn parse_time(s: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTime(s.to_string()))
}

pub fn parse_weekday(s: &str) -> Result<Weekday, ScheduleError> {
    s.parse::<Weekday>()
        .map_err(|_| ScheduleError::InvalidWeekday(s.to_string()))
}

/// What a window or override is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleScope {
    Resource,
    BookableType,
}

impl ScheduleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleScope::Resource => "resource",
            ScheduleScope::BookableType => "bookable_type",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        match s {
            "resource" => Ok(ScheduleScope::Resource),
            "bookable_type" => Ok(ScheduleScope::BookableType),
            other => Err(ScheduleError::UnknownValue {
                kind: "schedule scope",
                value: other.to_string(),
            }),
        }
    }
}

/// Recurring weekly opening for a resource or bookable type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: String,
    pub scope: ScheduleScope,
    pub scope_id: String,
    pub weekday: Weekday,
    #[serde(flatten)]
    pub window: TimeWindow,
}

/// Date-specific replacement for the recurring template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityOverride {
    pub id: String,
    pub scope: ScheduleScope,
    pub scope_id: String,
    pub date: NaiveDate,
    pub is_unavailable: bool,
    pub windows: Vec<TimeWindow>,
}

impl AvailabilityOverride {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.is_unavailable && !self.windows.is_empty() {
            return Err(ScheduleError::UnavailableWithWindows);
        }
        validate_windows(&self.windows)
    }

    /// The windows open on this date. An unavailable override, or one with no
    /// windows, closes the whole date.
    pub fn open_windows(&self) -> &[TimeWindow] {
        if self.is_unavailable {
            &[]
        } else {
            &self.windows
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlackoutKind {
    /// Closes the whole business, or one resource when scoped.
    Hard,
    /// Closes a single resource.
    Resource,
    /// Slots stay bookable but need manual approval.
    RequestOnly,
}

impl BlackoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlackoutKind::Hard => "hard",
            BlackoutKind::Resource => "resource",
            BlackoutKind::RequestOnly => "request_only",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        match s {
            "hard" => Ok(BlackoutKind::Hard),
            "resource" => Ok(BlackoutKind::Resource),
            "request_only" => Ok(BlackoutKind::RequestOnly),
            other => Err(ScheduleError::UnknownValue {
                kind: "blackout kind",
                value: other.to_string(),
            }),
        }
    }

    pub fn removes_slots(&self) -> bool {
        !matches!(self, BlackoutKind::RequestOnly)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackoutDate {
    pub id: String,
    pub business_id: String,
    pub resource_id: Option<String>,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub kind: BlackoutKind,
    pub reason: Option<String>,
}

impl BlackoutDate {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.ends_at <= self.starts_at {
            return Err(ScheduleError::EmptyBlackout);
        }
        if self.kind == BlackoutKind::Resource && self.resource_id.is_none() {
            return Err(ScheduleError::MissingResource);
        }
        Ok(())
    }

    pub fn span(&self) -> Span {
        Span::new(self.starts_at, self.ends_at)
    }

}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}
