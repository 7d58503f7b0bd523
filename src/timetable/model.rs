use chrono::{NaiveTime, Timelike};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Wall-clock time of day with minute granularity.
///
/// Ordering matches the ordering of the zero-padded `HH:MM` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    minutes: u16,
}

impl ClockTime {
    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            minutes: hour * 60 + minute,
        })
    }

    pub fn minutes_since_midnight(self) -> u16 {
        self.minutes
    }

    pub fn hour(self) -> u16 {
        self.minutes / 60
    }

    pub fn minute(self) -> u16 {
        self.minutes % 60
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockTimeParseError(String);

impl fmt::Display for ClockTimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time '{}': expected HH:MM", self.0)
    }
}

impl std::error::Error for ClockTimeParseError {}

impl FromStr for ClockTime {
    type Err = ClockTimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let t = NaiveTime::parse_from_str(trimmed, "%H:%M")
            .map_err(|_| ClockTimeParseError(trimmed.to_string()))?;
        Ok(Self {
            minutes: (t.hour() * 60 + t.minute()) as u16,
        })
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" => Some(Self::Monday),
            "tuesday" => Some(Self::Tuesday),
            "wednesday" => Some(Self::Wednesday),
            "thursday" => Some(Self::Thursday),
            "friday" => Some(Self::Friday),
            _ => None,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence key: one timetable document per class and weekday.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DayKey {
    pub class_id: String,
    pub weekday: Weekday,
}

impl DayKey {
    pub fn new(class_id: impl Into<String>, weekday: Weekday) -> Self {
        Self {
            class_id: class_id.into(),
            weekday,
        }
    }

    /// The five keys that make up one class's week, Monday first.
    pub fn week_of(class_id: &str) -> Vec<DayKey> {
        Weekday::ALL
            .iter()
            .map(|d| DayKey::new(class_id, *d))
            .collect()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class_id, self.weekday)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub subject_id: String,
    pub teacher_id: String,
}

impl Slot {
    pub fn new(
        start_time: ClockTime,
        end_time: ClockTime,
        subject_id: impl Into<String>,
        teacher_id: impl Into<String>,
    ) -> Self {
        Self {
            start_time,
            end_time,
            subject_id: subject_id.into(),
            teacher_id: teacher_id.into(),
        }
    }

    pub fn has_valid_range(&self) -> bool {
        self.start_time < self.end_time
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} {} ({})",
            self.start_time, self.end_time, self.subject_id, self.teacher_id
        )
    }
}

/// Slots for one class on one weekday, in insertion order.
///
/// `version` is 0 for a day that was never written and grows by one on every
/// successful replace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableDay {
    pub slots: Vec<Slot>,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAssignment {
    pub teacher_id: String,
    pub subject_id: String,
    pub class_id: String,
}

impl TeacherAssignment {
    pub fn new(
        teacher_id: impl Into<String>,
        subject_id: impl Into<String>,
        class_id: impl Into<String>,
    ) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            subject_id: subject_id.into(),
            class_id: class_id.into(),
        }
    }
}
