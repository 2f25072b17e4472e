use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

const LABEL_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IntervalCategory {
    /// Raw "in bed" observation.
    Primary,
    /// Synthesized "asleep" record pairing a primary interval.
    Corrective,
}

impl IntervalCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Corrective => "corrective",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "primary" => Some(Self::Primary),
            "corrective" => Some(Self::Corrective),
            _ => None,
        }
    }
}

/// One interval as read from the health store. Matching ignores the category
/// and compares the `(start, end)` pair only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "IntervalRecord")]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub category: IntervalCategory,
}

#[derive(Deserialize)]
struct IntervalRecord {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    category: IntervalCategory,
}

impl TryFrom<IntervalRecord> for Interval {
    type Error = String;

    fn try_from(record: IntervalRecord) -> Result<Self, Self::Error> {
        Self::new(record.start, record.end, record.category)
    }
}

impl Interval {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        category: IntervalCategory,
    ) -> Result<Self, String> {
        let interval = Self {
            start,
            end,
            category,
        };
        interval.validate()?;
        Ok(interval)
    }

    pub fn primary(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, String> {
        Self::new(start, end, IntervalCategory::Primary)
    }

    pub fn corrective(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, String> {
        Self::new(start, end, IntervalCategory::Corrective)
    }

    /// Builds the record that resolves `entry`. Entries are projections of
    /// validated intervals, so the ordering invariant already holds.
    pub fn corrective_for(entry: &UnresolvedEntry) -> Self {
        Self {
            start: entry.start,
            end: entry.end,
            category: IntervalCategory::Corrective,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.end <= self.start {
            return Err("interval.end must be after interval.start".to_string());
        }
        Ok(())
    }

    pub fn key(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.end)
    }

    pub fn is_primary(&self) -> bool {
        self.category == IntervalCategory::Primary
    }

    pub fn is_corrective(&self) -> bool {
        self.category == IntervalCategory::Corrective
    }
}

/// A primary interval with no corrective partner in the latest snapshot.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub struct UnresolvedEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UnresolvedEntry {
    pub fn key(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.end)
    }

    pub fn label(&self, time_zone: Tz) -> String {
        format!(
            "{} - {}",
            self.start.with_timezone(&time_zone).format(LABEL_FORMAT),
            self.end.with_timezone(&time_zone).format(LABEL_FORMAT)
        )
    }
}

impl From<&Interval> for UnresolvedEntry {
    fn from(interval: &Interval) -> Self {
        Self {
            start: interval.start,
            end: interval.end,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unavailable,
    AuthDenied,
    FetchFailed,
    WriteFailed,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::AuthDenied => "auth_denied",
            Self::FetchFailed => "fetch_failed",
            Self::WriteFailed => "write_failed",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Unavailable => "health data is not available on this device",
            Self::AuthDenied => "access to health data was denied; grant access and refresh",
            Self::FetchFailed => "could not read sleep records; try refreshing",
            Self::WriteFailed => "write denied; check permissions and try again",
        }
    }

    /// `Unavailable` only clears when the environment changes.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}
