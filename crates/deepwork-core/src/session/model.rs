//! Session and interruption records as exchanged with the backend.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::status::SessionStatus;
use crate::error::ValidationError;

/// One scheduled or executed deep-work block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub goal: Option<String>,
    /// Minutes; wire name `scheduled_duration`.
    #[serde(rename = "scheduled_duration")]
    pub scheduled_duration_minutes: u32,
    pub status: SessionStatus,
    #[serde(default, with = "wire_time::option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "wire_time::option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, with = "wire_time::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interruptions: Vec<Interruption>,
}

/// A logged pause with the user's reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interruption {
    pub id: i64,
    pub session_id: i64,
    pub reason: String,
    #[serde(with = "wire_time")]
    pub pause_time: DateTime<Utc>,
}

/// Fields for scheduling a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(rename = "scheduled_duration")]
    pub scheduled_duration_minutes: u32,
}

/// Row of `GET /sessions/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub goal: Option<String>,
    pub status: SessionStatus,
    pub pause_count: u32,
    pub completion_ratio: f64,
}

impl Session {
    pub fn scheduled_secs(&self) -> i64 {
        i64::from(self.scheduled_duration_minutes) * 60
    }

    pub fn pause_count(&self) -> usize {
        self.interruptions.len()
    }

    /// Wall-clock minutes between start and end, if both are known.
    pub fn actual_minutes(&self) -> Option<f64> {
        let (start, end) = (self.start_time?, self.end_time?);
        Some((end - start).num_milliseconds() as f64 / 60_000.0)
    }

    /// Actual / scheduled minutes for sessions that ran to the end
    /// (`completed` or `overdue`); `0.0` for everything else.
    pub fn completion_ratio(&self) -> f64 {
        if !matches!(self.status, SessionStatus::Completed | SessionStatus::Overdue)
            || self.scheduled_duration_minutes == 0
        {
            return 0.0;
        }
        self.actual_minutes()
            .map(|actual| actual / f64::from(self.scheduled_duration_minutes))
            .unwrap_or(0.0)
    }

    /// `end_time` is set iff terminal; `start_time` is set iff not scheduled.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let violation = |message: String| ValidationError::Invariant {
            session_id: self.id,
            message,
        };
        if self.end_time.is_some() != self.status.is_terminal() {
            return Err(violation(format!(
                "end_time {} but status is '{}'",
                if self.end_time.is_some() { "set" } else { "missing" },
                self.status
            )));
        }
        if self.start_time.is_some() == (self.status == SessionStatus::Scheduled) {
            return Err(violation(format!(
                "start_time {} but status is '{}'",
                if self.start_time.is_some() { "set" } else { "missing" },
                self.status
            )));
        }
        Ok(())
    }
}

impl NewSession {
    pub fn new(title: impl Into<String>, scheduled_duration_minutes: u32) -> Self {
        Self {
            title: title.into(),
            goal: None,
            scheduled_duration_minutes,
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        let goal = goal.into();
        self.goal = if goal.trim().is_empty() { None } else { Some(goal) };
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "title" });
        }
        if self.scheduled_duration_minutes == 0 {
            return Err(ValidationError::NotPositive {
                field: "scheduled_duration",
            });
        }
        Ok(())
    }
}

impl HistoryEntry {
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            goal: session.goal.clone(),
            status: session.status,
            pause_count: session.pause_count() as u32,
            completion_ratio: session.completion_ratio(),
        }
    }
}

/// Zone the backend writes its naive timestamps in.
///
/// The reference backend stores `datetime.now()` without an offset, so the
/// default is the host's local zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendTimezone {
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

/// Wire fields holding timestamps.
const TIMESTAMP_FIELDS: [&str; 4] = ["start_time", "end_time", "created_at", "pause_time"];

impl BackendTimezone {
    /// The UTC instant a naive backend timestamp stands for.
    pub fn resolve(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        let shift = |offset: FixedOffset| {
            (naive - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
        };
        match self {
            BackendTimezone::Utc => naive.and_utc(),
            BackendTimezone::Fixed(offset) => shift(*offset),
            BackendTimezone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|at| at.with_timezone(&Utc))
                // Skipped by a DST jump: use the offset in force around it.
                .unwrap_or_else(|| shift(Local.offset_from_utc_datetime(&naive))),
        }
    }

    /// Rewrite every naive timestamp field in a decoded body as RFC 3339.
    /// Values that already carry an offset are left alone.
    pub fn localize(&self, value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Array(items) => {
                for item in items {
                    self.localize(item);
                }
            }
            serde_json::Value::Object(fields) => {
                for (key, field) in fields.iter_mut() {
                    match field {
                        serde_json::Value::String(raw)
                            if TIMESTAMP_FIELDS.contains(&key.as_str()) =>
                        {
                            if let Some(naive) = wire_time::parse_naive(raw) {
                                *raw = self.resolve(naive).to_rfc3339();
                            }
                        }
                        other => self.localize(other),
                    }
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for BackendTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendTimezone::Local => f.write_str("local"),
            BackendTimezone::Utc => f.write_str("utc"),
            BackendTimezone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl FromStr for BackendTimezone {
    type Err = String;

    /// `local`, `utc`, or an offset such as `+09:00`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendTimezone::Local),
            "utc" | "z" => Ok(BackendTimezone::Utc),
            offset => DateTime::parse_from_str(
                &format!("2000-01-01T00:00:00{offset}"),
                "%Y-%m-%dT%H:%M:%S%:z",
            )
            .map(|at| BackendTimezone::Fixed(*at.offset()))
            .map_err(|_| {
                format!("expected 'local', 'utc' or an offset like '+09:00', got '{raw}'")
            }),
        }
    }
}

impl TryFrom<String> for BackendTimezone {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<BackendTimezone> for String {
    fn from(timezone: BackendTimezone) -> Self {
        timezone.to_string()
    }
}

/// ISO-8601 timestamps, always written as RFC 3339. Naive values that reach
/// serde directly are read as UTC; the HTTP repository resolves them in the
/// configured [`BackendTimezone`] before decoding.
pub(crate) mod wire_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    fn parse_with_offset(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z"))
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    /// `Some` only for timestamps without an offset.
    pub fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if parse_with_offset(raw).is_some() {
            return None;
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        let raw = raw.trim();
        parse_with_offset(raw)
            .or_else(|| parse_naive(raw).map(|naive| naive.and_utc()))
            .ok_or_else(|| format!("invalid timestamp '{raw}'"))
    }

    pub fn serialize<S: Serializer>(
        at: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            at: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match at {
                Some(at) => serializer.serialize_str(&at.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(de::Error::custom))
                .transpose()
        }
    }
}
