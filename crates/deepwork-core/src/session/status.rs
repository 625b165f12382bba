//! Session status and its presentation.
//!
//! `label()` and `color()` are exhaustive matches without a wildcard arm:
//! a new status does not compile until it has both.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Paused,
    Completed,
    Interrupted,
    Abandoned,
    Overdue,
}

/// Badge color for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Gray,
    Green,
    Orange,
    Blue,
    Red,
    Purple,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 7] = [
        SessionStatus::Scheduled,
        SessionStatus::Active,
        SessionStatus::Paused,
        SessionStatus::Completed,
        SessionStatus::Interrupted,
        SessionStatus::Abandoned,
        SessionStatus::Overdue,
    ];

    /// No transitions leave a terminal status.
    pub fn is_terminal(self) -> bool {
        match self {
            SessionStatus::Scheduled | SessionStatus::Active | SessionStatus::Paused => false,
            SessionStatus::Completed
            | SessionStatus::Interrupted
            | SessionStatus::Abandoned
            | SessionStatus::Overdue => true,
        }
    }

    /// Whether the session is running or paused.
    pub fn is_in_progress(self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Interrupted => "interrupted",
            SessionStatus::Abandoned => "abandoned",
            SessionStatus::Overdue => "overdue",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "Scheduled",
            SessionStatus::Active => "Active",
            SessionStatus::Paused => "Paused",
            SessionStatus::Completed => "Completed",
            SessionStatus::Interrupted => "Interrupted",
            SessionStatus::Abandoned => "Abandoned",
            SessionStatus::Overdue => "Overdue",
        }
    }

    pub fn color(self) -> StatusColor {
        match self {
            SessionStatus::Scheduled => StatusColor::Gray,
            SessionStatus::Active => StatusColor::Green,
            SessionStatus::Paused => StatusColor::Orange,
            SessionStatus::Completed => StatusColor::Blue,
            SessionStatus::Interrupted => StatusColor::Red,
            SessionStatus::Abandoned => StatusColor::Red,
            SessionStatus::Overdue => StatusColor::Purple,
        }
    }
}

impl StatusColor {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusColor::Gray => "gray",
            StatusColor::Green => "green",
            StatusColor::Orange => "orange",
            StatusColor::Blue => "blue",
            StatusColor::Red => "red",
            StatusColor::Purple => "purple",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for StatusColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "status".into(),
                message: format!("unknown session status '{s}'"),
            })
    }
}
