use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{SessionSnapshot, SessionStatus};

/// Every committed state change produces an Event.
/// Renderers subscribe to them through the session controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionScheduled {
        session_id: i64,
        title: String,
        scheduled_minutes: u32,
        at: DateTime<Utc>,
    },
    SessionStarted {
        session_id: i64,
        at: DateTime<Utc>,
    },
    SessionPaused {
        session_id: i64,
        interruption_id: i64,
        reason: String,
        at: DateTime<Utc>,
    },
    SessionResumed {
        session_id: i64,
        /// Measured length of the pause that just ended.
        paused_secs: i64,
        at: DateTime<Utc>,
    },
    /// Session entered a terminal status (completed, overdue, or whatever
    /// the repository decided, e.g. interrupted).
    SessionEnded {
        session_id: i64,
        status: SessionStatus,
        elapsed_secs: i64,
        at: DateTime<Utc>,
    },
    /// Elapsed time reached the scheduled duration. Fired once per session.
    DurationReached {
        session_id: i64,
        elapsed_secs: i64,
        at: DateTime<Utc>,
    },
    Tick(SessionSnapshot),
    /// A repository call failed and the session was rolled back.
    CommandFailed {
        session_id: i64,
        command: String,
        message: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn session_id(&self) -> i64 {
        match self {
            Event::SessionScheduled { session_id, .. }
            | Event::SessionStarted { session_id, .. }
            | Event::SessionPaused { session_id, .. }
            | Event::SessionResumed { session_id, .. }
            | Event::SessionEnded { session_id, .. }
            | Event::DurationReached { session_id, .. }
            | Event::CommandFailed { session_id, .. } => *session_id,
            Event::Tick(snapshot) => snapshot.session_id,
        }
    }
}
