//! In-process repository with the backend's transition rules.
//!
//! Completing decides the terminal status the way the reference backend
//! does: a paused session is `abandoned`, an active one that ran more than
//! 10% past its schedule (wall clock since start) is `overdue`, anything else
//! is `completed`. Marking overdue sets `overdue` directly.
//!
//! Used by tests and offline runs. Timestamps come from the injected clock;
//! failures can be queued with [`InMemorySessionRepository::fail_next`] and
//! calls can be held open with a gate.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use super::{SessionPatch, SessionRepository};
use crate::clock::Clock;
use crate::error::RepositoryError;
use crate::session::{HistoryEntry, Interruption, NewSession, Session, SessionStatus};

/// Completing later than this share of the schedule makes a session overdue.
const OVERDUE_TOLERANCE: f64 = 1.1;

#[derive(Debug, Default)]
struct MemoryState {
    sessions: BTreeMap<i64, Session>,
    next_session_id: i64,
    next_interruption_id: i64,
    failures: VecDeque<RepositoryError>,
    calls: usize,
    gate: Option<Arc<Notify>>,
    interruption_limit: Option<usize>,
}

pub struct InMemorySessionRepository {
    clock: Arc<dyn Clock>,
    state: Mutex<MemoryState>,
}

impl InMemorySessionRepository {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(MemoryState {
                next_session_id: 1,
                next_interruption_id: 1,
                ..MemoryState::default()
            }),
        }
    }

    /// Flip a session to `interrupted` once it collects `limit` interruptions,
    /// as the reference backend does with a limit of 4.
    pub fn with_interruption_limit(self, limit: usize) -> Self {
        self.lock().interruption_limit = Some(limit);
        self
    }

    /// The next call fails with `error` instead of running.
    pub fn fail_next(&self, error: RepositoryError) {
        self.lock().failures.push_back(error);
    }

    /// Every call waits for a permit on `gate` before running.
    pub fn set_gate(&self, gate: Option<Arc<Notify>>) {
        self.lock().gate = gate;
    }

    /// Number of calls received, including failed ones.
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    /// Store a session as-is, keeping its id.
    pub fn insert(&self, session: Session) {
        let mut state = self.lock();
        state.next_session_id = state.next_session_id.max(session.id + 1);
        let next_interruption = session.interruptions.iter().map(|i| i.id + 1).max();
        if let Some(next) = next_interruption {
            state.next_interruption_id = state.next_interruption_id.max(next);
        }
        state.sessions.insert(session.id, session);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self) -> Result<(), RepositoryError> {
        let gate = {
            let mut state = self.lock();
            state.calls += 1;
            state.gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.lock().failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn not_found(id: i64) -> RepositoryError {
    RepositoryError::NotFound {
        resource: format!("session {id}"),
    }
}

/// Terminal status for a completion at `now`.
fn completion_status(session: &Session, now: DateTime<Utc>) -> SessionStatus {
    if session.status == SessionStatus::Paused {
        return SessionStatus::Abandoned;
    }
    let actual_minutes = session
        .start_time
        .map_or(0.0, |start| (now - start).num_milliseconds() as f64 / 60_000.0);
    if actual_minutes > f64::from(session.scheduled_duration_minutes) * OVERDUE_TOLERANCE {
        SessionStatus::Overdue
    } else {
        SessionStatus::Completed
    }
}

fn rejected(action: &str, expected: &str, current: SessionStatus) -> RepositoryError {
    RepositoryError::Rejected {
        status: 400,
        message: format!(
            "Cannot {action} session: Session must be in {expected} state, current state: {current}"
        ),
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn list(&self) -> Result<Vec<Session>, RepositoryError> {
        self.enter().await?;
        let state = self.lock();
        // Newest first, like the backend.
        let mut sessions: Vec<Session> = state.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(sessions)
    }

    async fn get(&self, id: i64) -> Result<Session, RepositoryError> {
        self.enter().await?;
        self.lock().sessions.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn create(&self, fields: &NewSession) -> Result<Session, RepositoryError> {
        self.enter().await?;
        fields.validate().map_err(|error| RepositoryError::Rejected {
            status: 422,
            message: error.to_string(),
        })?;
        let now = self.clock.now();
        let mut state = self.lock();
        let id = state.next_session_id;
        state.next_session_id += 1;
        let session = Session {
            id,
            title: fields.title.clone(),
            goal: fields.goal.clone(),
            scheduled_duration_minutes: fields.scheduled_duration_minutes,
            status: SessionStatus::Scheduled,
            start_time: None,
            end_time: None,
            created_at: Some(now),
            interruptions: Vec::new(),
        };
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn update(&self, id: i64, patch: SessionPatch) -> Result<Session, RepositoryError> {
        self.enter().await?;
        let now = self.clock.now();
        let mut state = self.lock();
        let session = state.sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        let status = session.status;
        match patch {
            SessionPatch::Start => {
                if status != SessionStatus::Scheduled {
                    return Err(rejected("start", "'scheduled'", status));
                }
                session.start_time = Some(now);
                session.status = SessionStatus::Active;
            }
            SessionPatch::Resume => {
                if status != SessionStatus::Paused {
                    return Err(rejected("resume", "'paused'", status));
                }
                session.status = SessionStatus::Active;
            }
            SessionPatch::Complete | SessionPatch::MarkOverdue => {
                if !status.is_in_progress() {
                    return Err(rejected("complete", "'active' or 'paused'", status));
                }
                session.status = match patch {
                    SessionPatch::MarkOverdue => SessionStatus::Overdue,
                    _ => completion_status(session, now),
                };
                session.end_time = Some(now);
            }
        }
        Ok(session.clone())
    }

    async fn list_interruptions(
        &self,
        session_id: i64,
    ) -> Result<Vec<Interruption>, RepositoryError> {
        self.enter().await?;
        self.lock()
            .sessions
            .get(&session_id)
            .map(|s| s.interruptions.clone())
            .ok_or_else(|| not_found(session_id))
    }

    async fn create_interruption(
        &self,
        session_id: i64,
        reason: &str,
    ) -> Result<Interruption, RepositoryError> {
        self.enter().await?;
        if reason.trim().is_empty() {
            return Err(RepositoryError::Rejected {
                status: 422,
                message: "reason must not be empty".into(),
            });
        }
        let now = self.clock.now();
        let mut state = self.lock();
        let id = state.next_interruption_id;
        let limit = state.interruption_limit;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found(session_id))?;
        if session.status != SessionStatus::Active {
            return Err(rejected("pause", "'active'", session.status));
        }

        let interruption = Interruption {
            id,
            session_id,
            reason: reason.to_string(),
            pause_time: now,
        };
        session.interruptions.push(interruption.clone());
        session.status = SessionStatus::Paused;
        if limit.is_some_and(|limit| session.interruptions.len() >= limit) {
            session.status = SessionStatus::Interrupted;
            session.end_time = Some(now);
        }
        state.next_interruption_id += 1;
        Ok(interruption)
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, RepositoryError> {
        self.enter().await?;
        Ok(self
            .lock()
            .sessions
            .values()
            .map(HistoryEntry::from_session)
            .collect())
    }
}
