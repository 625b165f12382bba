//! Session engine and per-session controllers.
//!
//! The engine owns the repository and the clock and hands out one
//! [`SessionController`] per opened or scheduled session. A controller runs
//! every command through the same protocol:
//!
//! 1. reject if closed, or if another command is still awaiting the repository
//! 2. apply locally (illegal transitions and bad input stop here)
//! 3. persist
//! 4. reconcile with the repository's record and emit events
//! 5. on a repository error, restore the pre-command state and emit
//!    `CommandFailed`
//!
//! Measured pause intervals are saved to a [`PauseStore`] after every
//! committed command and merged back in when the session is opened again.
//!
//! State sits behind a `std::sync::Mutex` that is never held across an
//! `.await`.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, ScheduleElapsedPolicy};
use crate::error::{CoreError, RepositoryError, Result};
use crate::events::Event;
use crate::pause_store::{FilePauseStore, InMemoryPauseStore, PauseStore};
use crate::repository::{HttpSessionRepository, SessionPatch, SessionRepository};
use crate::session::{
    HistoryEntry, Interruption, NewSession, PauseInterval, Session, SessionCommand,
    SessionLifecycle, SessionSnapshot, SessionStatus,
};
use crate::stats::SessionStats;
use crate::timer::{CountdownTimer, TickerHandle, TimerTick};

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Engine-wide behaviour knobs, usually derived from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnginePolicy {
    pub schedule_elapsed: ScheduleElapsedPolicy,
    /// Buffered events per subscriber before slow receivers lag.
    pub event_capacity: usize,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            schedule_elapsed: ScheduleElapsedPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&Config> for EnginePolicy {
    fn from(config: &Config) -> Self {
        Self {
            schedule_elapsed: config.timer.on_schedule_elapsed,
            ..Self::default()
        }
    }
}

pub struct SessionEngine {
    repo: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    pauses: Arc<dyn PauseStore>,
    policy: EnginePolicy,
    events: broadcast::Sender<Event>,
}

impl SessionEngine {
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        policy: EnginePolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(policy.event_capacity.max(1));
        Self {
            repo,
            clock,
            pauses: Arc::new(InMemoryPauseStore::new()),
            policy,
            events,
        }
    }

    /// Engine against the configured REST backend and the wall clock, with
    /// pause intervals kept in the data directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let repo = HttpSessionRepository::new(&config.api.base_url, config.api.timeout())?
            .with_timezone(config.api.timezone);
        let engine = Self::new(
            Arc::new(repo),
            Arc::new(SystemClock),
            EnginePolicy::from(config),
        );
        Ok(engine.with_pause_store(Arc::new(FilePauseStore::open_default()?)))
    }

    pub fn with_pause_store(mut self, pauses: Arc<dyn PauseStore>) -> Self {
        self.pauses = pauses;
        self
    }

    pub fn policy(&self) -> EnginePolicy {
        self.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Events from every controller this engine created.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn list(&self) -> Result<Vec<Session>> {
        Ok(self.repo.list().await?)
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.repo.history().await?)
    }

    pub async fn stats(&self) -> Result<SessionStats> {
        let sessions = self.list().await?;
        Ok(SessionStats::from_sessions(&sessions))
    }

    /// Create a session in `scheduled` status.
    ///
    /// Input is validated locally first; nothing reaches the repository if
    /// the title is blank or the duration is zero.
    pub async fn schedule(&self, fields: NewSession) -> Result<Arc<SessionController>> {
        fields.validate()?;
        let session = self.repo.create(&fields).await?;
        info!(
            session_id = session.id,
            title = %session.title,
            minutes = session.scheduled_duration_minutes,
            "session scheduled"
        );
        let event = Event::SessionScheduled {
            session_id: session.id,
            title: session.title.clone(),
            scheduled_minutes: session.scheduled_duration_minutes,
            at: session.created_at.unwrap_or_else(|| self.clock.now()),
        };
        let controller = self.controller(session, Vec::new());
        controller.emit(event);
        Ok(controller)
    }

    /// Load a session, its interruptions and the pause intervals measured
    /// by earlier controllers.
    pub async fn open(&self, id: i64) -> Result<Arc<SessionController>> {
        let mut session = self.repo.get(id).await?;
        if session.interruptions.is_empty() {
            session.interruptions = self.repo.list_interruptions(id).await?;
        }
        let saved = self.pauses.load(id).unwrap_or_else(|error| {
            warn!(
                session_id = id,
                %error,
                "cannot read saved pauses; rebuilding from interruptions"
            );
            Vec::new()
        });
        debug!(
            session_id = id,
            status = %session.status,
            saved_pauses = saved.len(),
            "session opened"
        );
        Ok(self.controller(session, saved))
    }

    fn controller(&self, session: Session, saved: Vec<PauseInterval>) -> Arc<SessionController> {
        let mut lifecycle = SessionLifecycle::new(session);
        lifecycle.restore_pauses(saved);
        Arc::new(SessionController::new(
            lifecycle,
            Arc::clone(&self.repo),
            Arc::clone(&self.clock),
            Arc::clone(&self.pauses),
            self.policy,
            self.events.clone(),
        ))
    }
}

struct ControllerState {
    lifecycle: SessionLifecycle,
    timer: CountdownTimer,
}

impl ControllerState {
    /// Ticking iff active.
    fn follow_status(&mut self) {
        if self.lifecycle.status() == SessionStatus::Active {
            self.timer.start_ticking(self.lifecycle.session());
        } else {
            self.timer.stop_ticking();
        }
    }
}

/// What the repository returned for a command.
struct Persisted {
    session: Option<Session>,
    interruption: Option<Interruption>,
}

/// Drives one session against the repository.
pub struct SessionController {
    id: i64,
    repo: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    pauses: Arc<dyn PauseStore>,
    policy: EnginePolicy,
    state: Mutex<ControllerState>,
    in_flight: AtomicBool,
    closed: AtomicBool,
    events: broadcast::Sender<Event>,
    engine_events: broadcast::Sender<Event>,
}

/// Held while a command awaits the repository. Dropping it without
/// [`InFlightGuard::commit`] restores the pre-command lifecycle, which also
/// covers a command future dropped mid-call.
struct InFlightGuard<'a> {
    controller: &'a SessionController,
    restore: Option<SessionLifecycle>,
}

impl InFlightGuard<'_> {
    fn commit(mut self) {
        self.restore = None;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.restore.take() {
            let mut state = self.controller.lock();
            state.lifecycle = previous;
            state.follow_status();
        }
        self.controller.in_flight.store(false, Ordering::Release);
    }
}

impl SessionController {
    fn new(
        lifecycle: SessionLifecycle,
        repo: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        pauses: Arc<dyn PauseStore>,
        policy: EnginePolicy,
        engine_events: broadcast::Sender<Event>,
    ) -> Self {
        let (events, _) = broadcast::channel(policy.event_capacity.max(1));
        let mut state = ControllerState {
            lifecycle,
            timer: CountdownTimer::new(),
        };
        state.follow_status();
        Self {
            id: state.lifecycle.id(),
            repo,
            clock,
            pauses,
            policy,
            state: Mutex::new(state),
            in_flight: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            events,
            engine_events,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().lifecycle.status()
    }

    pub fn session(&self) -> Session {
        self.lock().lifecycle.session().clone()
    }

    pub fn interruptions(&self) -> Vec<Interruption> {
        self.lock().lifecycle.interruptions().to_vec()
    }

    pub fn pause_intervals(&self) -> Vec<PauseInterval> {
        self.lock().lifecycle.pause_intervals().to_vec()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let now = self.clock.now();
        self.lock().lifecycle.snapshot(now)
    }

    pub fn is_ticking(&self) -> bool {
        self.lock().timer.is_ticking()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_command_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn start(&self) -> Result<Session> {
        self.execute(SessionCommand::Start).await
    }

    pub async fn pause(&self, reason: &str) -> Result<Session> {
        self.execute(SessionCommand::Pause {
            reason: reason.to_string(),
        })
        .await
    }

    pub async fn resume(&self) -> Result<Session> {
        self.execute(SessionCommand::Resume).await
    }

    pub async fn complete(&self) -> Result<Session> {
        self.execute(SessionCommand::Complete).await
    }

    pub async fn mark_overdue(&self) -> Result<Session> {
        self.execute(SessionCommand::MarkOverdue).await
    }

    /// One timer step: recompute the snapshot, emit `Tick` (and
    /// `DurationReached` once), then apply the schedule-elapsed policy.
    ///
    /// Returns `None` when the session is not active. A paused session
    /// emits nothing but is still checked against the mark-overdue policy.
    pub async fn tick(&self) -> Option<TimerTick> {
        if self.is_closed() {
            return None;
        }
        let now = self.clock.now();
        let (tick, paused) = {
            let mut state = self.lock();
            let ControllerState { lifecycle, timer } = &mut *state;
            let tick = timer.tick(lifecycle, now);
            let paused = (tick.is_none() && lifecycle.status() == SessionStatus::Paused)
                .then(|| lifecycle.snapshot(now));
            (tick, paused)
        };
        let Some(tick) = tick else {
            if let Some(snapshot) = paused {
                self.apply_schedule_policy(&snapshot).await;
            }
            return None;
        };

        debug!(
            session_id = self.id,
            elapsed = tick.snapshot.elapsed_secs,
            remaining = tick.snapshot.remaining_secs,
            "tick"
        );
        if tick.duration_reached {
            info!(session_id = self.id, "scheduled duration reached");
            self.emit(Event::DurationReached {
                session_id: self.id,
                elapsed_secs: tick.snapshot.elapsed_secs,
                at: now,
            });
        }
        self.emit(Event::Tick(tick.snapshot.clone()));
        self.apply_schedule_policy(&tick.snapshot).await;
        Some(tick)
    }

    /// Drive [`SessionController::tick`] every `period` on the current tokio
    /// runtime, paused periods included. The ticker ends once the session is
    /// terminal or the controller is closed or dropped.
    pub fn spawn_ticker(self: &Arc<Self>, period: Duration) -> TickerHandle {
        let controller = Arc::downgrade(self);
        TickerHandle::spawn(period, move || {
            let controller = controller.clone();
            async move {
                let Some(controller) = controller.upgrade() else {
                    return ControlFlow::Break(());
                };
                if controller.is_closed() || controller.status().is_terminal() {
                    return ControlFlow::Break(());
                }
                controller.tick().await;
                if controller.status().is_terminal() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        })
    }

    /// Stop the timer and refuse further commands. A command still awaiting
    /// the repository returns `Superseded` and its result is dropped.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.lock().timer.stop_ticking();
        info!(session_id = self.id, "session controller closed");
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: Event) {
        // No receivers is fine.
        let _ = self.events.send(event.clone());
        let _ = self.engine_events.send(event);
    }

    fn begin(&self) -> Result<InFlightGuard<'_>> {
        if self.is_closed() {
            return Err(CoreError::Closed {
                session_id: self.id,
            });
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CoreError::CommandInFlight {
                session_id: self.id,
            });
        }
        Ok(InFlightGuard {
            controller: self,
            restore: None,
        })
    }

    async fn execute(&self, command: SessionCommand) -> Result<Session> {
        let mut guard = self.begin()?;

        let from = {
            let now = self.clock.now();
            let mut state = self.lock();
            let before = state.lifecycle.clone();
            state.lifecycle.apply(&command, now)?;
            state.follow_status();
            let from = before.status();
            guard.restore = Some(before);
            from
        };

        let outcome = self.persist(&command).await;

        if self.is_closed() {
            debug!(
                session_id = self.id,
                command = command.name(),
                "controller closed during repository call; result discarded"
            );
            return Err(CoreError::Superseded {
                session_id: self.id,
            });
        }

        let persisted = match outcome {
            Ok(persisted) => persisted,
            Err(error) => {
                drop(guard);
                warn!(
                    session_id = self.id,
                    command = command.name(),
                    %error,
                    "repository call failed; session rolled back"
                );
                self.emit(Event::CommandFailed {
                    session_id: self.id,
                    command: command.name().to_string(),
                    message: error.to_string(),
                    at: self.clock.now(),
                });
                return Err(error.into());
            }
        };

        let now = self.clock.now();
        let (session, pauses, events) = {
            let mut state = self.lock();
            if let Some(interruption) = persisted.interruption.clone() {
                state.lifecycle.record_interruption(interruption);
            }
            if let Some(authoritative) = persisted.session {
                state.lifecycle.reconcile(authoritative, now);
            }
            state.follow_status();
            let events = committed_events(
                &command,
                from,
                &state.lifecycle,
                persisted.interruption.as_ref(),
                now,
            );
            (
                state.lifecycle.session().clone(),
                state.lifecycle.pause_intervals().to_vec(),
                events,
            )
        };
        guard.commit();
        self.save_pauses(&pauses);

        info!(
            session_id = self.id,
            command = command.name(),
            %from,
            to = %session.status,
            "session transition committed"
        );
        for event in events {
            self.emit(event);
        }
        Ok(session)
    }

    /// The backend already holds the transition; a failed save only loses
    /// resume times for the next controller.
    fn save_pauses(&self, pauses: &[PauseInterval]) {
        if let Err(error) = self.pauses.save(self.id, pauses) {
            warn!(session_id = self.id, %error, "cannot save pause intervals");
        }
    }

    async fn persist(&self, command: &SessionCommand) -> Result<Persisted, RepositoryError> {
        let patch = match command {
            SessionCommand::Pause { reason } => return self.persist_pause(reason).await,
            SessionCommand::Start => SessionPatch::Start,
            SessionCommand::Resume => SessionPatch::Resume,
            SessionCommand::Complete => SessionPatch::Complete,
            SessionCommand::MarkOverdue => SessionPatch::MarkOverdue,
        };
        let session = self.repo.update(self.id, patch).await?;
        Ok(Persisted {
            session: Some(session),
            interruption: None,
        })
    }

    async fn persist_pause(&self, reason: &str) -> Result<Persisted, RepositoryError> {
        let interruption = self.repo.create_interruption(self.id, reason).await?;
        // The pause is already recorded; a failed reload keeps the local copy.
        let session = match self.repo.get(self.id).await {
            Ok(session) => Some(session),
            Err(error) => {
                warn!(
                    session_id = self.id,
                    %error,
                    "pause recorded but session reload failed; keeping local state"
                );
                None
            }
        };
        Ok(Persisted {
            session,
            interruption: Some(interruption),
        })
    }

    async fn apply_schedule_policy(&self, snapshot: &SessionSnapshot) {
        let result = match self.policy.schedule_elapsed {
            ScheduleElapsedPolicy::Complete
                if snapshot.status == SessionStatus::Active
                    && snapshot.elapsed_secs >= snapshot.scheduled_secs =>
            {
                self.complete().await
            }
            ScheduleElapsedPolicy::MarkOverdue if snapshot.over_schedule_secs > 0 => {
                self.mark_overdue().await
            }
            _ => return,
        };
        match result {
            Ok(_) | Err(CoreError::CommandInFlight { .. }) => {}
            Err(error) => warn!(session_id = self.id, %error, "automatic transition failed"),
        }
    }
}

fn committed_events(
    command: &SessionCommand,
    from: SessionStatus,
    lifecycle: &SessionLifecycle,
    interruption: Option<&Interruption>,
    now: DateTime<Utc>,
) -> Vec<Event> {
    let session = lifecycle.session();
    let mut events = Vec::new();
    match command {
        SessionCommand::Start => events.push(Event::SessionStarted {
            session_id: session.id,
            at: session.start_time.unwrap_or(now),
        }),
        SessionCommand::Pause { .. } => {
            if let Some(interruption) = interruption {
                events.push(Event::SessionPaused {
                    session_id: session.id,
                    interruption_id: interruption.id,
                    reason: interruption.reason.clone(),
                    at: interruption.pause_time,
                });
            }
        }
        SessionCommand::Resume => {
            let paused_secs = lifecycle
                .pause_intervals()
                .iter()
                .rev()
                .find_map(PauseInterval::duration)
                .map_or(0, |d| d.num_seconds());
            events.push(Event::SessionResumed {
                session_id: session.id,
                paused_secs,
                at: now,
            });
        }
        SessionCommand::Complete | SessionCommand::MarkOverdue => {}
    }
    if session.status.is_terminal() && !from.is_terminal() {
        events.push(Event::SessionEnded {
            session_id: session.id,
            status: session.status,
            elapsed_secs: lifecycle.elapsed_seconds(now),
            at: session.end_time.unwrap_or(now),
        });
    }
    events
}
