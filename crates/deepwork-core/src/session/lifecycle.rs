//! Session lifecycle state machine.
//!
//! Pure and synchronous: every operation takes the current instant from the
//! caller, and a failed command leaves the lifecycle untouched.
//!
//! ## State Transitions
//!
//! ```text
//! Scheduled -> Active <-> Paused
//! Active | Paused -> Completed | Overdue
//! ```
//!
//! `Interrupted` and `Abandoned` are only ever reported by the repository;
//! they are accepted on reconcile like any other terminal status.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::model::{Interruption, Session};
use super::status::{SessionStatus, StatusColor};
use crate::error::{CoreError, Result, ValidationError};

/// A user or system command against one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    Start,
    Pause { reason: String },
    Resume,
    Complete,
    MarkOverdue,
}

impl SessionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::Start => "start",
            SessionCommand::Pause { .. } => "pause",
            SessionCommand::Resume => "resume",
            SessionCommand::Complete => "complete",
            SessionCommand::MarkOverdue => "mark overdue",
        }
    }
}

/// Locally measured pause. `interruption_id` is filled in once the
/// repository has recorded the matching interruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseInterval {
    pub interruption_id: Option<i64>,
    pub paused_at: DateTime<Utc>,
    pub resumed_at: Option<DateTime<Utc>>,
}

impl PauseInterval {
    /// Paused time inside `[paused_at, reference]`.
    fn paused_until(&self, reference: DateTime<Utc>) -> Duration {
        let end = self.resumed_at.map_or(reference, |r| r.min(reference));
        (end - self.paused_at).max(Duration::zero())
    }

    /// Measured length, once resumed.
    pub fn duration(&self) -> Option<Duration> {
        self.resumed_at.map(|resumed| (resumed - self.paused_at).max(Duration::zero()))
    }

    pub fn is_open(&self) -> bool {
        self.resumed_at.is_none()
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: i64,
    pub title: String,
    pub status: SessionStatus,
    pub label: String,
    pub color: StatusColor,
    pub elapsed_secs: i64,
    pub remaining_secs: i64,
    pub scheduled_secs: i64,
    pub progress_pct: f64,
    /// Display-only "over schedule" annotation.
    pub over_schedule_secs: i64,
    pub paused_secs: i64,
    pub interruption_count: usize,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionLifecycle {
    session: Session,
    pauses: Vec<PauseInterval>,
}

impl SessionLifecycle {
    /// Wrap a session loaded from the repository.
    ///
    /// Resume times of earlier pauses are not stored server-side, so only a
    /// currently open pause can be reconstructed (from the latest
    /// interruption). [`Self::restore_pauses`] brings back the rest.
    pub fn new(session: Session) -> Self {
        let mut lifecycle = Self {
            session,
            pauses: Vec::new(),
        };
        if lifecycle.session.status == SessionStatus::Paused {
            let open = lifecycle.latest_interruption().map(|i| PauseInterval {
                interruption_id: Some(i.id),
                paused_at: i.pause_time,
                resumed_at: None,
            });
            lifecycle.pauses.extend(open);
        }
        lifecycle
    }

    /// Merge pause intervals measured by an earlier controller for this
    /// session. They replace the reconstruction done by [`Self::new`], except
    /// that a pause opened elsewhere is kept.
    pub fn restore_pauses(&mut self, mut saved: Vec<PauseInterval>) {
        let status = self.session.status;
        if saved.is_empty() || status == SessionStatus::Scheduled {
            return;
        }
        saved.sort_by_key(|p| p.paused_at);

        if status == SessionStatus::Active {
            for open in saved.iter_mut().filter(|p| p.is_open()) {
                // Resumed by another client at an unknown time.
                warn!(
                    session_id = self.session.id,
                    "saved pause has no resume time; counted as zero length"
                );
                open.resumed_at = Some(open.paused_at);
            }
        }
        if status == SessionStatus::Paused && !saved.iter().any(PauseInterval::is_open) {
            saved.extend(self.pauses.drain(..).filter(PauseInterval::is_open));
        }
        self.pauses = saved;
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn id(&self) -> i64 {
        self.session.id
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn interruptions(&self) -> &[Interruption] {
        &self.session.interruptions
    }

    pub fn pause_intervals(&self) -> &[PauseInterval] {
        &self.pauses
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Instant up to which time is counted: `now` while in progress, the end
    /// time once terminal.
    fn reference(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.session.status {
            SessionStatus::Scheduled => None,
            SessionStatus::Active | SessionStatus::Paused => Some(now),
            SessionStatus::Completed
            | SessionStatus::Interrupted
            | SessionStatus::Abandoned
            | SessionStatus::Overdue => Some(self.session.end_time.unwrap_or(now)),
        }
    }

    fn paused_duration(&self, reference: DateTime<Utc>) -> Duration {
        self.pauses
            .iter()
            .fold(Duration::zero(), |acc, p| acc + p.paused_until(reference))
    }

    pub fn cumulative_paused_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.reference(now)
            .map(|reference| self.paused_duration(reference).num_seconds())
            .unwrap_or(0)
    }

    /// `reference - start_time - paused`, frozen while paused and once terminal.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let (Some(reference), Some(start)) = (self.reference(now), self.session.start_time) else {
            return 0;
        };
        let worked = (reference - start) - self.paused_duration(reference);
        worked.num_seconds().max(0)
    }

    /// 0.0 .. 100.0 of the scheduled duration.
    pub fn progress_percent(&self, now: DateTime<Utc>) -> f64 {
        let scheduled = self.session.scheduled_secs();
        if scheduled <= 0 {
            return 0.0;
        }
        (self.elapsed_seconds(now) as f64 / scheduled as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.session.scheduled_secs() - self.elapsed_seconds(now)).max(0)
    }

    pub fn over_schedule_seconds(&self, now: DateTime<Utc>) -> i64 {
        if self.session.start_time.is_none() {
            return 0;
        }
        (self.elapsed_seconds(now) - self.session.scheduled_secs()).max(0)
    }

    pub fn has_reached_schedule(&self, now: DateTime<Utc>) -> bool {
        self.session.start_time.is_some()
            && self.elapsed_seconds(now) >= self.session.scheduled_secs()
    }

    /// Ran past the schedule without being completed.
    pub fn is_over_schedule(&self, now: DateTime<Utc>) -> bool {
        self.session.status.is_in_progress()
            && self.elapsed_seconds(now) > self.session.scheduled_secs()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        let status = self.session.status;
        SessionSnapshot {
            session_id: self.session.id,
            title: self.session.title.clone(),
            status,
            label: status.label().to_string(),
            color: status.color(),
            elapsed_secs: self.elapsed_seconds(now),
            remaining_secs: self.remaining_seconds(now),
            scheduled_secs: self.session.scheduled_secs(),
            progress_pct: self.progress_percent(now),
            over_schedule_secs: self.over_schedule_seconds(now),
            paused_secs: self.cumulative_paused_seconds(now),
            interruption_count: self.session.interruptions.len(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn apply(&mut self, command: &SessionCommand, now: DateTime<Utc>) -> Result<()> {
        match command {
            SessionCommand::Start => self.start(now),
            SessionCommand::Pause { reason } => self.pause(reason, now),
            SessionCommand::Resume => self.resume(now),
            SessionCommand::Complete => self.complete(now),
            SessionCommand::MarkOverdue => self.mark_overdue(now),
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.require("start", &[SessionStatus::Scheduled])?;
        self.session.start_time = Some(now);
        self.session.status = SessionStatus::Active;
        Ok(())
    }

    pub fn pause(&mut self, reason: &str, now: DateTime<Utc>) -> Result<()> {
        if reason.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "reason" }.into());
        }
        self.require("pause", &[SessionStatus::Active])?;
        self.pauses.push(PauseInterval {
            interruption_id: None,
            paused_at: now,
            resumed_at: None,
        });
        self.session.status = SessionStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.require("resume", &[SessionStatus::Paused])?;
        self.close_open_pause(now);
        self.session.status = SessionStatus::Active;
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.require("complete", &[SessionStatus::Active, SessionStatus::Paused])?;
        self.finish(SessionStatus::Completed, now);
        Ok(())
    }

    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.require("mark overdue", &[SessionStatus::Active, SessionStatus::Paused])?;
        if !self.is_over_schedule(now) {
            return Err(ValidationError::NotOverSchedule {
                elapsed_secs: self.elapsed_seconds(now),
                scheduled_secs: self.session.scheduled_secs(),
            }
            .into());
        }
        self.finish(SessionStatus::Overdue, now);
        Ok(())
    }

    // ── Repository reconciliation ────────────────────────────────────

    /// Attach an interruption recorded by the repository to the most recent
    /// pause that has none yet. Duplicate ids are ignored.
    pub fn record_interruption(&mut self, interruption: Interruption) {
        if let Some(open) = self
            .pauses
            .iter_mut()
            .rev()
            .find(|p| p.interruption_id.is_none())
        {
            open.interruption_id = Some(interruption.id);
            if open.is_open() {
                open.paused_at = interruption.pause_time;
            }
        }
        if !self.session.interruptions.iter().any(|i| i.id == interruption.id) {
            self.session.interruptions.push(interruption);
        }
    }

    /// Adopt the repository's copy of the session.
    ///
    /// The repository wins on every persisted field. Local pause intervals
    /// are kept; records that break the timestamp invariants are corrected
    /// with a warning.
    pub fn reconcile(&mut self, mut authoritative: Session, now: DateTime<Utc>) {
        if authoritative.interruptions.is_empty() && !self.session.interruptions.is_empty() {
            // Not every backend response embeds the interruption list.
            authoritative.interruptions = std::mem::take(&mut self.session.interruptions);
        }
        authoritative.interruptions.sort_by_key(|i| (i.pause_time, i.id));

        normalize(&mut authoritative, self.session.start_time, now);

        match authoritative.status {
            SessionStatus::Paused if !self.pauses.iter().any(PauseInterval::is_open) => {
                let paused_at = authoritative
                    .interruptions
                    .last()
                    .map_or(now, |i| i.pause_time);
                self.pauses.push(PauseInterval {
                    interruption_id: None,
                    paused_at,
                    resumed_at: None,
                });
            }
            SessionStatus::Active => self.close_open_pause(now),
            _ => {}
        }

        // Link unlinked pauses to interruptions by position from the end.
        let offset = authoritative
            .interruptions
            .len()
            .saturating_sub(self.pauses.len());
        let skip = self.pauses.len().saturating_sub(authoritative.interruptions.len());
        for (pause, interruption) in self
            .pauses
            .iter_mut()
            .skip(skip)
            .zip(authoritative.interruptions.iter().skip(offset))
        {
            if pause.interruption_id.is_none() {
                pause.interruption_id = Some(interruption.id);
            }
        }

        self.session = authoritative;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn require(&self, command: &'static str, allowed: &[SessionStatus]) -> Result<()> {
        if allowed.contains(&self.session.status) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                command,
                from: self.session.status,
            })
        }
    }

    fn finish(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        self.session.end_time = Some(now);
        self.session.status = status;
    }

    fn close_open_pause(&mut self, now: DateTime<Utc>) {
        if let Some(open) = self.pauses.iter_mut().rev().find(|p| p.is_open()) {
            open.resumed_at = Some(now.max(open.paused_at));
        }
    }

    fn latest_interruption(&self) -> Option<&Interruption> {
        self.session
            .interruptions
            .iter()
            .max_by_key(|i| (i.pause_time, i.id))
    }
}

/// Restore the timestamp invariants on a record coming from the repository.
fn normalize(session: &mut Session, local_start: Option<DateTime<Utc>>, now: DateTime<Utc>) {
    let status = session.status;
    if status == SessionStatus::Scheduled {
        if session.start_time.take().is_some() {
            warn!(session_id = session.id, "scheduled session carried a start_time; cleared");
        }
    } else if session.start_time.is_none() {
        warn!(session_id = session.id, %status, "session without start_time; using local value");
        session.start_time = Some(local_start.unwrap_or(now));
    }

    if status.is_terminal() {
        if session.end_time.is_none() {
            warn!(
                session_id = session.id,
                %status,
                "terminal session without end_time; stamping locally"
            );
            session.end_time = Some(now);
        }
    } else if session.end_time.take().is_some() {
        warn!(
            session_id = session.id,
            %status,
            "non-terminal session carried an end_time; cleared"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    fn scheduled(minutes: u32) -> SessionLifecycle {
        SessionLifecycle::new(Session {
            id: 1,
            title: "Deep work".into(),
            goal: None,
            scheduled_duration_minutes: minutes,
            status: SessionStatus::Scheduled,
            start_time: None,
            end_time: None,
            created_at: Some(t0()),
            interruptions: vec![],
        })
    }

    fn interruption(id: i64, at: DateTime<Utc>) -> Interruption {
        Interruption {
            id,
            session_id: 1,
            reason: "phone call".into(),
            pause_time: at,
        }
    }

    #[test]
    fn start_sets_start_time_once() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        assert_eq!(lc.status(), SessionStatus::Active);
        assert_eq!(lc.session().start_time, Some(t0()));

        let before = lc.clone();
        let err = lc.start(t0() + secs(5)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition { command: "start", from: SessionStatus::Active }
        ));
        assert_eq!(lc, before);
    }

    #[test]
    fn empty_reason_is_a_validation_error() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        let before = lc.clone();
        let err = lc.pause("  ", t0() + secs(10)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::EmptyField { field: "reason" })
        ));
        assert_eq!(lc, before);
    }

    #[test]
    fn pause_from_scheduled_is_invalid() {
        let mut lc = scheduled(25);
        let err = lc.pause("coffee", t0()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { command: "pause", .. }));
        assert!(lc.pause_intervals().is_empty());
    }

    #[test]
    fn elapsed_excludes_paused_time() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        lc.pause("phone call", t0() + secs(300)).unwrap();

        // Frozen while paused.
        assert_eq!(lc.elapsed_seconds(t0() + secs(300)), 300);
        assert_eq!(lc.elapsed_seconds(t0() + secs(900)), 300);
        assert_eq!(lc.cumulative_paused_seconds(t0() + secs(900)), 600);

        lc.resume(t0() + secs(900)).unwrap();
        assert_eq!(lc.elapsed_seconds(t0() + secs(960)), 360);
        assert_eq!(lc.pause_intervals()[0].duration(), Some(secs(600)));
    }

    #[test]
    fn complete_freezes_elapsed_at_end_time() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        lc.complete(t0() + secs(1200)).unwrap();
        assert_eq!(lc.status(), SessionStatus::Completed);
        assert_eq!(lc.session().end_time, Some(t0() + secs(1200)));
        assert_eq!(lc.elapsed_seconds(t0() + secs(5000)), 1200);
        lc.session().check_invariants().unwrap();
    }

    #[test]
    fn complete_while_paused_counts_pause_until_end() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        lc.pause("meeting", t0() + secs(100)).unwrap();
        lc.complete(t0() + secs(400)).unwrap();
        assert_eq!(lc.elapsed_seconds(t0() + secs(9999)), 100);
        assert_eq!(lc.cumulative_paused_seconds(t0() + secs(9999)), 300);
    }

    #[test]
    fn terminal_status_rejects_everything() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        lc.complete(t0() + secs(60)).unwrap();
        for command in [
            SessionCommand::Start,
            SessionCommand::Pause { reason: "x".into() },
            SessionCommand::Resume,
            SessionCommand::Complete,
            SessionCommand::MarkOverdue,
        ] {
            assert!(
                matches!(
                    lc.apply(&command, t0() + secs(120)),
                    Err(CoreError::InvalidTransition { .. })
                ),
                "{} accepted from completed",
                command.name()
            );
        }
    }

    #[test]
    fn progress_is_clamped() {
        let mut lc = scheduled(1);
        assert_eq!(lc.progress_percent(t0()), 0.0);
        lc.start(t0()).unwrap();
        assert_eq!(lc.progress_percent(t0() + secs(30)), 50.0);
        assert_eq!(lc.progress_percent(t0() + secs(600)), 100.0);
        assert_eq!(lc.over_schedule_seconds(t0() + secs(600)), 540);
        assert_eq!(lc.remaining_seconds(t0() + secs(600)), 0);
    }

    #[test]
    fn mark_overdue_requires_running_past_schedule() {
        let mut lc = scheduled(1);
        lc.start(t0()).unwrap();
        let err = lc.mark_overdue(t0() + secs(60)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::NotOverSchedule { .. })));

        lc.mark_overdue(t0() + secs(61)).unwrap();
        assert_eq!(lc.status(), SessionStatus::Overdue);
        assert_eq!(lc.session().end_time, Some(t0() + secs(61)));
    }

    #[test]
    fn record_interruption_links_open_pause() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        lc.pause("phone call", t0() + secs(60)).unwrap();
        lc.record_interruption(interruption(11, t0() + secs(61)));
        lc.record_interruption(interruption(11, t0() + secs(61)));

        assert_eq!(lc.interruptions().len(), 1);
        assert_eq!(lc.pause_intervals()[0].interruption_id, Some(11));
        assert_eq!(lc.pause_intervals()[0].paused_at, t0() + secs(61));
    }

    #[test]
    fn reconcile_adopts_repository_status_and_fixes_missing_end_time() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        lc.pause("phone call", t0() + secs(60)).unwrap();

        let mut server = lc.session().clone();
        server.status = SessionStatus::Interrupted;
        server.interruptions = vec![interruption(4, t0() + secs(60))];
        lc.reconcile(server, t0() + secs(70));

        assert_eq!(lc.status(), SessionStatus::Interrupted);
        assert_eq!(lc.session().end_time, Some(t0() + secs(70)));
        assert_eq!(lc.pause_intervals()[0].interruption_id, Some(4));
        lc.session().check_invariants().unwrap();
    }

    #[test]
    fn reconcile_keeps_local_interruptions_when_response_omits_them() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        lc.pause("phone call", t0() + secs(60)).unwrap();
        lc.record_interruption(interruption(4, t0() + secs(60)));

        let mut server = lc.session().clone();
        server.interruptions.clear();
        lc.reconcile(server, t0() + secs(61));
        assert_eq!(lc.interruptions().len(), 1);
    }

    #[test]
    fn loading_a_paused_session_reopens_its_pause() {
        let session = Session {
            id: 1,
            title: "t".into(),
            goal: None,
            scheduled_duration_minutes: 25,
            status: SessionStatus::Paused,
            start_time: Some(t0()),
            end_time: None,
            created_at: None,
            interruptions: vec![interruption(1, t0() + secs(100))],
        };
        let lc = SessionLifecycle::new(session);
        assert_eq!(lc.elapsed_seconds(t0() + secs(500)), 100);
        assert!(lc.pause_intervals()[0].is_open());
    }

    #[test]
    fn restored_pauses_keep_elapsed_excluding_closed_pauses() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        lc.pause("phone call", t0() + secs(60)).unwrap();
        lc.record_interruption(interruption(1, t0() + secs(60)));
        lc.resume(t0() + secs(660)).unwrap();
        let saved = lc.pause_intervals().to_vec();

        let mut reloaded = SessionLifecycle::new(lc.session().clone());
        assert_eq!(reloaded.elapsed_seconds(t0() + secs(700)), 700);
        reloaded.restore_pauses(saved);
        assert_eq!(reloaded.elapsed_seconds(t0() + secs(700)), 100);
        assert_eq!(reloaded.cumulative_paused_seconds(t0() + secs(700)), 600);
    }

    #[test]
    fn restore_keeps_a_pause_opened_elsewhere() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        lc.pause("email", t0() + secs(60)).unwrap();
        lc.resume(t0() + secs(120)).unwrap();
        let saved = lc.pause_intervals().to_vec();

        let mut server = lc.session().clone();
        server.status = SessionStatus::Paused;
        server.interruptions = vec![
            interruption(1, t0() + secs(60)),
            interruption(2, t0() + secs(300)),
        ];
        let mut reloaded = SessionLifecycle::new(server);
        reloaded.restore_pauses(saved);

        let pauses = reloaded.pause_intervals();
        assert_eq!(pauses.len(), 2);
        assert!(pauses[1].is_open());
        assert_eq!(pauses[1].interruption_id, Some(2));
        // 60s paused, then frozen at 300 - 60.
        assert_eq!(reloaded.elapsed_seconds(t0() + secs(1000)), 240);
    }

    #[test]
    fn restore_closes_open_pause_when_session_was_resumed_elsewhere() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        lc.pause("email", t0() + secs(60)).unwrap();
        let saved = lc.pause_intervals().to_vec();

        let mut server = lc.session().clone();
        server.status = SessionStatus::Active;
        let mut reloaded = SessionLifecycle::new(server);
        reloaded.restore_pauses(saved);
        assert!(reloaded.pause_intervals().iter().all(|p| !p.is_open()));
        assert_eq!(reloaded.elapsed_seconds(t0() + secs(100)), 100);
    }

    #[test]
    fn snapshot_carries_presentation() {
        let mut lc = scheduled(25);
        lc.start(t0()).unwrap();
        let snap = lc.snapshot(t0() + secs(750));
        assert_eq!(snap.label, "Active");
        assert_eq!(snap.color, StatusColor::Green);
        assert_eq!(snap.elapsed_secs, 750);
        assert_eq!(snap.remaining_secs, 750);
        assert_eq!(snap.progress_pct, 50.0);
    }
}
