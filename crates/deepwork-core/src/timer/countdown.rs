//! Countdown timer driver.
//!
//! Cooperative: no internal thread. The owner calls `tick()` once per
//! period (see [`super::TickerHandle`]) and every tick recomputes the derived
//! fields from the lifecycle against the supplied instant.
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = CountdownTimer::new();
//! timer.start_ticking(lifecycle.session());
//! // once per second:
//! if let Some(tick) = timer.tick(&lifecycle, clock.now()) {
//!     render(&tick.snapshot);
//! }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};

use crate::session::{Session, SessionLifecycle, SessionSnapshot, SessionStatus};

/// Invoked once, when elapsed time first reaches the scheduled duration.
pub type DurationReachedCallback = Box<dyn FnMut(&SessionSnapshot) + Send>;

#[derive(Debug, Clone, PartialEq)]
pub struct TimerTick {
    pub snapshot: SessionSnapshot,
    /// True on exactly one tick per session.
    pub duration_reached: bool,
}

pub struct CountdownTimer {
    target: Option<i64>,
    ticking: bool,
    fired: bool,
    on_duration_reached: Option<DurationReachedCallback>,
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self {
            target: None,
            ticking: false,
            fired: false,
            on_duration_reached: None,
        }
    }

    pub fn with_callback(callback: DurationReachedCallback) -> Self {
        let mut timer = Self::new();
        timer.on_duration_reached = Some(callback);
        timer
    }

    pub fn set_callback(&mut self, callback: DurationReachedCallback) {
        self.on_duration_reached = Some(callback);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn target(&self) -> Option<i64> {
        self.target
    }

    /// Whether the duration-reached notification already went out.
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin ticking for `session`. A no-op when already ticking for it;
    /// switching to another session resets the notification.
    pub fn start_ticking(&mut self, session: &Session) {
        if self.target != Some(session.id) {
            self.target = Some(session.id);
            self.fired = false;
        }
        self.ticking = true;
    }

    /// Safe to call at any time.
    pub fn stop_ticking(&mut self) {
        self.ticking = false;
    }

    /// Recompute the snapshot. Returns `None` when not ticking; stops itself
    /// once the session is no longer active.
    pub fn tick(&mut self, lifecycle: &SessionLifecycle, now: DateTime<Utc>) -> Option<TimerTick> {
        if !self.ticking || self.target != Some(lifecycle.id()) {
            return None;
        }
        if lifecycle.status() != SessionStatus::Active {
            self.stop_ticking();
            return None;
        }

        let snapshot = lifecycle.snapshot(now);
        let duration_reached = !self.fired && lifecycle.has_reached_schedule(now);
        if duration_reached {
            self.fired = true;
            if let Some(callback) = self.on_duration_reached.as_mut() {
                callback(&snapshot);
            }
        }
        Some(TimerTick {
            snapshot,
            duration_reached,
        })
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("target", &self.target)
            .field("ticking", &self.ticking)
            .field("fired", &self.fired)
            .field("has_callback", &self.on_duration_reached.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn lifecycle(id: i64, minutes: u32) -> SessionLifecycle {
        let mut lc = SessionLifecycle::new(Session {
            id,
            title: "Focus".into(),
            goal: None,
            scheduled_duration_minutes: minutes,
            status: SessionStatus::Scheduled,
            start_time: None,
            end_time: None,
            created_at: None,
            interruptions: vec![],
        });
        lc.start(t0()).unwrap();
        lc
    }

    #[test]
    fn not_ticking_returns_none() {
        let lc = lifecycle(1, 25);
        let mut timer = CountdownTimer::new();
        assert!(timer.tick(&lc, t0()).is_none());
        timer.stop_ticking();
        timer.stop_ticking();
        assert!(!timer.is_ticking());
    }

    #[test]
    fn fires_exactly_once_at_scheduled_duration() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let mut timer = CountdownTimer::with_callback(Box::new(move |snap| {
            assert_eq!(snap.progress_pct, 100.0);
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let lc = lifecycle(1, 25);
        timer.start_ticking(lc.session());

        let mut reached_ticks = 0;
        for s in 1..=1600 {
            let tick = timer.tick(&lc, t0() + Duration::seconds(s)).unwrap();
            if tick.duration_reached {
                reached_ticks += 1;
                assert_eq!(s, 1500);
            }
        }
        assert_eq!(reached_ticks, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn start_ticking_is_idempotent() {
        let lc = lifecycle(1, 1);
        let mut timer = CountdownTimer::new();
        timer.start_ticking(lc.session());
        assert!(timer.tick(&lc, t0() + Duration::seconds(60)).unwrap().duration_reached);

        timer.start_ticking(lc.session());
        assert!(timer.has_fired());
        assert!(!timer.tick(&lc, t0() + Duration::seconds(61)).unwrap().duration_reached);
    }

    #[test]
    fn retargeting_resets_notification() {
        let first = lifecycle(1, 1);
        let second = lifecycle(2, 1);
        let mut timer = CountdownTimer::new();
        timer.start_ticking(first.session());
        timer.tick(&first, t0() + Duration::seconds(60));

        timer.start_ticking(second.session());
        assert!(!timer.has_fired());
        assert!(timer.tick(&first, t0() + Duration::seconds(61)).is_none());
        assert!(timer.tick(&second, t0() + Duration::seconds(61)).unwrap().duration_reached);
    }

    #[test]
    fn stops_when_session_leaves_active() {
        let mut lc = lifecycle(1, 25);
        let mut timer = CountdownTimer::new();
        timer.start_ticking(lc.session());
        lc.pause("phone call", t0() + Duration::seconds(10)).unwrap();

        assert!(timer.tick(&lc, t0() + Duration::seconds(11)).is_none());
        assert!(!timer.is_ticking());
    }
}
