//! Integration tests for the session engine and controller.
//!
//! This test file verifies:
//! - The full start/pause/resume/complete flow against the in-memory repository
//! - Rollback when the repository fails
//! - In-flight rejection, close and cancellation
//! - Reconciliation with server-side decisions
//! - Pause intervals surviving a reopen
//! - Schedule-elapsed policies and the periodic ticker

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use deepwork_core::{
    CoreError, EnginePolicy, Event, FilePauseStore, InMemorySessionRepository, ManualClock,
    NewSession, RepositoryError, ScheduleElapsedPolicy, SessionController, SessionEngine,
    SessionStatus, ValidationError,
};
use tokio::sync::{broadcast, Notify};

struct Harness {
    clock: ManualClock,
    repo: Arc<InMemorySessionRepository>,
    engine: SessionEngine,
}

fn harness_with(policy: EnginePolicy, repo_limit: Option<usize>) -> Harness {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
    let mut repo = InMemorySessionRepository::new(Arc::new(clock.clone()));
    if let Some(limit) = repo_limit {
        repo = repo.with_interruption_limit(limit);
    }
    let repo = Arc::new(repo);
    let engine = SessionEngine::new(repo.clone(), Arc::new(clock.clone()), policy);
    Harness {
        clock,
        repo,
        engine,
    }
}

fn harness() -> Harness {
    harness_with(EnginePolicy::default(), None)
}

fn drain(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

async fn wait_until_in_flight(controller: &SessionController) {
    while !controller.is_command_in_flight() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_twenty_five_minute_session_reaches_schedule_once() {
    let h = harness();
    let controller = h
        .engine
        .schedule(NewSession::new("Deep work", 25))
        .await
        .unwrap();
    controller.start().await.unwrap();

    let mut reached = 0;
    for _ in 0..1500 {
        h.clock.advance_secs(1);
        let tick = controller.tick().await.expect("active session ticks");
        if tick.duration_reached {
            reached += 1;
        }
    }

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.elapsed_secs, 1500);
    assert_eq!(snapshot.progress_pct, 100.0);
    assert_eq!(snapshot.remaining_secs, 0);
    assert_eq!(reached, 1);

    // Notify policy: the session keeps running past its schedule.
    h.clock.advance_secs(120);
    let tick = controller.tick().await.unwrap();
    assert!(!tick.duration_reached);
    assert_eq!(tick.snapshot.progress_pct, 100.0);
    assert_eq!(tick.snapshot.over_schedule_secs, 120);
    assert_eq!(controller.status(), SessionStatus::Active);
}

#[tokio::test]
async fn test_start_pause_resume_complete_flow() {
    let h = harness();
    let controller = h
        .engine
        .schedule(NewSession::new("Write report", 25).with_goal("First draft"))
        .await
        .unwrap();

    controller.start().await.unwrap();
    h.clock.advance_secs(600);
    let paused = controller.pause("phone call").await.unwrap();
    assert_eq!(paused.status, SessionStatus::Paused);
    assert_eq!(paused.interruptions.len(), 1);
    assert_eq!(paused.interruptions[0].reason, "phone call");

    h.clock.advance_secs(300);
    controller.resume().await.unwrap();
    h.clock.advance_secs(300);
    let done = controller.complete().await.unwrap();

    assert_eq!(done.status, SessionStatus::Completed);
    assert!(done.end_time.is_some());
    assert_eq!(done.interruptions.len(), 1);
    done.check_invariants().unwrap();

    let intervals = controller.pause_intervals();
    assert_eq!(intervals.len(), 1);
    assert_eq!(intervals[0].interruption_id, Some(done.interruptions[0].id));
    assert_eq!(intervals[0].duration().unwrap().num_seconds(), 300);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.elapsed_secs, 900);
    assert_eq!(snapshot.paused_secs, 300);
    assert!(!controller.is_ticking());
}

#[tokio::test]
async fn test_second_pause_adds_distinct_interruption() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Read", 25)).await.unwrap();
    controller.start().await.unwrap();

    h.clock.advance_secs(60);
    controller.pause("email").await.unwrap();
    h.clock.advance_secs(30);
    controller.resume().await.unwrap();
    let first_paused = controller.snapshot().paused_secs;

    h.clock.advance_secs(60);
    controller.pause("slack").await.unwrap();
    h.clock.advance_secs(45);
    controller.resume().await.unwrap();

    let interruptions = controller.interruptions();
    assert_eq!(interruptions.len(), 2);
    assert_ne!(interruptions[0].id, interruptions[1].id);
    assert!(controller.snapshot().paused_secs > first_paused);
    assert_eq!(controller.snapshot().paused_secs, 75);
    assert_eq!(controller.snapshot().elapsed_secs, 120);
}

#[tokio::test]
async fn test_local_errors_have_no_side_effects() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Plan", 25)).await.unwrap();
    controller.start().await.unwrap();
    let calls = h.repo.call_count();

    let err = controller.pause("   ").await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::EmptyField { field: "reason" })
    ));

    let err = controller.start().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidTransition {
            command: "start",
            from: SessionStatus::Active
        }
    ));

    let err = controller.mark_overdue().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::NotOverSchedule { .. })
    ));

    assert_eq!(h.repo.call_count(), calls);
    assert_eq!(controller.status(), SessionStatus::Active);
    assert!(controller.interruptions().is_empty());
    assert!(controller.pause_intervals().is_empty());
}

#[tokio::test]
async fn test_repository_error_during_complete_rolls_back() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    let mut events = controller.subscribe();
    controller.start().await.unwrap();
    h.clock.advance_secs(120);

    h.repo.fail_next(RepositoryError::Server {
        status: 500,
        message: "database locked".into(),
    });
    let err = controller.complete().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Repository(RepositoryError::Server { status: 500, .. })
    ));

    let session = controller.session();
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.end_time.is_none());
    assert!(controller.is_ticking());
    assert!(!controller.is_command_in_flight());

    let received = drain(&mut events);
    assert!(matches!(
        received.last(),
        Some(Event::CommandFailed { command, .. }) if command == "complete"
    ));

    // The controller stays usable.
    let done = controller.complete().await.unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_repository_error_while_paused_keeps_pause_open() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    controller.start().await.unwrap();
    h.clock.advance_secs(60);
    controller.pause("meeting").await.unwrap();

    h.repo.fail_next(RepositoryError::Timeout);
    assert!(controller.complete().await.is_err());

    assert_eq!(controller.status(), SessionStatus::Paused);
    assert!(controller.pause_intervals()[0].is_open());
    assert!(controller.session().end_time.is_none());
}

#[tokio::test]
async fn test_failed_pause_records_nothing() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    controller.start().await.unwrap();

    h.repo.fail_next(RepositoryError::Transport("connection refused".into()));
    assert!(controller.pause("lunch").await.is_err());

    assert_eq!(controller.status(), SessionStatus::Active);
    assert!(controller.interruptions().is_empty());
    assert!(controller.pause_intervals().is_empty());
}

#[tokio::test]
async fn test_command_in_flight_is_rejected() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    let gate = Arc::new(Notify::new());
    h.repo.set_gate(Some(gate.clone()));

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.start().await }
    });
    wait_until_in_flight(&controller).await;

    // Optimistically applied while the repository call is pending.
    assert_eq!(controller.status(), SessionStatus::Active);
    let err = controller.complete().await.unwrap_err();
    assert!(matches!(err, CoreError::CommandInFlight { .. }));

    gate.notify_one();
    let started = pending.await.unwrap().unwrap();
    assert_eq!(started.status, SessionStatus::Active);
    assert!(!controller.is_command_in_flight());
}

#[tokio::test]
async fn test_close_during_call_discards_result() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    let gate = Arc::new(Notify::new());
    h.repo.set_gate(Some(gate.clone()));

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.start().await }
    });
    wait_until_in_flight(&controller).await;

    controller.close();
    gate.notify_one();
    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, CoreError::Superseded { .. }));
    assert_eq!(controller.status(), SessionStatus::Scheduled);

    h.repo.set_gate(None);
    assert!(matches!(
        controller.start().await,
        Err(CoreError::Closed { .. })
    ));
    assert!(controller.tick().await.is_none());
}

#[tokio::test]
async fn test_dropped_command_restores_state() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    let gate = Arc::new(Notify::new());
    h.repo.set_gate(Some(gate));

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.start().await }
    });
    wait_until_in_flight(&controller).await;

    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());

    assert_eq!(controller.status(), SessionStatus::Scheduled);
    assert!(!controller.is_command_in_flight());
    assert!(!controller.is_ticking());

    h.repo.set_gate(None);
    controller.start().await.unwrap();
}

#[tokio::test]
async fn test_server_side_interruption_limit_is_reconciled() {
    let h = harness_with(EnginePolicy::default(), Some(2));
    let controller = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    let mut events = controller.subscribe();
    controller.start().await.unwrap();

    h.clock.advance_secs(60);
    controller.pause("email").await.unwrap();
    controller.resume().await.unwrap();
    h.clock.advance_secs(60);
    let session = controller.pause("slack").await.unwrap();

    assert_eq!(session.status, SessionStatus::Interrupted);
    assert!(session.end_time.is_some());
    session.check_invariants().unwrap();
    assert!(!controller.is_ticking());

    let received = drain(&mut events);
    assert!(matches!(
        received.last(),
        Some(Event::SessionEnded {
            status: SessionStatus::Interrupted,
            ..
        })
    ));

    assert!(matches!(
        controller.resume().await,
        Err(CoreError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_open_restores_paused_session() {
    let h = harness();
    let first = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    first.start().await.unwrap();
    h.clock.advance_secs(300);
    first.pause("doorbell").await.unwrap();
    first.close();

    h.clock.advance_secs(60);
    let reopened = h.engine.open(first.id()).await.unwrap();
    assert_eq!(reopened.status(), SessionStatus::Paused);
    assert!(!reopened.is_ticking());

    let intervals = reopened.pause_intervals();
    assert_eq!(intervals.len(), 1);
    assert!(intervals[0].is_open());
    assert_eq!(intervals[0].interruption_id, Some(reopened.interruptions()[0].id));
    assert_eq!(reopened.snapshot().elapsed_secs, 300);

    let mut events = reopened.subscribe();
    reopened.resume().await.unwrap();
    assert!(matches!(
        drain(&mut events).first(),
        Some(Event::SessionResumed { paused_secs: 60, .. })
    ));
    assert!(reopened.is_ticking());
}

#[tokio::test]
async fn test_reopened_session_keeps_measured_pauses() {
    let h = harness();
    let first = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    first.start().await.unwrap();
    h.clock.advance_secs(60);
    first.pause("phone call").await.unwrap();
    h.clock.advance_secs(600);
    first.resume().await.unwrap();
    assert_eq!(first.snapshot().elapsed_secs, 60);
    first.close();

    let reopened = h.engine.open(first.id()).await.unwrap();
    assert_eq!(reopened.snapshot().elapsed_secs, 60);
    assert_eq!(reopened.snapshot().paused_secs, 600);
    assert_eq!(reopened.pause_intervals(), first.pause_intervals());
}

#[tokio::test]
async fn test_pauses_saved_to_file_survive_a_new_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pauses.json");
    let h = harness();
    let engine = SessionEngine::new(
        h.repo.clone(),
        Arc::new(h.clock.clone()),
        EnginePolicy::default(),
    )
    .with_pause_store(Arc::new(FilePauseStore::new(&path)));

    let controller = engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    controller.start().await.unwrap();
    h.clock.advance_secs(300);
    controller.pause("email").await.unwrap();
    h.clock.advance_secs(120);
    controller.resume().await.unwrap();
    h.clock.advance_secs(30);
    controller.close();

    // A later run: same backend, fresh engine reading the same file.
    let later = SessionEngine::new(
        h.repo.clone(),
        Arc::new(h.clock.clone()),
        EnginePolicy::default(),
    )
    .with_pause_store(Arc::new(FilePauseStore::new(&path)));
    let reopened = later.open(controller.id()).await.unwrap();
    let snapshot = reopened.snapshot();
    assert_eq!(snapshot.elapsed_secs, 330);
    assert_eq!(snapshot.paused_secs, 120);
    assert_eq!(
        reopened.pause_intervals()[0].interruption_id,
        Some(reopened.interruptions()[0].id)
    );
}

#[tokio::test]
async fn test_completing_paused_session_is_reconciled_as_abandoned() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    let mut events = controller.subscribe();
    controller.start().await.unwrap();
    h.clock.advance_secs(60);
    controller.pause("fire alarm").await.unwrap();
    h.clock.advance_secs(300);

    let session = controller.complete().await.unwrap();
    assert_eq!(session.status, SessionStatus::Abandoned);
    session.check_invariants().unwrap();
    assert_eq!(controller.snapshot().elapsed_secs, 60);
    assert!(matches!(
        drain(&mut events).last(),
        Some(Event::SessionEnded {
            status: SessionStatus::Abandoned,
            elapsed_secs: 60,
            ..
        })
    ));
}

#[tokio::test]
async fn test_late_completion_is_reconciled_as_overdue() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Code", 10)).await.unwrap();
    let mut events = controller.subscribe();
    controller.start().await.unwrap();
    h.clock.advance_secs(12 * 60);

    let session = controller.complete().await.unwrap();
    assert_eq!(session.status, SessionStatus::Overdue);
    assert!(matches!(
        drain(&mut events).last(),
        Some(Event::SessionEnded {
            status: SessionStatus::Overdue,
            ..
        })
    ));
}

#[tokio::test]
async fn test_open_unknown_session_is_not_found() {
    let h = harness();
    assert!(matches!(
        h.engine.open(42).await.err(),
        Some(CoreError::Repository(RepositoryError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn test_complete_policy_finishes_on_schedule() {
    let policy = EnginePolicy {
        schedule_elapsed: ScheduleElapsedPolicy::Complete,
        ..EnginePolicy::default()
    };
    let h = harness_with(policy, None);
    let controller = h.engine.schedule(NewSession::new("Sprint", 1)).await.unwrap();
    controller.start().await.unwrap();

    h.clock.advance_secs(59);
    controller.tick().await.unwrap();
    assert_eq!(controller.status(), SessionStatus::Active);

    h.clock.advance_secs(1);
    let tick = controller.tick().await.unwrap();
    assert!(tick.duration_reached);
    assert_eq!(controller.status(), SessionStatus::Completed);
    assert!(controller.tick().await.is_none());
}

#[tokio::test]
async fn test_mark_overdue_policy_waits_for_overrun() {
    let policy = EnginePolicy {
        schedule_elapsed: ScheduleElapsedPolicy::MarkOverdue,
        ..EnginePolicy::default()
    };
    let h = harness_with(policy, None);
    let controller = h.engine.schedule(NewSession::new("Sprint", 1)).await.unwrap();
    controller.start().await.unwrap();

    h.clock.advance_secs(60);
    controller.tick().await.unwrap();
    assert_eq!(controller.status(), SessionStatus::Active);

    h.clock.advance_secs(1);
    controller.tick().await.unwrap();
    let session = controller.session();
    assert_eq!(session.status, SessionStatus::Overdue);
    session.check_invariants().unwrap();
}

#[tokio::test]
async fn test_mark_overdue_policy_applies_while_paused() {
    let policy = EnginePolicy {
        schedule_elapsed: ScheduleElapsedPolicy::MarkOverdue,
        ..EnginePolicy::default()
    };
    let h = harness_with(policy, None);
    let controller = h.engine.schedule(NewSession::new("Sprint", 1)).await.unwrap();
    let mut events = controller.subscribe();
    controller.start().await.unwrap();

    // Ran past the schedule without a tick, then paused.
    h.clock.advance_secs(120);
    controller.pause("lunch").await.unwrap();
    h.clock.advance_secs(5);

    assert!(controller.tick().await.is_none());
    let session = controller.session();
    assert_eq!(session.status, SessionStatus::Overdue);
    session.check_invariants().unwrap();
    assert!(matches!(
        drain(&mut events).last(),
        Some(Event::SessionEnded {
            status: SessionStatus::Overdue,
            elapsed_secs: 120,
            ..
        })
    ));
}

#[tokio::test]
async fn test_complete_policy_leaves_paused_session_alone() {
    let policy = EnginePolicy {
        schedule_elapsed: ScheduleElapsedPolicy::Complete,
        ..EnginePolicy::default()
    };
    let h = harness_with(policy, None);
    let controller = h.engine.schedule(NewSession::new("Sprint", 1)).await.unwrap();
    controller.start().await.unwrap();
    h.clock.advance_secs(60);
    controller.pause("lunch").await.unwrap();

    let calls = h.repo.call_count();
    assert!(controller.tick().await.is_none());
    assert_eq!(controller.status(), SessionStatus::Paused);
    assert_eq!(h.repo.call_count(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_ticker_drives_ticks_until_session_ends() {
    let h = harness();
    let controller = h.engine.schedule(NewSession::new("Code", 25)).await.unwrap();
    let mut events = controller.subscribe();
    controller.start().await.unwrap();

    let ticker = controller.spawn_ticker(Duration::from_secs(1));
    for _ in 0..3 {
        h.clock.advance_secs(1);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert!(ticker.is_running());

    controller.complete().await.unwrap();
    ticker.finished().await;

    let ticks = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, Event::Tick(_)))
        .count();
    assert!(ticks >= 3);
}

#[tokio::test]
async fn test_engine_events_cover_all_sessions() {
    let h = harness();
    let mut events = h.engine.subscribe();

    let a = h.engine.schedule(NewSession::new("A", 25)).await.unwrap();
    let b = h.engine.schedule(NewSession::new("B", 25)).await.unwrap();
    a.start().await.unwrap();
    b.start().await.unwrap();

    let ids: Vec<i64> = drain(&mut events).iter().map(Event::session_id).collect();
    assert_eq!(ids, vec![a.id(), b.id(), a.id(), b.id()]);
}

#[tokio::test]
async fn test_engine_history_and_stats() {
    let h = harness();
    let done = h.engine.schedule(NewSession::new("Write A", 25)).await.unwrap();
    done.start().await.unwrap();
    h.clock.advance_secs(25 * 60);
    done.complete().await.unwrap();
    h.engine.schedule(NewSession::new("Write B", 25)).await.unwrap();

    let history = h.engine.history().await.unwrap();
    assert_eq!(history.len(), 2);
    let entry = history.iter().find(|e| e.id == done.id()).unwrap();
    assert_eq!(entry.completion_ratio, 1.0);

    let stats = h.engine.stats().await.unwrap();
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.completed_sessions, 1);
    assert_eq!(stats.completion_rate_pct, 50);
    assert_eq!(stats.total_focus_min, 25);
}
