use std::io::Write;
use std::time::Duration;

use clap::Subcommand;
use deepwork_core::config::NotificationsConfig;
use deepwork_core::timer::{format_clock, format_minutes};
use deepwork_core::{
    Event, HistoryEntry, Interruption, NewSession, Session, SessionController, SessionEngine,
    SessionSnapshot, SessionStatus,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use super::{engine, load_config, CommandResult, Output};

#[derive(Subcommand)]
pub enum SessionAction {
    /// List all sessions, newest first
    List,
    /// Show one session with its live progress
    Show {
        /// Session ID
        id: i64,
    },
    /// Schedule a new session
    Create {
        /// Session title
        title: String,
        /// What this session should achieve
        #[arg(long)]
        goal: Option<String>,
        /// Scheduled duration in minutes (defaults to sessions.default_duration_minutes)
        #[arg(long)]
        duration: Option<u32>,
    },
    /// Start a scheduled session
    Start {
        /// Session ID
        id: i64,
    },
    /// Pause an active session and log why
    Pause {
        /// Session ID
        id: i64,
        /// Interruption reason
        #[arg(long)]
        reason: String,
    },
    /// Resume a paused session
    Resume {
        /// Session ID
        id: i64,
    },
    /// Complete an active or paused session
    Complete {
        /// Session ID
        id: i64,
    },
    /// List a session's interruptions
    Interruptions {
        /// Session ID
        id: i64,
    },
    /// Per-session pause counts and completion ratios
    History,
    /// Live countdown until the session ends or Ctrl-C
    Watch {
        /// Session ID
        id: i64,
        /// Tick period (defaults to timer.tick_interval_ms)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

/// A session plus its derived fields, as printed by `show` and commands.
#[derive(Serialize)]
struct SessionView<'a> {
    #[serde(flatten)]
    session: &'a Session,
    snapshot: SessionSnapshot,
}

pub async fn run(action: SessionAction, api_url: Option<&str>, output: Output) -> CommandResult {
    let config = load_config(api_url)?;
    let engine = engine(&config)?;

    match action {
        SessionAction::List => {
            let sessions = engine.list().await?;
            output.emit(&sessions, || {
                if sessions.is_empty() {
                    return "no sessions".to_string();
                }
                sessions.iter().map(session_line).collect::<Vec<_>>().join("\n")
            })?;
        }
        SessionAction::Show { id } => {
            let controller = engine.open(id).await?;
            print_session(&controller, output)?;
            controller.close();
        }
        SessionAction::Create {
            title,
            goal,
            duration,
        } => {
            let minutes = duration.unwrap_or(config.sessions.default_duration_minutes);
            let mut fields = NewSession::new(title, minutes);
            if let Some(goal) = goal {
                fields = fields.with_goal(goal);
            }
            let controller = engine.schedule(fields).await?;
            let session = controller.session();
            output.emit(&session, || format!("Session scheduled: {}", session_line(&session)))?;
            controller.close();
        }
        SessionAction::Start { id } => {
            let controller = engine.open(id).await?;
            let result = controller.start().await;
            report(&controller, result, output, "started")?;
        }
        SessionAction::Pause { id, reason } => {
            let controller = engine.open(id).await?;
            let result = controller.pause(&reason).await;
            report(&controller, result, output, "paused")?;
        }
        SessionAction::Resume { id } => {
            let controller = engine.open(id).await?;
            let result = controller.resume().await;
            report(&controller, result, output, "resumed")?;
        }
        SessionAction::Complete { id } => {
            let controller = engine.open(id).await?;
            let result = controller.complete().await;
            report(&controller, result, output, "completed")?;
        }
        SessionAction::Interruptions { id } => {
            let controller = engine.open(id).await?;
            let interruptions = controller.interruptions();
            output.emit(&interruptions, || interruption_lines(&interruptions))?;
            controller.close();
        }
        SessionAction::History => {
            let history = engine.history().await?;
            output.emit(&history, || history_lines(&history))?;
        }
        SessionAction::Watch { id, interval_ms } => {
            let millis = interval_ms.unwrap_or(config.timer.tick_interval_ms);
            let period = Duration::from_millis(millis.max(1));
            watch(&engine, id, period, &config.notifications, output).await?;
        }
    }
    Ok(())
}

/// Print the outcome of one lifecycle command and release the controller.
fn report(
    controller: &SessionController,
    result: deepwork_core::Result<Session>,
    output: Output,
    verb: &str,
) -> CommandResult {
    controller.close();
    let session = result?;

    if output.json {
        return print_session(controller, output);
    }
    println!("Session {verb}: {}", session_line(&session));
    if session.status.is_terminal() && verb != "completed" {
        println!("  backend ended the session as {}", session.status.label());
    }
    Ok(())
}

fn print_session(controller: &SessionController, output: Output) -> CommandResult {
    let session = controller.session();
    let view = SessionView {
        session: &session,
        snapshot: controller.snapshot(),
    };
    output.emit(&view, || {
        let mut lines = vec![format!(
            "#{} {} [{}]",
            session.id,
            session.title,
            session.status.label()
        )];
        if let Some(goal) = &session.goal {
            lines.push(format!("  goal:          {goal}"));
        }
        lines.push(format!(
            "  scheduled:     {}",
            format_minutes(u64::from(session.scheduled_duration_minutes))
        ));
        if session.status != SessionStatus::Scheduled {
            lines.push(format!("  progress:      {}", snapshot_line(&view.snapshot)));
        }
        lines.push(format!("  interruptions: {}", session.interruptions.len()));
        lines.join("\n")
    })
}

/// Follow a session until it ends or Ctrl-C. A paused session stays
/// watched so the mark-overdue policy can still end it.
async fn watch(
    engine: &SessionEngine,
    id: i64,
    period: Duration,
    notifications: &NotificationsConfig,
    output: Output,
) -> CommandResult {
    let controller = engine.open(id).await?;
    if !controller.status().is_in_progress() {
        print_session(&controller, output)?;
        controller.close();
        return Ok(());
    }
    if controller.status() == SessionStatus::Paused && !output.json {
        print!("\r{}", snapshot_line(&controller.snapshot()));
        std::io::stdout().flush()?;
    }

    let mut events = controller.subscribe();
    let mut ticker = controller.spawn_ticker(period);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(event) => {
                    let ended = matches!(event, Event::SessionEnded { .. });
                    render_event(&event, notifications, output)?;
                    if ended {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        if controller.status().is_terminal() && !controller.is_command_in_flight() {
            break;
        }
    }

    ticker.stop();
    controller.close();
    if !output.json {
        println!();
    }
    Ok(())
}

fn render_event(
    event: &Event,
    notifications: &NotificationsConfig,
    output: Output,
) -> CommandResult {
    if output.json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        Event::Tick(snapshot) => {
            print!("\r{}", snapshot_line(snapshot));
            std::io::stdout().flush()?;
        }
        Event::DurationReached { .. } => {
            if let Some(text) = duration_reached_text(notifications) {
                println!();
                println!("{text}");
            }
        }
        Event::SessionEnded { status, .. } => {
            println!();
            println!("Session ended: {}", status.label());
        }
        Event::CommandFailed { command, message, .. } => {
            println!();
            println!("Automatic {command} failed: {message}");
        }
        _ => {}
    }
    Ok(())
}

/// `None` when notifications are off.
fn duration_reached_text(notifications: &NotificationsConfig) -> Option<String> {
    if !notifications.enabled {
        return None;
    }
    let bell = if notifications.sound_enabled { "\x07" } else { "" };
    Some(format!("{bell}Scheduled duration reached."))
}

fn session_line(session: &Session) -> String {
    format!(
        "{:>4}  {:<11}  {:>6}  {}",
        session.id,
        session.status.label(),
        format_minutes(u64::from(session.scheduled_duration_minutes)),
        session.title
    )
}

fn snapshot_line(snapshot: &SessionSnapshot) -> String {
    let mut line = format!(
        "{} / {}  {:>3.0}%  {}",
        format_clock(snapshot.elapsed_secs),
        format_clock(snapshot.scheduled_secs),
        snapshot.progress_pct,
        snapshot.label
    );
    if snapshot.over_schedule_secs > 0 {
        line.push_str(&format!(
            "  (+{} over schedule)",
            format_clock(snapshot.over_schedule_secs)
        ));
    }
    line
}

fn interruption_lines(interruptions: &[Interruption]) -> String {
    if interruptions.is_empty() {
        return "no interruptions".to_string();
    }
    interruptions
        .iter()
        .map(|i| {
            format!(
                "{:>4}  {}  {}",
                i.id,
                i.pause_time.format("%Y-%m-%d %H:%M:%S"),
                i.reason
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn history_lines(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "no sessions".to_string();
    }
    history
        .iter()
        .map(|entry| {
            format!(
                "{:>4}  {:<11}  pauses {:>2}  {:>4.0}%  {}",
                entry.id,
                entry.status.label(),
                entry.pause_count,
                entry.completion_ratio * 100.0,
                entry.title
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
