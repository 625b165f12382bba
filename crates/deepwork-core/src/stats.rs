//! Aggregate statistics over a list of sessions.
//!
//! Focus time is wall-clock `end - start` of sessions that ran to the end
//! (`completed` or `overdue`); resume times are not stored server-side, so
//! pauses cannot be subtracted here.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::session::{Session, SessionStatus};

/// How many interruption reasons [`SessionStats::top_reasons`] keeps.
pub const TOP_REASONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: u64,
}

/// Totals for sessions sharing the first word of their title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub sessions: u64,
    pub completed: u64,
    /// Actual minutes where known, otherwise the scheduled duration.
    pub minutes: u64,
    pub completion_rate_pct: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    /// Rounded percentage of sessions in `completed` status.
    pub completion_rate_pct: u32,
    pub total_focus_min: u64,
    pub average_focus_min: u64,
    pub by_status: BTreeMap<SessionStatus, u64>,
    pub total_interruptions: u64,
    pub top_reasons: Vec<ReasonCount>,
    /// Focus minutes keyed by the UTC date the session started.
    pub daily_focus_min: BTreeMap<NaiveDate, u64>,
    pub categories: Vec<CategoryTotal>,
}

impl SessionStats {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut stats = SessionStats {
            total_sessions: sessions.len() as u64,
            ..SessionStats::default()
        };

        let mut focus_total = 0.0_f64;
        let mut focus_sessions = 0_u64;
        let mut reasons: BTreeMap<String, u64> = BTreeMap::new();
        let mut categories: BTreeMap<String, CategoryTotal> = BTreeMap::new();

        for session in sessions {
            *stats.by_status.entry(session.status).or_default() += 1;
            if session.status == SessionStatus::Completed {
                stats.completed_sessions += 1;
            }

            stats.total_interruptions += session.interruptions.len() as u64;
            for interruption in &session.interruptions {
                let reason = interruption.reason.trim();
                if !reason.is_empty() {
                    *reasons.entry(reason.to_string()).or_default() += 1;
                }
            }

            let focus = focus_minutes(session);
            if let Some(minutes) = focus {
                focus_total += minutes;
                focus_sessions += 1;
                if let Some(start) = session.start_time {
                    *stats.daily_focus_min.entry(start.date_naive()).or_default() +=
                        minutes.round() as u64;
                }
            }

            let category = category_of(&session.title);
            let entry = categories
                .entry(category.clone())
                .or_insert_with(|| CategoryTotal {
                    category,
                    sessions: 0,
                    completed: 0,
                    minutes: 0,
                    completion_rate_pct: 0,
                });
            entry.sessions += 1;
            if session.status == SessionStatus::Completed {
                entry.completed += 1;
            }
            entry.minutes += focus
                .map(|m| m.round() as u64)
                .unwrap_or(u64::from(session.scheduled_duration_minutes));
        }

        stats.completion_rate_pct = percent(stats.completed_sessions, stats.total_sessions);
        stats.total_focus_min = focus_total.round() as u64;
        if focus_sessions > 0 {
            stats.average_focus_min = (focus_total / focus_sessions as f64).round() as u64;
        }

        let mut top: Vec<ReasonCount> = reasons
            .into_iter()
            .map(|(reason, count)| ReasonCount { reason, count })
            .collect();
        // BTreeMap order breaks ties alphabetically.
        top.sort_by(|a, b| b.count.cmp(&a.count));
        top.truncate(TOP_REASONS);
        stats.top_reasons = top;

        let mut categories: Vec<CategoryTotal> = categories
            .into_values()
            .map(|mut c| {
                c.completion_rate_pct = percent(c.completed, c.sessions);
                c
            })
            .collect();
        categories.sort_by(|a, b| b.minutes.cmp(&a.minutes));
        stats.categories = categories;

        stats
    }

    pub fn count(&self, status: SessionStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

fn focus_minutes(session: &Session) -> Option<f64> {
    if !matches!(session.status, SessionStatus::Completed | SessionStatus::Overdue) {
        return None;
    }
    session.actual_minutes().map(|m| m.max(0.0))
}

fn category_of(title: &str) -> String {
    title
        .split_whitespace()
        .next()
        .unwrap_or("Uncategorized")
        .to_string()
}

fn percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}
