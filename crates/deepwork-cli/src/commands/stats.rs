use deepwork_core::timer::format_minutes;
use deepwork_core::{SessionStats, SessionStatus};

use super::{engine, load_config, CommandResult, Output};

pub async fn run(api_url: Option<&str>, output: Output) -> CommandResult {
    let config = load_config(api_url)?;
    let stats = engine(&config)?.stats().await?;
    output.emit(&stats, || render(&stats))
}

fn render(stats: &SessionStats) -> String {
    let mut lines = vec![
        format!(
            "Sessions:        {} ({} completed, {}%)",
            stats.total_sessions, stats.completed_sessions, stats.completion_rate_pct
        ),
        format!("Focus time:      {}", format_minutes(stats.total_focus_min)),
        format!("Average session: {}", format_minutes(stats.average_focus_min)),
        format!("Interruptions:   {}", stats.total_interruptions),
    ];

    let by_status: Vec<String> = SessionStatus::ALL
        .iter()
        .filter(|status| stats.count(**status) > 0)
        .map(|status| format!("{} {}", stats.count(*status), status.label().to_lowercase()))
        .collect();
    if !by_status.is_empty() {
        lines.push(format!("By status:       {}", by_status.join(", ")));
    }

    if !stats.top_reasons.is_empty() {
        lines.push("Top reasons:".to_string());
        for reason in &stats.top_reasons {
            lines.push(format!("  {:>3}  {}", reason.count, reason.reason));
        }
    }

    if !stats.categories.is_empty() {
        lines.push("Categories:".to_string());
        for category in &stats.categories {
            lines.push(format!(
                "  {:<16} {:>3} sessions  {:>8}  {:>3}% completed",
                category.category,
                category.sessions,
                format_minutes(category.minutes),
                category.completion_rate_pct
            ));
        }
    }

    lines.join("\n")
}
