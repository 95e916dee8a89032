//! One-line text rendering of task views.

use chrono::{DateTime, TimeZone};
use taskwatch_core::{ConnectionState, ProgressSource, TaskCompletion, TaskProgressView};

const BAR_WIDTH: usize = 20;

pub(crate) fn render_view<Tz>(view: &TaskProgressView, now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut line = format!(
        "[{}] {} {} {:>3}% {} ({})",
        now.format("%H:%M:%S"),
        view.task_id,
        progress_bar(view.progress),
        view.percent(),
        view.status,
        source_label(view.source),
    );
    if view.estimated_minutes > 0 {
        line.push_str(&format!(" ~{} min left", view.estimated_minutes));
    }
    line.push_str(" | ");
    line.push_str(&connection_label(view));
    if let Some(error) = &view.error {
        line.push_str(&format!(" | error: {error}"));
    } else if let Some(message) = &view.message {
        line.push_str(&format!(" | {message}"));
    }
    line
}

pub(crate) fn render_completion(completion: &TaskCompletion) -> String {
    format!("Task {} completed ({:.0}%)", completion.task_id, completion.progress)
}

pub(crate) fn render_failure(task_id: &str, error: &str) -> String {
    format!("Task {task_id} failed: {error}")
}

fn progress_bar(progress: f64) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).floor() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn source_label(source: ProgressSource) -> &'static str {
    match source {
        ProgressSource::Seeded => "last known",
        ProgressSource::Live => "live",
        ProgressSource::Simulated => "estimated",
    }
}

fn connection_label(view: &TaskProgressView) -> String {
    let label = match view.connection {
        ConnectionState::Open => return "online".to_string(),
        ConnectionState::Connecting => "connecting".to_string(),
        ConnectionState::ClosedPendingRetry => {
            format!("reconnecting (attempt {})", view.reconnect_attempts)
        }
        ConnectionState::Disconnected => "offline".to_string(),
    };
    match &view.connection_error {
        Some(error) => format!("{label}: {error}"),
        None => label,
    }
}
