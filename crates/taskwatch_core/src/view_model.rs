use crate::{ConnectionState, ProgressSource, TaskStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgressView {
    pub task_id: String,
    pub progress: f64,
    pub source: ProgressSource,
    pub status: TaskStatus,
    pub message: Option<String>,
    pub error: Option<String>,
    pub connected: bool,
    pub connection: ConnectionState,
    pub connection_error: Option<String>,
    pub reconnect_attempts: u32,
    pub paused: bool,
    pub can_toggle_pause: bool,
    pub estimated_minutes: u32,
}

impl TaskProgressView {
    /// Progress rounded for display.
    pub fn percent(&self) -> u32 {
        self.progress.round().clamp(0.0, 100.0) as u32
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
