use std::fmt;
use std::str::FromStr;

use taskwatch_logging::{tw_debug, tw_info, tw_warn};
use thiserror::Error;

use crate::{ConnectionManager, Effect, InboundMessage};

pub const COMPLETED_MESSAGE: &str = "task complete";
pub const GENERIC_FAILURE: &str = "task failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Paused,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "paused" => Ok(TaskStatus::Paused),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(UnknownStatus(raw.to_string())),
        }
    }
}

/// Caller-supplied last known values used to initialise a task view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskSeed {
    pub progress: Option<f64>,
    pub status: Option<TaskStatus>,
}

/// Normalized per-task state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskProgress {
    pub progress: f64,
    pub status: TaskStatus,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl TaskProgress {
    pub fn seeded(seed: &TaskSeed) -> Self {
        Self {
            progress: clamp_progress(seed.progress.unwrap_or(0.0)),
            status: seed.status.unwrap_or_default(),
            message: None,
            error: None,
        }
    }
}

pub(crate) fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Projects channel records onto one task's [`TaskProgress`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgressTracker {
    task_id: String,
    subscribed: Option<String>,
    state: TaskProgress,
}

impl TaskProgressTracker {
    pub fn new(task_id: impl Into<String>, seed: &TaskSeed) -> Self {
        Self {
            task_id: task_id.into(),
            subscribed: None,
            state: TaskProgress::seeded(seed),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> &TaskProgress {
        &self.state
    }

    /// The task id the server currently has a live subscription for.
    pub fn subscription(&self) -> Option<&str> {
        self.subscribed.as_deref()
    }

    /// Applies one inbound record. Returns `true` if the state changed.
    pub fn apply(&mut self, message: &InboundMessage) -> bool {
        let Some(task_id) = message.task_id() else {
            return false;
        };
        if task_id != self.task_id {
            tw_debug!(
                "Ignoring record for task {} (tracking {})",
                task_id,
                self.task_id
            );
            return false;
        }
        if self.state.status.is_terminal() {
            tw_debug!(
                "Ignoring record for task {} after terminal status {}",
                task_id,
                self.state.status
            );
            return false;
        }

        let next = match message {
            InboundMessage::TaskProgressUpdate {
                progress,
                status,
                message,
                ..
            } => {
                let status = status.parse().unwrap_or_else(|err: UnknownStatus| {
                    tw_warn!("{}; treating task {} as processing", err, self.task_id);
                    TaskStatus::Processing
                });
                TaskProgress {
                    progress: clamp_progress(*progress),
                    status,
                    message: message.clone(),
                    error: None,
                }
            }
            InboundMessage::TaskCompleted { .. } => {
                tw_info!("Task {} completed", self.task_id);
                TaskProgress {
                    progress: 100.0,
                    status: TaskStatus::Completed,
                    message: Some(COMPLETED_MESSAGE.to_string()),
                    error: None,
                }
            }
            InboundMessage::TaskFailed { error, .. } => {
                let error = error
                    .clone()
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string());
                tw_warn!("Task {} failed: {}", self.task_id, error);
                TaskProgress {
                    progress: 0.0,
                    status: TaskStatus::Failed,
                    message: self.state.message.clone(),
                    error: Some(error),
                }
            }
            InboundMessage::Other => return false,
        };

        let changed = next != self.state;
        self.state = next;
        changed
    }

    /// Called whenever the connection (re)opens; the server forgets
    /// subscriptions with the transport, so this always re-subscribes.
    pub fn on_connected(&mut self, connection: &mut ConnectionManager) -> Vec<Effect> {
        if self.task_id.is_empty() {
            return Vec::new();
        }
        let effects = connection.subscribe_to_task(&self.task_id);
        if !effects.is_empty() {
            self.subscribed = Some(self.task_id.clone());
        }
        effects
    }

    pub fn on_disconnected(&mut self) {
        self.subscribed = None;
    }

    /// Drops the active subscription, if any.
    pub fn unsubscribe(&mut self, connection: &mut ConnectionManager) -> Vec<Effect> {
        match self.subscribed.take() {
            Some(previous) if connection.is_connected() => {
                connection.unsubscribe_from_task(&previous)
            }
            _ => Vec::new(),
        }
    }

    /// Switches to a different task: unsubscribes the old id, resets state
    /// from `seed` and subscribes the new id if the channel is open.
    pub fn change_task(
        &mut self,
        task_id: impl Into<String>,
        seed: &TaskSeed,
        connection: &mut ConnectionManager,
    ) -> Vec<Effect> {
        let task_id = task_id.into();
        if task_id == self.task_id {
            return Vec::new();
        }
        tw_info!("Tracker switching from task {} to {}", self.task_id, task_id);
        let mut effects = self.unsubscribe(connection);
        self.task_id = task_id;
        self.state = TaskProgress::seeded(seed);
        if connection.is_connected() {
            effects.extend(self.on_connected(connection));
        }
        effects
    }
}
