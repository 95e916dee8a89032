use taskwatch_core::{TaskCompletion, TaskProgressView};

/// What the engine reports back to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The task view changed.
    View(TaskProgressView),
    Completed(TaskCompletion),
    Failed { task_id: String, error: String },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: tokio::sync::mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}
