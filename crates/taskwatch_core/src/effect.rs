use std::time::Duration;

/// Identifies one underlying transport; a new id is minted per connect.
pub type TransportId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Reconnect,
    Heartbeat,
    Simulation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskCompletion {
    pub task_id: String,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    OpenTransport {
        transport: TransportId,
        url: String,
    },
    CloseTransport {
        transport: TransportId,
    },
    SendFrame {
        transport: TransportId,
        text: String,
    },
    /// Arms (or re-arms) a timer. Periodic timers fire every `delay`.
    ArmTimer {
        timer: TimerKind,
        delay: Duration,
        periodic: bool,
    },
    CancelTimer {
        timer: TimerKind,
    },
    NotifyCompleted(TaskCompletion),
    NotifyError {
        task_id: String,
        error: String,
    },
}
