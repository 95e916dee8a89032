use crate::{TaskSeed, TransportId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Consumer attached: open the channel.
    Mounted,
    /// Consumer detached: unsubscribe, close the channel, stop all timers.
    Unmounted,
    /// User asked for a manual (re)connect.
    ConnectRequested,
    /// User asked to drop the channel.
    DisconnectRequested,
    /// The consumer now tracks a different task.
    TaskChanged { task_id: String, seed: TaskSeed },
    /// User clicked pause/resume.
    PauseToggled,
    TransportOpened { transport: TransportId },
    TransportClosed { transport: TransportId },
    TransportError { transport: TransportId, error: String },
    FrameReceived { transport: TransportId, text: String },
    ReconnectDue,
    HeartbeatDue,
    /// Offline ramp tick; `sample` is a uniform draw in `[0, 1)`.
    SimulationTick { sample: f64 },
}
