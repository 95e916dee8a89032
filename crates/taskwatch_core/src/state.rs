use crate::protocol::{progress_address, AddressError};
use crate::view_model::TaskProgressView;
use crate::{
    ChannelSettings, ConnectionManager, PresentationAdapter, TaskProgressTracker, TaskSeed,
};

/// What a consumer supplies when it mounts a progress view.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMount {
    /// Channel base such as `ws://localhost:8000`.
    pub channel_url: String,
    pub task_id: String,
    pub user_id: String,
    pub seed: TaskSeed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub(crate) connection: ConnectionManager,
    pub(crate) tracker: TaskProgressTracker,
    pub(crate) adapter: PresentationAdapter,
    pub(crate) mounted: bool,
    dirty: bool,
}

impl AppState {
    pub fn new(mount: TaskMount, settings: ChannelSettings) -> Result<Self, AddressError> {
        let url = progress_address(&mount.channel_url, &mount.task_id, &mount.user_id)?;
        let simulation_interval = settings.simulation_interval;
        Ok(Self {
            connection: ConnectionManager::new(url, settings),
            tracker: TaskProgressTracker::new(mount.task_id.clone(), &mount.seed),
            adapter: PresentationAdapter::new(mount.task_id, &mount.seed, simulation_interval),
            mounted: false,
            dirty: false,
        })
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn tracker(&self) -> &TaskProgressTracker {
        &self.tracker
    }

    pub fn adapter(&self) -> &PresentationAdapter {
        &self.adapter
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn view(&self) -> TaskProgressView {
        let live = self.tracker.state();
        TaskProgressView {
            task_id: self.adapter.task_id().to_string(),
            progress: self.adapter.progress(),
            source: self.adapter.source(),
            status: self.adapter.status(),
            message: live.message.clone(),
            error: live.error.clone(),
            connected: self.connection.is_connected(),
            connection: self.connection.state(),
            connection_error: self.connection.error().map(ToOwned::to_owned),
            reconnect_attempts: self.connection.reconnect_attempts(),
            paused: self.adapter.is_paused(),
            can_toggle_pause: self.adapter.can_toggle_pause(),
            estimated_minutes: self.adapter.estimated_minutes(),
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether the view changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
