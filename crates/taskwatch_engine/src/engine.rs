use std::collections::HashMap;
use std::time::Duration;

use taskwatch_core::{
    update, AddressError, AppState, ChannelSettings, Effect, Msg, TaskMount, TaskProgressView,
    TransportId,
};
use taskwatch_logging::{tw_debug, tw_info, tw_trace, tw_warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::timers::Timers;
use crate::transport::{spawn_transport, TransportCommand};
use crate::types::{ChannelProgressSink, EngineEvent, ProgressSink};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub channel: ChannelSettings,
    pub connect_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            channel: ChannelSettings::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Handle to a running task driver.
///
/// The driver keeps running (reconnecting, ticking) until [`shutdown`] is
/// called; dropping the handle alone does not stop it.
///
/// [`shutdown`]: EngineHandle::shutdown
pub struct EngineHandle {
    msg_tx: mpsc::UnboundedSender<Msg>,
    join: JoinHandle<Option<TaskProgressView>>,
}

impl EngineHandle {
    /// Mounts `mount` and runs its driver on the current tokio runtime.
    pub fn spawn(
        mount: TaskMount,
        settings: EngineSettings,
        sink: Box<dyn ProgressSink>,
    ) -> Result<Self, AddressError> {
        let state = AppState::new(mount, settings.channel)?;
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let driver = TaskDriver {
            state: Some(state),
            msg_tx: msg_tx.clone(),
            msg_rx,
            transports: HashMap::new(),
            timers: Timers::default(),
            sink,
            connect_timeout: settings.connect_timeout,
        };
        let join = tokio::spawn(driver.run());
        Ok(Self { msg_tx, join })
    }

    /// Like [`EngineHandle::spawn`] with events delivered on a channel.
    pub fn spawn_with_channel(
        mount: TaskMount,
        settings: EngineSettings,
    ) -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>), AddressError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = Self::spawn(mount, settings, Box::new(ChannelProgressSink::new(event_tx)))?;
        Ok((handle, event_rx))
    }

    pub fn send(&self, msg: Msg) -> bool {
        self.msg_tx.send(msg).is_ok()
    }

    /// A sender usable from other threads (e.g. a stdin reader).
    pub fn sender(&self) -> mpsc::UnboundedSender<Msg> {
        self.msg_tx.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.msg_tx.send(Msg::Unmounted);
    }

    /// Waits for the driver to stop and returns the final view.
    pub async fn join(self) -> Option<TaskProgressView> {
        self.join.await.ok().flatten()
    }
}

struct TaskDriver {
    state: Option<AppState>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    transports: HashMap<TransportId, mpsc::UnboundedSender<TransportCommand>>,
    timers: Timers,
    sink: Box<dyn ProgressSink>,
    connect_timeout: Duration,
}

impl TaskDriver {
    async fn run(mut self) -> Option<TaskProgressView> {
        self.dispatch(Msg::Mounted);
        while let Some(msg) = self.msg_rx.recv().await {
            let unmounting = matches!(msg, Msg::Unmounted);
            self.dispatch(msg);
            if unmounting {
                break;
            }
        }
        self.timers.cancel_all();
        for (_, transport) in self.transports.drain() {
            let _ = transport.send(TransportCommand::Close);
        }
        tw_info!("Task driver stopped");
        self.state.as_ref().map(AppState::view)
    }

    fn dispatch(&mut self, msg: Msg) {
        tw_trace!("dispatch {:?}", msg);
        if let Msg::TransportClosed { transport } = &msg {
            self.transports.remove(transport);
        }
        let Some(state) = self.state.take() else {
            return;
        };
        let (mut state, effects) = update(state, msg);
        let changed = state.consume_dirty().then(|| state.view());
        self.state = Some(state);

        if let Some(view) = changed {
            self.sink.emit(EngineEvent::View(view));
        }
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::OpenTransport { transport, url } => {
                let commands =
                    spawn_transport(transport, url, self.connect_timeout, self.msg_tx.clone());
                self.transports.insert(transport, commands);
            }
            Effect::CloseTransport { transport } => {
                if let Some(commands) = self.transports.remove(&transport) {
                    let _ = commands.send(TransportCommand::Close);
                }
            }
            Effect::SendFrame { transport, text } => match self.transports.get(&transport) {
                Some(commands) => {
                    tw_debug!("-> transport {}: {}", transport, text);
                    let _ = commands.send(TransportCommand::Send(text));
                }
                None => tw_warn!("No live transport {} for outbound frame", transport),
            },
            Effect::ArmTimer {
                timer,
                delay,
                periodic,
            } => self.timers.arm(timer, delay, periodic, self.msg_tx.clone()),
            Effect::CancelTimer { timer } => self.timers.cancel(timer),
            Effect::NotifyCompleted(completion) => {
                self.sink.emit(EngineEvent::Completed(completion));
            }
            Effect::NotifyError { task_id, error } => {
                self.sink.emit(EngineEvent::Failed { task_id, error });
            }
        }
    }
}
