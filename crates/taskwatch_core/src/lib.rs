//! Taskwatch core: pure channel/tracker state machines and view-model helpers.
mod adapter;
mod connection;
mod effect;
mod msg;
mod protocol;
mod session;
mod state;
mod tracker;
mod update;
mod view_model;

pub use adapter::{
    PresentationAdapter, ProgressSource, SIMULATION_CAP, SIMULATION_CEILING, SIMULATION_MAX_STEP,
};
pub use connection::{ChannelSettings, ConnectionManager, ConnectionState, NOT_CONNECTED};
pub use effect::{Effect, TaskCompletion, TimerKind, TransportId};
pub use msg::Msg;
pub use protocol::{
    decode_inbound, encode_outbound, progress_address, AddressError, InboundMessage,
    OutboundMessage,
};
pub use session::{Session, SessionState, UserProfile};
pub use state::{AppState, TaskMount};
pub use tracker::{
    TaskProgress, TaskProgressTracker, TaskSeed, TaskStatus, UnknownStatus, COMPLETED_MESSAGE,
    GENERIC_FAILURE,
};
pub use update::update;
pub use view_model::TaskProgressView;
