//! Taskwatch engine: websocket transports, timers, REST client and effect execution.
mod api;
mod engine;
mod timers;
mod transport;
mod types;

pub use api::{ApiClient, ApiError, ApiSettings, TokenResponse, VideoTask, VideoTaskRequest};
pub use engine::{EngineHandle, EngineSettings};
pub use types::{ChannelProgressSink, EngineEvent, ProgressSink};
