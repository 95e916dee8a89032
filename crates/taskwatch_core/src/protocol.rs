//! Wire records exchanged over the progress channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Records the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Ping,
    SubscribeTask { task_id: String },
    UnsubscribeTask { task_id: String },
}

/// Records the server pushes to the client.
///
/// Unknown type tags (`pong`, `connection_established`, `echo`, ...) decode
/// to [`InboundMessage::Other`] so they can be ignored without a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    TaskProgressUpdate {
        task_id: String,
        progress: f64,
        status: String,
        #[serde(default)]
        message: Option<String>,
    },
    TaskCompleted {
        task_id: String,
    },
    TaskFailed {
        task_id: String,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl InboundMessage {
    /// Task id the record refers to, if it is a task record.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            InboundMessage::TaskProgressUpdate { task_id, .. }
            | InboundMessage::TaskCompleted { task_id }
            | InboundMessage::TaskFailed { task_id, .. } => Some(task_id),
            InboundMessage::Other => None,
        }
    }
}

pub fn decode_inbound(text: &str) -> Result<InboundMessage, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn encode_outbound(message: &OutboundMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid channel url: {0}")]
    Invalid(String),
    #[error("channel url cannot carry a path: {0}")]
    CannotBeABase(String),
    #[error("unsupported channel scheme {0}")]
    UnsupportedScheme(String),
}

/// Builds `<scheme>://<host>/ws/progress/<task_id>?user_id=<user_id>` from a
/// base such as `ws://localhost:8000`.
pub fn progress_address(base: &str, task_id: &str, user_id: &str) -> Result<Url, AddressError> {
    let mut url = Url::parse(base).map_err(|err| AddressError::Invalid(err.to_string()))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(AddressError::UnsupportedScheme(other.to_string())),
    }
    url.path_segments_mut()
        .map_err(|_| AddressError::CannotBeABase(base.to_string()))?
        .pop_if_empty()
        .extend(["ws", "progress", task_id]);
    url.set_query(None);
    url.query_pairs_mut().append_pair("user_id", user_id);
    Ok(url)
}
