use std::time::Duration;

use taskwatch_logging::{tw_debug, tw_error, tw_info, tw_warn};
use url::Url;

use crate::protocol::{decode_inbound, encode_outbound};
use crate::{Effect, InboundMessage, OutboundMessage, TimerKind, TransportId};

pub const NOT_CONNECTED: &str = "not connected";

/// Timing knobs for the channel and the offline ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSettings {
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
    pub heartbeat_interval: Duration,
    pub simulation_interval: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_millis(3_000),
            max_reconnect_attempts: 5,
            heartbeat_interval: Duration::from_millis(30_000),
            simulation_interval: Duration::from_millis(2_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    ClosedPendingRetry,
}

/// Sans-IO reconnecting channel. Every operation returns the effects the
/// runtime has to perform; transport events are fed back in by id.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionManager {
    url: Url,
    settings: ChannelSettings,
    state: ConnectionState,
    transport: Option<TransportId>,
    next_transport: TransportId,
    attempts: u32,
    auto_reconnect: bool,
    heartbeat_armed: bool,
    error: Option<String>,
    last_message: Option<InboundMessage>,
}

impl ConnectionManager {
    pub fn new(url: Url, settings: ChannelSettings) -> Self {
        Self {
            url,
            settings,
            state: ConnectionState::Disconnected,
            transport: None,
            next_transport: 1,
            attempts: 0,
            auto_reconnect: true,
            heartbeat_armed: false,
            error: None,
            last_message: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_message(&self) -> Option<&InboundMessage> {
        self.last_message.as_ref()
    }

    /// Opens a transport unless one is already open or being opened.
    /// A manual call re-enables auto-reconnect after `disconnect`.
    pub fn connect(&mut self) -> Vec<Effect> {
        match self.state {
            ConnectionState::Open | ConnectionState::Connecting => Vec::new(),
            ConnectionState::ClosedPendingRetry => {
                self.auto_reconnect = true;
                let mut effects = vec![Effect::CancelTimer {
                    timer: TimerKind::Reconnect,
                }];
                effects.push(self.open_transport());
                effects
            }
            ConnectionState::Disconnected => {
                self.auto_reconnect = true;
                vec![self.open_transport()]
            }
        }
    }

    fn open_transport(&mut self) -> Effect {
        let transport = self.next_transport;
        self.next_transport += 1;
        self.transport = Some(transport);
        self.state = ConnectionState::Connecting;
        tw_info!("Opening transport {} to {}", transport, self.url);
        Effect::OpenTransport {
            transport,
            url: self.url.to_string(),
        }
    }

    /// Tears the channel down and suppresses reconnects. Idempotent.
    pub fn disconnect(&mut self) -> Vec<Effect> {
        self.auto_reconnect = false;
        let mut effects = Vec::new();
        if self.state == ConnectionState::ClosedPendingRetry {
            effects.push(Effect::CancelTimer {
                timer: TimerKind::Reconnect,
            });
        }
        if let Some(transport) = self.transport.take() {
            tw_info!("Closing transport {}", transport);
            effects.push(Effect::CloseTransport { transport });
        }
        effects.extend(self.disarm_heartbeat());
        self.state = ConnectionState::Disconnected;
        effects
    }

    pub fn handle_opened(&mut self, transport: TransportId) -> Vec<Effect> {
        if !self.is_current(transport) {
            tw_debug!("Ignoring open of stale transport {}", transport);
            return vec![Effect::CloseTransport { transport }];
        }
        tw_info!("Transport {} open", transport);
        self.state = ConnectionState::Open;
        self.attempts = 0;
        self.error = None;
        self.heartbeat_armed = true;
        vec![Effect::ArmTimer {
            timer: TimerKind::Heartbeat,
            delay: self.settings.heartbeat_interval,
            periodic: true,
        }]
    }

    /// Transport went away. Returns `None` if the event was stale.
    pub fn handle_closed(&mut self, transport: TransportId) -> Option<Vec<Effect>> {
        if !self.is_current(transport) {
            return None;
        }
        self.transport = None;
        let mut effects = self.disarm_heartbeat();

        if !self.auto_reconnect {
            self.state = ConnectionState::Disconnected;
        } else if self.attempts < self.settings.max_reconnect_attempts {
            self.attempts += 1;
            self.state = ConnectionState::ClosedPendingRetry;
            tw_warn!(
                "Transport {} closed; reconnect {}/{} in {:?}",
                transport,
                self.attempts,
                self.settings.max_reconnect_attempts,
                self.settings.reconnect_interval
            );
            effects.push(Effect::ArmTimer {
                timer: TimerKind::Reconnect,
                delay: self.settings.reconnect_interval,
                periodic: false,
            });
        } else {
            tw_error!(
                "Transport {} closed; giving up after {} reconnect attempts",
                transport,
                self.attempts
            );
            self.state = ConnectionState::Disconnected;
        }
        Some(effects)
    }

    pub fn handle_error(&mut self, transport: TransportId, error: &str) {
        if !self.is_current(transport) {
            return;
        }
        tw_warn!("Transport {} error: {}", transport, error);
        self.error = Some(format!("connection error: {error}"));
    }

    /// Parses one text frame. Malformed payloads are logged and dropped.
    pub fn handle_frame(&mut self, transport: TransportId, text: &str) -> Option<InboundMessage> {
        if !self.is_current(transport) {
            return None;
        }
        match decode_inbound(text) {
            Ok(message) => {
                self.last_message = Some(message.clone());
                Some(message)
            }
            Err(err) => {
                tw_error!("Failed to parse channel message: {} ({} bytes)", err, text.len());
                None
            }
        }
    }

    pub fn handle_reconnect_due(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::ClosedPendingRetry || !self.auto_reconnect {
            return Vec::new();
        }
        vec![self.open_transport()]
    }

    pub fn handle_heartbeat_due(&mut self) -> Vec<Effect> {
        if self.is_connected() {
            self.send_ping()
        } else {
            Vec::new()
        }
    }

    /// Sends immediately if open; otherwise records "not connected".
    pub fn send_message(&mut self, message: &OutboundMessage) -> Vec<Effect> {
        let transport = match (self.state, self.transport) {
            (ConnectionState::Open, Some(transport)) => transport,
            _ => {
                tw_debug!("Dropping {:?}: {}", message, NOT_CONNECTED);
                self.error = Some(NOT_CONNECTED.to_string());
                return Vec::new();
            }
        };
        match encode_outbound(message) {
            Ok(text) => vec![Effect::SendFrame { transport, text }],
            Err(err) => {
                tw_error!("Failed to encode {:?}: {}", message, err);
                self.error = Some(err.to_string());
                Vec::new()
            }
        }
    }

    pub fn send_ping(&mut self) -> Vec<Effect> {
        self.send_message(&OutboundMessage::Ping)
    }

    pub fn subscribe_to_task(&mut self, task_id: &str) -> Vec<Effect> {
        self.send_message(&OutboundMessage::SubscribeTask {
            task_id: task_id.to_string(),
        })
    }

    pub fn unsubscribe_from_task(&mut self, task_id: &str) -> Vec<Effect> {
        self.send_message(&OutboundMessage::UnsubscribeTask {
            task_id: task_id.to_string(),
        })
    }

    fn is_current(&self, transport: TransportId) -> bool {
        self.transport == Some(transport)
    }

    fn disarm_heartbeat(&mut self) -> Vec<Effect> {
        if std::mem::take(&mut self.heartbeat_armed) {
            vec![Effect::CancelTimer {
                timer: TimerKind::Heartbeat,
            }]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(max: u32) -> ConnectionManager {
        let url = Url::parse("ws://localhost:8000/ws/progress/T1?user_id=u").unwrap();
        ConnectionManager::new(
            url,
            ChannelSettings {
                max_reconnect_attempts: max,
                ..ChannelSettings::default()
            },
        )
    }

    #[test]
    fn connect_is_idempotent_while_connecting_or_open() {
        let mut conn = manager(5);
        assert_eq!(conn.connect().len(), 1);
        assert!(conn.connect().is_empty());
        conn.handle_opened(1);
        assert!(conn.connect().is_empty());
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[test]
    fn stale_transport_events_are_ignored() {
        let mut conn = manager(5);
        conn.connect();
        conn.handle_opened(1);
        conn.handle_closed(1);
        conn.handle_reconnect_due();
        // Transport 1 is gone; a late frame or close from it changes nothing.
        assert_eq!(conn.handle_frame(1, r#"{"type":"pong"}"#), None);
        assert_eq!(conn.handle_closed(1), None);
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn malformed_frame_is_dropped_without_error() {
        let mut conn = manager(5);
        conn.connect();
        conn.handle_opened(1);
        assert_eq!(conn.handle_frame(1, "{oops"), None);
        assert_eq!(conn.error(), None);
        assert!(conn.is_connected());
    }

    #[test]
    fn disconnect_twice_emits_nothing_the_second_time() {
        let mut conn = manager(5);
        conn.connect();
        conn.handle_opened(1);
        assert_eq!(
            conn.disconnect(),
            vec![
                Effect::CloseTransport { transport: 1 },
                Effect::CancelTimer {
                    timer: TimerKind::Heartbeat
                },
            ]
        );
        assert!(conn.disconnect().is_empty());
    }

    #[test]
    fn manual_connect_after_budget_exhausted_rearms() {
        let mut conn = manager(0);
        conn.connect();
        assert_eq!(conn.handle_closed(1), Some(Vec::new()));
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let effects = conn.connect();
        assert!(matches!(
            effects.as_slice(),
            [Effect::OpenTransport { transport: 2, .. }]
        ));
    }
}
