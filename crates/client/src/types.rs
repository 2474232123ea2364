//! Public types for the client connection.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ClientError;

/// Connection state of a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Created, first attempt not started yet.
    Idle,
    /// Resolving the Host and opening the socket.
    Connecting,
    /// Socket open, handshake sent.
    Open,
    /// Explicit close in progress; the socket is being released.
    Closing,
    /// Connection lost or never established; a retry timer is armed.
    Reconnecting { attempt: u32, delay: Duration },
    /// Closed by the caller. Terminal.
    Closed,
}

/// Lifecycle event names handlers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Close,
    Error,
    Message,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Open,
        EventKind::Close,
        EventKind::Error,
        EventKind::Message,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Close => "close",
            EventKind::Error => "error",
            EventKind::Message => "message",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an event name that isn't one of the four lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event name: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(EventKind::Open),
            "close" => Ok(EventKind::Close),
            "error" => Ok(EventKind::Error),
            "message" => Ok(EventKind::Message),
            other => Err(UnknownEvent(other.to_string())),
        }
    }
}

/// Payload of an inbound frame.
///
/// Text that parses as JSON is delivered structured; anything else is
/// forwarded unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Json(serde_json::Value),
    Text(String),
    Binary(Vec<u8>),
}

impl InboundMessage {
    /// Decodes a text frame, falling back to the raw text on parse failure.
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => InboundMessage::Json(value),
            Err(_) => InboundMessage::Text(text),
        }
    }

    /// Returns the structured payload, if the frame was JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            InboundMessage::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Events delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Open,
    Close,
    Error(ClientError),
    Message(InboundMessage),
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Open => EventKind::Open,
            ClientEvent::Close => EventKind::Close,
            ClientEvent::Error(_) => EventKind::Error,
            ClientEvent::Message(_) => EventKind::Message,
        }
    }
}

/// Reconnection policy: capped exponential backoff without jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl ReconnectConfig {
    /// Delay for a 0-based attempt: `min(max_delay, base_delay * 2^attempt)`.
    ///
    /// Saturates at `max_delay` when the product overflows.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// WebSocket keepalive policy.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepaliveConfig {
    /// Interval between client pings.
    pub ping_period: Duration,
    /// Silence after which the connection is considered dead.
    pub pong_wait: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_period: Duration::from_secs(30),
            pong_wait: Duration::from_secs(60),
        }
    }
}
