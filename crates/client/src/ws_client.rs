//! WebSocket connector.
//!
//! Opens the socket with `tokio-tungstenite`, splits it, and spawns the
//! read and write pumps that back a [`Link`]. Keepalive pings ride on the
//! write pump.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{ClientConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_OUTBOUND_CAPACITY};
use crate::pumps;
use crate::transport::{Connector, Link, TransportError};
use crate::types::KeepaliveConfig;

/// Capacity of the control queue the read pump answers pings on.
const CONTROL_CAPACITY: usize = 16;

/// Production [`Connector`] over `ws://`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    keepalive: Option<KeepaliveConfig>,
    max_message_size: usize,
    outbound_capacity: usize,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self {
            keepalive: Some(KeepaliveConfig::default()),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl WsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes keepalive, message size and queue capacity from `config`.
    ///
    /// A zero message size falls back to the default; a zero capacity becomes 1.
    pub fn from_config(config: &ClientConfig) -> Self {
        let max_message_size = match config.max_message_size {
            0 => DEFAULT_MAX_MESSAGE_SIZE,
            n => n,
        };
        Self {
            keepalive: config.keepalive.clone(),
            max_message_size,
            outbound_capacity: config.outbound_capacity.max(1),
        }
    }

    fn ws_config(&self) -> WebSocketConfig {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.max_message_size);
        ws_config.max_frame_size = Some(self.max_message_size);
        ws_config
    }
}

impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        let (ws_stream, response) =
            tokio_tungstenite::connect_async_with_config(url, Some(self.ws_config()), false)
                .await?;
        debug!(status = %response.status(), "WebSocket upgraded");
        let (write, read) = ws_stream.split();

        let (text_tx, text_rx) = mpsc::channel::<String>(self.outbound_capacity);
        let (control_tx, control_rx) = mpsc::channel::<tungstenite::Message>(CONTROL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(self.outbound_capacity);
        let cancel = CancellationToken::new();

        tokio::spawn(pumps::write::write_pump(
            write,
            text_rx,
            control_rx,
            events_tx.clone(),
            self.keepalive.as_ref().map(|k| k.ping_period),
            cancel.clone(),
        ));

        tokio::spawn(pumps::read::read_pump(
            read,
            events_tx,
            control_tx,
            self.keepalive.as_ref().map(|k| k.pong_wait),
            self.max_message_size,
            cancel.clone(),
        ));

        Ok(Link::new(text_tx, events_rx, cancel))
    }
}
