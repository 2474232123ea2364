//! Public client handle.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vac_protocol::NavigatorSnapshot;
use vac_protocol::constants::COMMAND_NAV_SNAPSHOT;

use crate::config::ClientConfig;
use crate::error::SendError;
use crate::events::{EventBus, Subscription};
use crate::manager::{ConnectionManager, Outbound};
use crate::transport::Connector;
use crate::types::{ClientEvent, ConnectionState, EventKind};
use crate::ws_client::WsConnector;

/// Something that can be sent as one text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Sent verbatim.
    Text(String),
    /// Serialized to JSON text.
    Json(Value),
}

impl Payload {
    fn into_text(self) -> Result<String, SendError> {
        match self {
            Payload::Text(text) => Ok(text),
            Payload::Json(value) => Ok(serde_json::to_string(&value)?),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// Creates a client over WebSocket and starts connecting immediately.
///
/// # Panics
///
/// Must be called from within a Tokio runtime.
pub fn create_client(config: ClientConfig) -> Client {
    let connector = WsConnector::from_config(&config);
    Client::with_connector(config, connector)
}

/// Self-healing connection to a VAC Host.
///
/// Dropping the client closes it.
pub struct Client {
    bus: Arc<EventBus>,
    state: watch::Receiver<ConnectionState>,
    sender: Sender,
}

impl Client {
    /// Creates a client over a custom transport and starts connecting.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_connector<C: Connector>(config: ClientConfig, connector: C) -> Self {
        let bus = EventBus::new();
        let (state_tx, state) = watch::channel(ConnectionState::Idle);
        let (outbound_tx, outbound) = watch::channel(None);
        let cancel = CancellationToken::new();

        debug!(?config, "creating client");
        let manager = ConnectionManager::new(
            config,
            connector,
            bus.clone(),
            state_tx,
            outbound_tx,
            cancel.clone(),
        );
        tokio::spawn(manager.run());

        Self {
            bus,
            state,
            sender: Sender { outbound, cancel },
        }
    }

    /// Registers a handler for one event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    /// Registers a handler by event name (`open`, `close`, `error`, `message`).
    ///
    /// Unknown names register nothing and return a detached subscription.
    pub fn on_named<F>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        match name.parse::<EventKind>() {
            Ok(kind) => self.on(kind, handler),
            Err(e) => {
                debug!("{e}, ignoring handler");
                Subscription::detached()
            }
        }
    }

    /// Sends one frame. `true` only if it was handed to an open socket.
    pub fn send(&self, payload: impl Into<Payload>) -> bool {
        self.sender.send(payload)
    }

    /// Like [`send`](Self::send), with the reason on failure.
    pub fn try_send(&self, payload: impl Into<Payload>) -> Result<(), SendError> {
        self.sender.try_send(payload)
    }

    /// Serializes `value` to JSON and sends it.
    pub fn send_json<T: Serialize>(&self, value: &T) -> bool {
        self.sender.send_json(value)
    }

    pub fn publish_navigator_snapshot(&self, snapshot: &NavigatorSnapshot) -> bool {
        self.sender.publish_navigator_snapshot(snapshot)
    }

    /// Publishes a snapshot given as loose JSON. `screens` must be an array.
    pub fn publish_navigator_snapshot_value(&self, snapshot: &Value) -> bool {
        self.sender.publish_navigator_snapshot_value(snapshot)
    }

    /// Cancels any pending retry, releases the socket and stops for good.
    ///
    /// Safe to call any number of times.
    pub fn close(&self) {
        if !self.sender.cancel.is_cancelled() {
            info!("closing client");
            self.sender.cancel.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.cancel.is_cancelled()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch channel following every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// A cloneable send-only handle, usable from inside event handlers.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

/// Send side of a [`Client`].
///
/// Holds no socket of its own: every call looks up the socket that is open
/// right now, if any.
#[derive(Clone)]
pub struct Sender {
    outbound: watch::Receiver<Outbound>,
    cancel: CancellationToken,
}

impl Sender {
    pub fn send(&self, payload: impl Into<Payload>) -> bool {
        report(self.try_send(payload))
    }

    pub fn try_send(&self, payload: impl Into<Payload>) -> Result<(), SendError> {
        if self.cancel.is_cancelled() {
            return Err(SendError::Closed);
        }
        let outbound = self
            .outbound
            .borrow()
            .clone()
            .ok_or(SendError::NotConnected)?;
        let text = payload.into().into_text()?;
        outbound.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => SendError::NotConnected,
        })
    }

    pub fn send_json<T: Serialize>(&self, value: &T) -> bool {
        report(self.try_send_json(value))
    }

    pub fn try_send_json<T: Serialize>(&self, value: &T) -> Result<(), SendError> {
        let text = serde_json::to_string(value)?;
        self.try_send(text)
    }

    pub fn publish_navigator_snapshot(&self, snapshot: &NavigatorSnapshot) -> bool {
        report(self.try_send_json(&vac_protocol::ClientFrame::from(snapshot.clone())))
    }

    pub fn publish_navigator_snapshot_value(&self, snapshot: &Value) -> bool {
        report(snapshot_frame(snapshot).and_then(|frame| self.try_send(frame)))
    }
}

/// Builds `{...snapshot, "command": "nav:snapshot"}` from loose JSON.
fn snapshot_frame(snapshot: &Value) -> Result<Value, SendError> {
    let fields = snapshot
        .as_object()
        .ok_or(SendError::InvalidSnapshot("snapshot must be an object"))?;
    if !fields.get("screens").is_some_and(Value::is_array) {
        return Err(SendError::InvalidSnapshot("screens must be an array"));
    }
    let mut frame = fields.clone();
    frame.insert("command".into(), Value::from(COMMAND_NAV_SNAPSHOT));
    Ok(Value::Object(frame))
}

fn report(result: Result<(), SendError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(reason = %e, "frame not sent");
            false
        }
    }
}
