//! Client side of the VAC dev-tool connection.
//!
//! An embedded app creates a [`Client`], which finds the Host, opens a
//! WebSocket, greets it with a `hello` frame and reconnects with capped
//! exponential backoff until closed. Navigation state can be reported with
//! [`Client::publish_navigator_snapshot`].

pub mod client;
pub mod config;
mod discovery;
pub mod error;
pub mod events;
mod manager;
mod pumps;
pub(crate) mod reconnection;
pub mod resolver;
pub mod snapshot;
#[cfg(test)]
mod testing;
pub mod transport;
pub mod types;
pub mod ws_client;

pub use client::{Client, Payload, Sender, create_client};
pub use config::{ClientConfig, DiscoveryResult, InjectedEnv, StaticConfig};
pub use discovery::{mdns_discovery, spawn_browser};
pub use error::{ClientError, ConfigError, SendError};
pub use events::Subscription;
pub use resolver::{ConnectionTarget, TargetSource, resolve};
pub use snapshot::build_snapshot_from_navigation_state;
pub use transport::{Connector, Frame, Link, LinkEvent, LinkPeer, TransportError};
pub use types::{
    ClientEvent, ConnectionState, EventKind, InboundMessage, KeepaliveConfig, ReconnectConfig,
};
pub use vac_protocol::{Edge, NavigatorSnapshot};
pub use ws_client::WsConnector;
