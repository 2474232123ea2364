//! Client configuration.
//!
//! A [`ClientConfig`] is assembled by the embedding app and frozen when the
//! client is created. Sources for the Host address are checked in a fixed
//! order by [`resolve`](crate::resolver::resolve).

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vac_protocol::constants::{
    CONFIG_FILE_NAME, DEFAULT_APP_NAME, DEFAULT_APP_VERSION, ENV_HOST, ENV_PORT, ENV_TOKEN,
};

use crate::error::ConfigError;
use crate::types::{KeepaliveConfig, ReconnectConfig};

/// Default cap for a single inbound message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default number of frames that may wait in the outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Result of a discovery callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryResult {
    /// A URL such as `ws://192.168.1.20:8787`; host and port are extracted.
    Url(String),
    /// An explicit target. A missing token falls back to the configured one.
    Target {
        host: String,
        port: u16,
        token: Option<String>,
    },
}

impl From<String> for DiscoveryResult {
    fn from(url: String) -> Self {
        DiscoveryResult::Url(url)
    }
}

impl From<&str> for DiscoveryResult {
    fn from(url: &str) -> Self {
        DiscoveryResult::Url(url.to_string())
    }
}

/// Synchronous discovery callback. Runs on every connection attempt that
/// reaches the discovery step.
pub type DiscoveryFn = dyn Fn() -> Option<DiscoveryResult> + Send + Sync;

/// Static config object, usually loaded from `.vacrc.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl StaticConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Loads a static config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: StaticConfig = serde_json::from_str(&data)?;
        debug!(path = %path.display(), host = %config.host, port = config.port, "loaded static config");
        Ok(config)
    }

    /// Loads `.vacrc.json` from `dir` if the file exists.
    pub fn find_in(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }
}

/// Environment values handed to the client explicitly.
///
/// Embedded targets often have no process environment, so the client never
/// reads it on its own. [`InjectedEnv::from_process_env`] captures it when
/// one is available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectedEnv {
    vars: HashMap<String, String>,
}

impl InjectedEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures `VAC_HOST`, `VAC_PORT` and `VAC_TOKEN` from the process environment.
    pub fn from_process_env() -> Self {
        [ENV_HOST, ENV_PORT, ENV_TOKEN]
            .into_iter()
            .filter_map(|key| std::env::var(key).ok().map(|val| (key, val)))
            .collect()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InjectedEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Everything the client needs to find, authenticate with and greet the Host.
#[derive(Clone)]
pub struct ClientConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Bearer token. Required for a live connection.
    pub token: Option<String>,
    /// App label sent in the handshake.
    pub app: String,
    /// App version sent in the handshake.
    pub app_version: String,
    pub reconnect: ReconnectConfig,
    /// Whether the discovery callback may be consulted.
    pub discover: bool,
    pub env: Option<InjectedEnv>,
    pub discovery: Option<Arc<DiscoveryFn>>,
    pub static_config: Option<StaticConfig>,
    /// WebSocket keepalive; `None` disables client pings and the dead-peer deadline.
    pub keepalive: Option<KeepaliveConfig>,
    pub max_message_size: usize,
    pub outbound_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            token: None,
            app: DEFAULT_APP_NAME.into(),
            app_version: DEFAULT_APP_VERSION.into(),
            reconnect: ReconnectConfig::default(),
            discover: true,
            env: None,
            discovery: None,
            static_config: None,
            keepalive: Some(KeepaliveConfig::default()),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_app(mut self, app: impl Into<String>, version: impl Into<String>) -> Self {
        self.app = app.into();
        self.app_version = version.into();
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_env(mut self, env: InjectedEnv) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_static_config(mut self, config: StaticConfig) -> Self {
        self.static_config = Some(config);
        self
    }

    /// Installs a discovery callback and enables discovery.
    pub fn with_discovery<F>(mut self, discovery: F) -> Self
    where
        F: Fn() -> Option<DiscoveryResult> + Send + Sync + 'static,
    {
        self.discovery = Some(Arc::new(discovery));
        self.discover = true;
        self
    }

    /// Turns discovery on or off without touching the callback.
    pub fn with_discover(mut self, enabled: bool) -> Self {
        self.discover = enabled;
        self
    }

    pub fn with_keepalive(mut self, keepalive: Option<KeepaliveConfig>) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    pub fn with_outbound_capacity(mut self, frames: usize) -> Self {
        self.outbound_capacity = frames.max(1);
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("app", &self.app)
            .field("app_version", &self.app_version)
            .field("reconnect", &self.reconnect)
            .field("discover", &self.discover)
            .field("env", &self.env.is_some())
            .field("discovery", &self.discovery.is_some())
            .field("static_config", &self.static_config.is_some())
            .field("keepalive", &self.keepalive)
            .field("max_message_size", &self.max_message_size)
            .field("outbound_capacity", &self.outbound_capacity)
            .finish()
    }
}
