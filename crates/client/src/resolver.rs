//! Host and credential resolution.
//!
//! Precedence: explicit host/port > static config object > injected
//! environment > discovery callback. The first source that yields a full
//! host+port wins outright; sources are never merged.

use std::panic::{AssertUnwindSafe, catch_unwind};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, trace, warn};
use url::Url;
use vac_protocol::constants::{ENV_HOST, ENV_PORT, ENV_TOKEN, URL_PROTOCOL_VERSION};

use crate::config::{ClientConfig, DiscoveryResult};
use crate::error::ClientError;

/// Characters left unescaped by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Port assumed for discovery URLs that don't name one.
const DEFAULT_URL_PORT: u16 = 80;

/// Where the target came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Explicit,
    StaticConfig,
    Environment,
    Discovery,
}

/// Resolved connection target. Produced fresh for every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub token: Option<String>,
    pub source: TargetSource,
}

impl ConnectionTarget {
    /// Builds `ws://<host>:<port>/?token=<token>&v=1`.
    ///
    /// The root path is spelled out so the handshake request line is
    /// `GET /?token=.. HTTP/1.1`. Fails with [`ClientError::TokenMissing`] when the token is absent or empty.
    pub fn url(&self) -> Result<String, ClientError> {
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::TokenMissing)?;
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        Ok(format!(
            "ws://{host}:{}/?token={}&v={URL_PROTOCOL_VERSION}",
            self.port,
            utf8_percent_encode(token, URI_COMPONENT)
        ))
    }

    /// Host and port only, safe for logs.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resolves the Host for the next attempt. `None` means no source was usable.
pub fn resolve(config: &ClientConfig) -> Option<ConnectionTarget> {
    let target = from_explicit(config)
        .or_else(|| from_static_config(config))
        .or_else(|| from_env(config))
        .or_else(|| from_discovery(config));
    match &target {
        Some(t) => debug!(address = %t.address(), source = ?t.source, "host resolved"),
        None => debug!("no source produced a host"),
    }
    target
}

fn target(
    host: &str,
    port: u16,
    token: Option<String>,
    source: TargetSource,
) -> Option<ConnectionTarget> {
    if host.is_empty() || port == 0 {
        return None;
    }
    Some(ConnectionTarget {
        host: host.to_string(),
        port,
        token,
        source,
    })
}

fn from_explicit(config: &ClientConfig) -> Option<ConnectionTarget> {
    let host = config.host.as_deref()?;
    let port = config.port?;
    target(host, port, config.token.clone(), TargetSource::Explicit)
}

fn from_static_config(config: &ClientConfig) -> Option<ConnectionTarget> {
    let file = config.static_config.as_ref()?;
    let token = file.token.clone().or_else(|| config.token.clone());
    target(&file.host, file.port, token, TargetSource::StaticConfig)
}

fn from_env(config: &ClientConfig) -> Option<ConnectionTarget> {
    let env = config.env.as_ref()?;
    let host = env.get(ENV_HOST)?;
    let port = env.get(ENV_PORT)?;
    let port = match port.trim().parse::<u16>() {
        Ok(p) => p,
        Err(_) => {
            trace!(port, "ignoring unparseable {ENV_PORT}");
            return None;
        }
    };
    let token = env
        .get(ENV_TOKEN)
        .map(str::to_string)
        .or_else(|| config.token.clone());
    target(host, port, token, TargetSource::Environment)
}

fn from_discovery(config: &ClientConfig) -> Option<ConnectionTarget> {
    if !config.discover {
        return None;
    }
    let discover = config.discovery.as_ref()?;
    let found = match catch_unwind(AssertUnwindSafe(|| discover())) {
        Ok(found) => found,
        Err(_) => {
            warn!("discovery callback panicked, treating host as unresolved");
            None
        }
    };
    match found? {
        DiscoveryResult::Target { host, port, token } => target(
            &host,
            port,
            token.or_else(|| config.token.clone()),
            TargetSource::Discovery,
        ),
        DiscoveryResult::Url(raw) => {
            let url = match Url::parse(&raw) {
                Ok(u) => u,
                Err(e) => {
                    trace!(url = %raw, error = %e, "discovery returned an unparseable URL");
                    return None;
                }
            };
            let host = url.host_str()?;
            let port = url.port().unwrap_or(DEFAULT_URL_PORT);
            target(host, port, config.token.clone(), TargetSource::Discovery)
        }
    }
}
