//! mDNS/DNS-SD discovery of VAC Hosts on the local network.
//!
//! Hosts advertise [`SERVICE_NAME`] with TXT records `id` and `name`. A
//! `token` entry is read only when the browser opts in. The [`Browser`]
//! keeps a cache of what it has seen.

pub mod client;
pub mod types;

// Re-export primary types.
pub use client::Browser;
pub use types::{DEFAULT_TTL, DiscoveredHost, SERVICE_NAME};

/// Errors for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("mDNS error: {0}")]
    Mdns(String),
}
