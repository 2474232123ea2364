use std::net::IpAddr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// mDNS service type advertised by VAC Hosts.
pub const SERVICE_NAME: &str = "_vac._tcp";

/// Default TTL for mDNS records (seconds).
pub const DEFAULT_TTL: u64 = 120;

/// A Host discovered via mDNS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredHost {
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub port: u16,
    /// Bearer token from the TXT record. Only filled in when the browser
    /// was built with [`Browser::accept_txt_token`](crate::Browser::accept_txt_token).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip)]
    pub ips: Vec<IpAddr>,
    #[serde(skip)]
    pub discovered_at: Option<Instant>,
    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl DiscoveredHost {
    /// Returns the host to dial: the first routable IP, else the mDNS hostname.
    pub fn connect_host(&self) -> String {
        match self.ips.first() {
            Some(ip) => ip.to_string(),
            None => self.hostname.trim_end_matches('.').to_string(),
        }
    }

    /// Returns the `host:port` address of the Host.
    pub fn address(&self) -> String {
        format!("{}:{}", self.connect_host(), self.port)
    }

    /// Returns true if the Host hasn't been seen recently.
    pub fn is_stale(&self, timeout: Duration) -> bool {
        match self.last_seen {
            Some(last) => last.elapsed() > timeout,
            None => true,
        }
    }
}
