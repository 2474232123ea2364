use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::DiscoveryError;
use crate::types::{DEFAULT_TTL, DiscoveredHost, SERVICE_NAME};

/// Discovers VAC Hosts on the local network via mDNS/DNS-SD.
///
/// The browser is shared (`Arc<Browser>`): one task runs
/// [`start_continuous_discovery`](Self::start_continuous_discovery) while
/// readers query the cache synchronously.
pub struct Browser {
    hosts: RwLock<HashMap<String, DiscoveredHost>>,
    timeout: Duration,
    accept_txt_token: bool,
}

/// Fields read from a Host's TXT record.
#[derive(Debug, Default, PartialEq, Eq)]
struct TxtFields {
    id: Option<String>,
    name: Option<String>,
    token: Option<String>,
}

impl Browser {
    /// Creates a new mDNS browser.
    pub fn new() -> Self {
        Self {
            hosts: RwLock::new(HashMap::new()),
            timeout: Duration::from_secs(DEFAULT_TTL),
            accept_txt_token: false,
        }
    }

    /// Sets the stale Host timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Opts in to reading a bearer `token` from TXT records.
    ///
    /// TXT records are visible to every machine on the link, so a token
    /// published there is only as private as the network. Off by default.
    pub fn accept_txt_token(mut self, accept: bool) -> Self {
        self.accept_txt_token = accept;
        self
    }

    /// Browses continuously until `cancel` fires.
    ///
    /// Uses a single `ServiceDaemon` for the whole session and prunes Hosts
    /// not seen within the stale timeout every `prune_interval`. Fails only
    /// if the daemon can't be started.
    pub async fn start_continuous_discovery(
        &self,
        cancel: CancellationToken,
        prune_interval: Duration,
    ) -> Result<(), DiscoveryError> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::Mdns(format!("failed to create mDNS daemon: {e}")))?;

        let service_type = format!("{SERVICE_NAME}.local.");
        let event_rx = match daemon.browse(&service_type) {
            Ok(rx) => rx,
            Err(e) => {
                let _ = daemon.shutdown();
                return Err(DiscoveryError::Mdns(format!("failed to browse mDNS: {e}")));
            }
        };

        let mut prune_ticker = tokio::time::interval(prune_interval);
        prune_ticker.tick().await;

        loop {
            tokio::select! {
                result = tokio::task::spawn_blocking({
                    let rx = event_rx.clone();
                    move || rx.recv_timeout(Duration::from_millis(500))
                }) => {
                    if let Ok(Ok(event)) = result {
                        self.process_event(&event);
                    }
                }
                _ = prune_ticker.tick() => {
                    self.prune_stale_hosts();
                }
                _ = cancel.cancelled() => {
                    let _ = daemon.shutdown();
                    debug!("discovery stopped");
                    return Ok(());
                }
            }
        }
    }

    /// Folds a resolved service into the cache.
    fn process_event(&self, event: &ServiceEvent) {
        let ServiceEvent::ServiceResolved(info) = event else {
            return;
        };

        let txt = parse_txt(
            info.get_properties()
                .iter()
                .map(|p| (p.key(), p.val_str())),
            self.accept_txt_token,
        );
        let id = txt.id.unwrap_or_else(|| info.get_fullname().to_string());
        let name = txt.name.unwrap_or_else(|| info.get_hostname().to_string());

        let ips: Vec<IpAddr> = info
            .get_addresses()
            .iter()
            .copied()
            .filter(is_routable)
            .collect();

        let now = Instant::now();
        let mut hosts = self.write_hosts();
        let refreshed = match hosts.get_mut(&id) {
            Some(existing) => {
                existing.last_seen = Some(now);
                existing.ips = ips;
                existing.port = info.get_port();
                existing.token = txt.token;
                true
            }
            None => {
                hosts.insert(
                    id.clone(),
                    DiscoveredHost {
                        id: id.clone(),
                        name,
                        hostname: info.get_hostname().to_string(),
                        port: info.get_port(),
                        token: txt.token,
                        ips,
                        discovered_at: Some(now),
                        last_seen: Some(now),
                    },
                );
                false
            }
        };
        drop(hosts);

        debug!(host = %id, port = info.get_port(), refreshed, "mDNS host resolved");
    }

    /// Removes Hosts that haven't been seen recently.
    fn prune_stale_hosts(&self) {
        let timeout = self.timeout;
        self.write_hosts().retain(|id, host| {
            let keep = !host.is_stale(timeout);
            if !keep {
                debug!(host = %id, "pruned stale host");
            }
            keep
        });
    }

    /// Returns all currently known Hosts.
    pub fn hosts(&self) -> Vec<DiscoveredHost> {
        self.read_hosts().values().cloned().collect()
    }

    /// Returns a specific Host by ID.
    pub fn host(&self, id: &str) -> Option<DiscoveredHost> {
        self.read_hosts().get(id).cloned()
    }

    /// Returns the Host seen most recently, if any.
    pub fn freshest(&self) -> Option<DiscoveredHost> {
        self.read_hosts()
            .values()
            .max_by_key(|host| host.last_seen)
            .cloned()
    }

    /// Inserts or refreshes a Host by hand (static entries, tests).
    pub fn insert(&self, host: DiscoveredHost) {
        self.write_hosts().insert(host.id.clone(), host);
    }

    fn read_hosts(&self) -> RwLockReadGuard<'_, HashMap<String, DiscoveredHost>> {
        self.hosts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_hosts(&self) -> RwLockWriteGuard<'_, HashMap<String, DiscoveredHost>> {
        self.hosts.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Browser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_txt<'a>(
    properties: impl IntoIterator<Item = (&'a str, &'a str)>,
    accept_token: bool,
) -> TxtFields {
    let mut fields = TxtFields::default();
    for (key, val) in properties {
        if val.is_empty() {
            continue;
        }
        match key {
            "id" => fields.id = Some(val.to_string()),
            "name" => fields.name = Some(val.to_string()),
            "token" if accept_token => fields.token = Some(val.to_string()),
            _ => {}
        }
    }
    fields
}

/// Keeps IPv4 addresses that are neither loopback nor link-local.
fn is_routable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_link_local(),
        IpAddr::V6(_) => false,
    }
}
