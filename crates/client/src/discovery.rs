//! mDNS integration for the discovery step of host resolution.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};
use vac_discovery::{Browser, DiscoveredHost};

use crate::config::{ClientConfig, DiscoveryResult};

impl From<&DiscoveredHost> for DiscoveryResult {
    fn from(host: &DiscoveredHost) -> Self {
        DiscoveryResult::Target {
            host: host.connect_host(),
            port: host.port,
            token: host.token.clone(),
        }
    }
}

/// Starts a background mDNS browse that runs until `cancel` fires.
///
/// The returned browser fills its cache as Hosts answer; pass it to
/// [`ClientConfig::with_mdns_discovery`].
pub fn spawn_browser(cancel: CancellationToken, prune_interval: Duration) -> Arc<Browser> {
    let browser = Arc::new(Browser::new());
    let background = browser.clone();
    tokio::spawn(async move {
        if let Err(e) = background
            .start_continuous_discovery(cancel, prune_interval)
            .await
        {
            warn!("mDNS discovery unavailable: {e}");
        }
    });
    browser
}

/// Discovery callback that answers with the most recently seen Host.
pub fn mdns_discovery(browser: Arc<Browser>) -> impl Fn() -> Option<DiscoveryResult> + Send + Sync {
    move || {
        let host = browser.freshest()?;
        trace!(host = %host.id, address = %host.address(), "discovery picked mDNS host");
        Some(DiscoveryResult::from(&host))
    }
}

impl ClientConfig {
    /// Uses the browser's cache as the discovery source.
    pub fn with_mdns_discovery(self, browser: Arc<Browser>) -> Self {
        self.with_discovery(mdns_discovery(browser))
    }
}
