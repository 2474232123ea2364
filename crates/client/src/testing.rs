//! In-memory connector for driver tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::transport::{Connector, Link, LinkPeer, TransportError};

/// Hands every opened link's peer to the test and records dialled URLs.
///
/// Also counts connects that started while an earlier link was still live.
#[derive(Clone)]
pub(crate) struct MockConnector {
    peers: mpsc::UnboundedSender<LinkPeer>,
    urls: Arc<Mutex<Vec<String>>>,
    failures: Arc<AtomicUsize>,
    live: Arc<Mutex<Vec<CancellationToken>>>,
    overlapping: Arc<AtomicUsize>,
}

impl MockConnector {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<LinkPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers: tx,
            urls: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(Mutex::new(Vec::new())),
            overlapping: Arc::new(AtomicUsize::new(0)),
        };
        (connector, rx)
    }

    /// Makes the next `n` connects fail.
    pub(crate) fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Connects that ran while a previously issued link was not yet cancelled.
    pub(crate) fn overlapping_connects(&self) -> usize {
        self.overlapping.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        self.urls.lock().unwrap().push(url.to_string());
        {
            let mut live = self.live.lock().unwrap();
            live.retain(|token| !token.is_cancelled());
            if !live.is_empty() {
                self.overlapping.fetch_add(1, Ordering::SeqCst);
            }
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Other("connection refused".into()));
        }
        let (link, peer) = Link::channel(16);
        self.live.lock().unwrap().push(link.cancel_token());
        let _ = self.peers.send(peer);
        Ok(link)
    }
}
