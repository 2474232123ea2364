//! Connection driver.
//!
//! A single task owns the socket, the attempt counter and the retry timer.
//! Public handles reach it only through the cancellation token and two watch
//! channels: one for the [`ConnectionState`], one holding the outbound queue
//! of the current socket (`None` while not open).

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use vac_protocol::{ClientFrame, Hello};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::EventBus;
use crate::reconnection::{Backoff, sleep_or_cancel};
use crate::resolver::resolve;
use crate::transport::{Connector, Frame, Link, LinkEvent};
use crate::types::{ClientEvent, ConnectionState, InboundMessage};

/// Outbound queue of the open socket, if any.
pub(crate) type Outbound = Option<mpsc::Sender<String>>;

/// State machine behind a [`Client`](crate::Client).
pub(crate) struct ConnectionManager<C> {
    config: ClientConfig,
    connector: C,
    bus: Arc<EventBus>,
    state: watch::Sender<ConnectionState>,
    outbound: watch::Sender<Outbound>,
    backoff: Backoff,
    cancel: CancellationToken,
}

impl<C: Connector> ConnectionManager<C> {
    pub(crate) fn new(
        config: ClientConfig,
        connector: C,
        bus: Arc<EventBus>,
        state: watch::Sender<ConnectionState>,
        outbound: watch::Sender<Outbound>,
        cancel: CancellationToken,
    ) -> Self {
        let backoff = Backoff::new(config.reconnect.clone());
        Self {
            config,
            connector,
            bus,
            state,
            outbound,
            backoff,
            cancel,
        }
    }

    /// Runs attempts until cancelled, then settles in [`ConnectionState::Closed`].
    pub(crate) async fn run(mut self) {
        while !self.cancel.is_cancelled() {
            self.attempt().await;
            if self.cancel.is_cancelled() {
                break;
            }

            let delay = self.backoff.next_delay();
            let attempt = self.backoff.attempt();
            self.set_state(ConnectionState::Reconnecting { attempt, delay });
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );
            if !sleep_or_cancel(delay, &self.cancel).await {
                debug!("reconnect cancelled");
                break;
            }
        }

        self.outbound.send_replace(None);
        self.set_state(ConnectionState::Closed);
        info!("client closed");
    }

    /// One pass through `Connecting`: resolve, connect, and run the session
    /// if the socket opens.
    async fn attempt(&mut self) {
        self.set_state(ConnectionState::Connecting);

        let Some(target) = resolve(&self.config) else {
            warn!("VAC host not resolved");
            self.emit(ClientEvent::Error(ClientError::HostUnresolved));
            return;
        };
        let url = match target.url() {
            Ok(url) => url,
            Err(e) => {
                warn!(address = %target.address(), "{e}");
                self.emit(ClientEvent::Error(e));
                return;
            }
        };

        info!(address = %target.address(), source = ?target.source, "connecting");
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return,
            result = self.connector.connect(&url) => result,
        };

        match result {
            Ok(link) => self.run_session(link).await,
            Err(e) => {
                warn!(address = %target.address(), error = %e, "connect failed");
                self.emit(ClientEvent::Error(ClientError::Transport(e.to_string())));
                self.emit(ClientEvent::Close);
            }
        }
    }

    async fn run_session(&mut self, mut link: Link) {
        self.backoff.reset();
        self.set_state(ConnectionState::Open);

        // The handshake goes in before the queue is published, so it is
        // always the first frame on the wire.
        let outbound = link.outbound();
        let hello = Hello::new(self.config.app.clone(), self.config.app_version.clone());
        match ClientFrame::from(hello).to_text() {
            Ok(text) => {
                if let Err(e) = outbound.try_send(text) {
                    warn!("failed to queue handshake: {e}");
                }
            }
            Err(e) => warn!("failed to encode handshake: {e}"),
        }
        self.outbound.send_replace(Some(outbound));
        info!(app = %self.config.app, "connected");
        self.emit(ClientEvent::Open);

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.set_state(ConnectionState::Closing);
                    break;
                }
                event = link.recv() => event,
            };
            match event {
                Some(LinkEvent::Frame(Frame::Text(text))) => {
                    trace!(bytes = text.len(), "text frame received");
                    self.emit(ClientEvent::Message(InboundMessage::from_text(text)));
                }
                Some(LinkEvent::Frame(Frame::Binary(data))) => {
                    trace!(bytes = data.len(), "binary frame received");
                    self.emit(ClientEvent::Message(InboundMessage::Binary(data)));
                }
                Some(LinkEvent::Error(message)) => {
                    warn!(error = %message, "transport error");
                    self.emit(ClientEvent::Error(ClientError::Transport(message)));
                }
                Some(LinkEvent::Closed) | None => break,
            }
        }

        self.outbound.send_replace(None);
        link.close();
        info!("disconnected");
        self.emit(ClientEvent::Close);
    }

    fn set_state(&self, state: ConnectionState) {
        trace!(?state, "state change");
        self.state.send_replace(state);
    }

    fn emit(&self, event: ClientEvent) {
        self.bus.publish(&event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::DiscoveryResult;
    use crate::testing::MockConnector;
    use crate::types::{EventKind, ReconnectConfig};

    struct Harness {
        state: watch::Receiver<ConnectionState>,
        outbound: watch::Receiver<Outbound>,
        cancel: CancellationToken,
        events: Arc<std::sync::Mutex<Vec<ClientEvent>>>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn start(config: ClientConfig, connector: MockConnector) -> Harness {
        let bus = EventBus::new();
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        for kind in EventKind::ALL {
            let events = events.clone();
            bus.subscribe(kind, move |ev| events.lock().unwrap().push(ev.clone()));
        }
        let (state_tx, state) = watch::channel(ConnectionState::Idle);
        let (outbound_tx, outbound) = watch::channel(None);
        let cancel = CancellationToken::new();
        let manager =
            ConnectionManager::new(config, connector, bus, state_tx, outbound_tx, cancel.clone());
        Harness {
            state,
            outbound,
            cancel,
            events,
            handle: tokio::spawn(manager.run()),
        }
    }

    fn configured() -> ClientConfig {
        ClientConfig::new().with_host("devbox", 8787).with_token("t")
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_host_reports_and_retries() {
        let (connector, _peers) = MockConnector::new();
        let mut h = start(ClientConfig::new().with_token("t"), connector.clone());

        h.state
            .wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. }))
            .await
            .unwrap();
        assert_eq!(
            *h.events.lock().unwrap(),
            vec![ClientEvent::Error(ClientError::HostUnresolved)]
        );
        assert!(connector.urls().is_empty());

        h.cancel.cancel();
        h.handle.await.unwrap();
        assert_eq!(*h.state.borrow(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_token_never_connects() {
        let (connector, _peers) = MockConnector::new();
        let mut h = start(ClientConfig::new().with_host("devbox", 8787), connector.clone());

        h.state
            .wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. }))
            .await
            .unwrap();
        assert_eq!(
            *h.events.lock().unwrap(),
            vec![ClientEvent::Error(ClientError::TokenMissing)]
        );
        assert!(connector.urls().is_empty());
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_reports_error_then_close() {
        let (connector, _peers) = MockConnector::new();
        connector.fail_next(1);
        let mut h = start(configured(), connector.clone());

        h.state
            .wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. }))
            .await
            .unwrap();
        let events = h.events.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ClientEvent::Error(ClientError::Transport(_))));
        assert_eq!(events[1], ClientEvent::Close);
        assert_eq!(connector.urls(), vec!["ws://devbox:8787/?token=t&v=1"]);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_grow_while_disconnected_and_reset_on_open() {
        let (connector, mut peers) = MockConnector::new();
        connector.fail_next(2);
        let config = configured().with_reconnect(ReconnectConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        });
        let mut h = start(config, connector.clone());

        h.state
            .wait_for(|s| {
                *s == ConnectionState::Reconnecting {
                    attempt: 2,
                    delay: Duration::from_millis(200),
                }
            })
            .await
            .unwrap();

        let peer = peers.recv().await.unwrap();
        h.state.wait_for(|s| *s == ConnectionState::Open).await.unwrap();
        assert!(peer.close().await);

        h.state
            .wait_for(|s| {
                *s == ConnectionState::Reconnecting {
                    attempt: 1,
                    delay: Duration::from_millis(100),
                }
            })
            .await
            .unwrap();
        assert_eq!(connector.urls().len(), 3);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn outbound_published_only_while_open() {
        let (connector, mut peers) = MockConnector::new();
        let mut h = start(configured(), connector);
        assert!(h.outbound.borrow().is_none());

        let mut peer = peers.recv().await.unwrap();
        h.outbound.wait_for(Option::is_some).await.unwrap();
        let hello: serde_json::Value =
            serde_json::from_str(&peer.recv_text().await.unwrap()).unwrap();
        assert_eq!(hello["command"], "hello");

        peer.close().await;
        h.outbound.wait_for(Option::is_none).await.unwrap();
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_session_closes_link_once() {
        let (connector, mut peers) = MockConnector::new();
        let mut h = start(configured(), connector.clone());

        let peer = peers.recv().await.unwrap();
        h.state.wait_for(|s| *s == ConnectionState::Open).await.unwrap();

        h.cancel.cancel();
        h.handle.await.unwrap();

        assert!(peer.is_cancelled());
        assert_eq!(*h.state.borrow(), ConnectionState::Closed);
        assert_eq!(
            *h.events.lock().unwrap(),
            vec![ClientEvent::Open, ClientEvent::Close]
        );
        assert_eq!(connector.urls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn every_attempt_resolves_the_host_again() {
        let (connector, mut peers) = MockConnector::new();
        connector.fail_next(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let config = ClientConfig::new().with_token("t").with_discovery(move || {
            let host = match c.fetch_add(1, Ordering::SeqCst) {
                0 => "alpha",
                _ => "beta",
            };
            Some(DiscoveryResult::Target {
                host: host.into(),
                port: 8787,
                token: None,
            })
        });
        let mut h = start(config, connector.clone());

        let _peer = peers.recv().await.unwrap();
        h.state.wait_for(|s| *s == ConnectionState::Open).await.unwrap();
        assert_eq!(
            connector.urls(),
            vec![
                "ws://alpha:8787/?token=t&v=1",
                "ws://beta:8787/?token=t&v=1",
            ]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn remote_close_releases_link_before_next_connect() {
        let (connector, mut peers) = MockConnector::new();
        let mut h = start(configured(), connector.clone());

        let first = peers.recv().await.unwrap();
        h.state.wait_for(|s| *s == ConnectionState::Open).await.unwrap();
        assert!(first.close().await);

        let _second = peers.recv().await.unwrap();
        assert!(first.is_cancelled());
        assert_eq!(connector.urls().len(), 2);
        assert_eq!(connector.overlapping_connects(), 0);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_discovery_is_retried() {
        let (connector, mut peers) = MockConnector::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let config = ClientConfig::new().with_token("t").with_discovery(move || {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("resolver blew up");
            }
            Some(DiscoveryResult::Url("ws://devbox:8787".into()))
        });
        let mut h = start(config, connector.clone());

        let _peer = peers.recv().await.unwrap();
        h.state.wait_for(|s| *s == ConnectionState::Open).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(connector.urls(), vec!["ws://devbox:8787/?token=t&v=1"]);
        assert_eq!(
            h.events.lock().unwrap()[0],
            ClientEvent::Error(ClientError::HostUnresolved)
        );
        h.cancel.cancel();
    }
}
