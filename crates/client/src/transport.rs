//! Transport seam between the connection driver and a socket.
//!
//! A [`Connector`] opens one [`Link`] per attempt. The link exposes an
//! outbound text queue, a stream of [`LinkEvent`]s and a cancellation token
//! that tears the socket down.

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

/// Errors opening a link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("{0}")]
    Other(String),
}

/// One inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Frame(Frame),
    /// Transport-level failure. Does not by itself end the link.
    Error(String),
    /// The link is gone. Nothing follows.
    Closed,
}

/// Opens links to a Host URL.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> impl Future<Output = Result<Link, TransportError>> + Send;
}

/// An open socket as seen by the connection driver.
///
/// Dropping or closing the link cancels it; the transport side observes
/// the cancellation and releases the socket.
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<LinkEvent>,
    cancel: CancellationToken,
}

impl Link {
    pub fn new(
        outbound: mpsc::Sender<String>,
        inbound: mpsc::Receiver<LinkEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            inbound,
            cancel,
        }
    }

    /// Creates an in-memory link and the peer that drives it.
    pub fn channel(capacity: usize) -> (Link, LinkPeer) {
        let (out_tx, out_rx) = mpsc::channel(capacity.max(1));
        let (in_tx, in_rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let link = Link::new(out_tx, in_rx, cancel.clone());
        let peer = LinkPeer {
            outbound: out_rx,
            inbound: in_tx,
            cancel,
        };
        (link, peer)
    }

    /// Sender for outbound text frames.
    pub fn outbound(&self) -> mpsc::Sender<String> {
        self.outbound.clone()
    }

    /// Next event. `None` once the transport side is gone.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.inbound.recv().await
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Transport end of an in-memory [`Link`].
#[derive(Debug)]
pub struct LinkPeer {
    outbound: mpsc::Receiver<String>,
    inbound: mpsc::Sender<LinkEvent>,
    cancel: CancellationToken,
}

impl LinkPeer {
    /// Next frame the client sent. `None` once the client side is dropped.
    pub async fn recv_text(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Non-blocking variant of [`recv_text`](Self::recv_text).
    pub fn try_recv_text(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.send(LinkEvent::Frame(Frame::Text(text.into()))).await
    }

    pub async fn send_binary(&self, data: impl Into<Vec<u8>>) -> bool {
        self.send(LinkEvent::Frame(Frame::Binary(data.into()))).await
    }

    pub async fn send_error(&self, message: impl Into<String>) -> bool {
        self.send(LinkEvent::Error(message.into())).await
    }

    /// Reports the link as closed from the transport side.
    pub async fn close(&self) -> bool {
        self.send(LinkEvent::Closed).await
    }

    pub async fn send(&self, event: LinkEvent) -> bool {
        self.inbound.send(event).await.is_ok()
    }

    /// Whether the client side closed the link.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
