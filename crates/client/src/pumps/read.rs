//! WebSocket read pump: turns socket messages into link events.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::transport::{Frame, LinkEvent};

/// Reads messages from the WebSocket and forwards them as [`LinkEvent`]s.
///
/// With a `pong_wait`, any incoming message pushes the deadline out; if
/// nothing arrives before it expires the connection is reported dead. The
/// pump always finishes with [`LinkEvent::Closed`] and cancels the link so
/// the write and ping pumps stop too.
pub(crate) async fn read_pump<S>(
    mut read: S,
    events_tx: mpsc::Sender<LinkEvent>,
    control_tx: mpsc::Sender<tungstenite::Message>,
    pong_wait: Option<Duration>,
    max_message_size: usize,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(pong_wait.unwrap_or_default());
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut deadline, if pong_wait.is_some() => {
                warn!("pong timeout, connection dead");
                let _ = events_tx.send(LinkEvent::Error("pong timeout".into())).await;
                break;
            }

            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        let _ = events_tx.send(LinkEvent::Error(e.to_string())).await;
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                };

                if let Some(wait) = pong_wait {
                    deadline.as_mut().reset(tokio::time::Instant::now() + wait);
                }

                let frame = match msg {
                    tungstenite::Message::Text(text) => Frame::Text(text.as_str().to_owned()),
                    tungstenite::Message::Binary(data) => Frame::Binary(data.to_vec()),
                    tungstenite::Message::Ping(data) => {
                        trace!("received ping, sending pong");
                        let _ = control_tx.send(tungstenite::Message::Pong(data)).await;
                        continue;
                    }
                    tungstenite::Message::Pong(_) => {
                        trace!("received pong");
                        continue;
                    }
                    tungstenite::Message::Close(frame) => {
                        debug!(?frame, "received close frame");
                        break;
                    }
                    tungstenite::Message::Frame(_) => continue,
                };

                if frame_len(&frame) > max_message_size {
                    warn!(bytes = frame_len(&frame), "message too large, dropping");
                    continue;
                }
                if events_tx.send(LinkEvent::Frame(frame)).await.is_err() {
                    break;
                }
            }
        }
    }

    cancel.cancel();
    let _ = events_tx.send(LinkEvent::Closed).await;
}

fn frame_len(frame: &Frame) -> usize {
    match frame {
        Frame::Text(t) => t.len(),
        Frame::Binary(b) => b.len(),
    }
}
