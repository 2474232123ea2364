//! WebSocket write pump: serialises outbound frames and keepalive pings onto the sink.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::transport::LinkEvent;

/// Placeholder period for the disabled ping timer; the branch never polls it.
const IDLE_PERIOD: Duration = Duration::from_secs(3600);

/// Writes application text, control frames and keepalive pings to the WebSocket.
///
/// Control frames (pongs queued by the read pump) go out alongside text in
/// arrival order. With a `ping_period` a ping is written every period,
/// starting one period after the pump starts. A failed write is reported as
/// [`LinkEvent::Error`] and cancels the link. A close frame is sent on the
/// way out, whatever ended the loop.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut text_rx: mpsc::Receiver<String>,
    mut control_rx: mpsc::Receiver<tungstenite::Message>,
    events_tx: mpsc::Sender<LinkEvent>,
    ping_period: Option<Duration>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let period = ping_period
        .filter(|p| !p.is_zero())
        .unwrap_or(IDLE_PERIOD);
    let mut pings = tokio::time::interval_at(Instant::now() + period, period);
    pings.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let keepalive = ping_period.is_some_and(|p| !p.is_zero());

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = pings.tick(), if keepalive => {
                trace!("sending keepalive ping");
                tungstenite::Message::Ping(Vec::new().into())
            }
            ctrl = control_rx.recv() => match ctrl {
                Some(m) => m,
                None => break,
            },
            text = text_rx.recv() => match text {
                Some(t) => {
                    trace!(bytes = t.len(), "sending text frame");
                    tungstenite::Message::Text(t.into())
                }
                None => break,
            },
        };
        if let Err(e) = write.send(msg).await {
            warn!("WebSocket write error: {e}");
            let _ = events_tx.send(LinkEvent::Error(e.to_string())).await;
            cancel.cancel();
            break;
        }
    }

    let _ = write.send(tungstenite::Message::Close(None)).await;
}
