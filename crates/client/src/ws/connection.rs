//! Transport connection loop with bounded auto-reconnect.
//!
//! The loop never surfaces a transport failure to callers: failed
//! connects degrade into the reconnect sequence, exhausted retries park
//! the state at `Failed`, and a lost session re-enters the sequence
//! from attempt 1. Room membership is connection-scoped on the server,
//! so the user room is rejoined after every successful (re)connect.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_channel::mpsc::UnboundedReceiver;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite};

use ridelink_shared::{user_room, ClientEvent, TransportError};

use super::router::EventRouter;
use super::{ConnectionState, ReconnectConfig};

/// Outbound half of an established transport, carrying text frames.
pub type WsSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
/// Inbound half of an established transport.
pub type WsSource = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Transport factory. The production implementation dials a WebSocket;
/// tests substitute an in-memory transport.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<(WsSink, WsSource), TransportError>;
}

/// tokio-tungstenite connector used in production.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<(WsSink, WsSource), TransportError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (write, read) = ws_stream.split();

        let sink = write
            .with(|frame: String| {
                future::ready(Ok::<_, tungstenite::Error>(tungstenite::Message::Text(
                    frame.into(),
                )))
            })
            .sink_map_err(|e| TransportError::Io(e.to_string()));

        let source = read.filter_map(|item| {
            future::ready(match item {
                Ok(tungstenite::Message::Text(text)) => Some(Ok(text.to_string())),
                Ok(tungstenite::Message::Close(_)) => Some(Err(TransportError::Closed)),
                // Ping/pong is answered by tungstenite itself.
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::Io(e.to_string()))),
            })
        });

        Ok((Box::pin(sink), Box::pin(source)))
    }
}

enum SessionEnd {
    /// Caller-initiated teardown; do not reconnect.
    Shutdown,
    /// Transport-level loss; re-enter the reconnect sequence.
    Lost,
}

/// Run the connection management loop until shutdown or retries are
/// exhausted.
///
/// The outbound receiver is shared across reconnects (behind a mutex)
/// so the caller's sender stays valid when the socket is replaced.
pub(crate) async fn run_connection(
    connector: Arc<dyn Connector>,
    router: Arc<EventRouter>,
    config: ReconnectConfig,
    url: String,
    user_id: String,
    state: watch::Sender<ConnectionState>,
    receiver: Arc<tokio::sync::Mutex<UnboundedReceiver<String>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    'outer: loop {
        if *shutdown.borrow() {
            break;
        }

        if attempt == 0 {
            let _ = state.send(ConnectionState::Connecting);
        } else {
            let _ = state.send(ConnectionState::Reconnecting { attempt });
            let delay = config.delay_for_attempt(attempt);
            tracing::info!(attempt, ?delay, "reconnecting after delay");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break 'outer;
                    }
                }
            }
        }

        match connector.connect(&url).await {
            Ok((mut sink, mut source)) => {
                attempt = 0;
                tracing::info!(user = %user_id, "transport connected");

                // Room membership did not survive the socket replacement.
                let join = ClientEvent::JoinRoom(user_room(&user_id));
                match serde_json::to_string(&join) {
                    Ok(frame) => {
                        if let Err(e) = sink.send(frame).await {
                            tracing::warn!("failed to join user room: {e}");
                        }
                    }
                    Err(e) => tracing::error!("failed to encode join-room: {e}"),
                }

                let mut rx = receiver.lock().await;

                // Anything queued while we were down is stale; emit is
                // at-most-once, not store-and-forward. Drain before
                // announcing the connection so nothing emitted against
                // the live state is lost.
                let mut dropped = 0usize;
                while let Ok(Some(_)) = rx.try_next() {
                    dropped += 1;
                }
                if dropped > 0 {
                    tracing::warn!(dropped, "discarded frames queued while disconnected");
                }

                let _ = state.send(ConnectionState::Connected);

                let reason = loop {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break SessionEnd::Shutdown;
                            }
                        }
                        outbound = rx.next() => match outbound {
                            Some(frame) => {
                                if let Err(e) = sink.send(frame).await {
                                    tracing::warn!("send failed: {e}");
                                    break SessionEnd::Lost;
                                }
                            }
                            // Client dropped its sender; nothing left to serve.
                            None => break SessionEnd::Shutdown,
                        },
                        inbound = source.next() => match inbound {
                            Some(Ok(text)) => router.route_frame(&text),
                            Some(Err(e)) => {
                                tracing::warn!("transport error: {e}");
                                break SessionEnd::Lost;
                            }
                            None => {
                                tracing::info!("transport closed by server");
                                break SessionEnd::Lost;
                            }
                        },
                    }
                };
                drop(rx);

                let _ = state.send(ConnectionState::Disconnected);
                match reason {
                    SessionEnd::Shutdown => break 'outer,
                    SessionEnd::Lost => attempt = 1,
                }
            }
            Err(e) => {
                tracing::warn!(attempt, "connect failed: {e}");
                if attempt >= config.max_attempts {
                    let _ = state.send(ConnectionState::Failed {
                        reason: format!(
                            "max reconnect attempts ({}) exceeded",
                            config.max_attempts
                        ),
                    });
                    break 'outer;
                }
                attempt += 1;
            }
        }
    }

    tracing::debug!(user = %user_id, "connection loop stopped");
}
