//! Cloud Link
//!
//! Client role for the outbound authenticated session. The credential rides
//! the WebSocket upgrade as a bearer token; after the handshake the bridge
//! announces itself with a one-time `engine_ready` and keeps a heartbeat
//! running for as long as the session lives.
//!
//! There is no reconnection or backoff: a connect failure is fatal to the
//! process, and a mid-run disconnect leaves the bridge inert toward the
//! cloud until restarted.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::protocol::{CloudFrame, EVENT_HEARTBEAT, EVENT_READY};

/// Error types for cloud session operations
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session closed")]
    Disconnected,
}

/// Cheap handle for emitting named events on the session. Cloneable so the
/// relay and the heartbeat hold it independently of the link.
#[derive(Clone)]
pub struct CloudSender {
    outbound: mpsc::UnboundedSender<Message>,
}

impl CloudSender {
    /// Send a named event, fire-and-forget. Fails only once the session
    /// has closed.
    pub fn emit<T: Serialize>(&self, event: &str, data: &T) -> Result<(), CloudError> {
        let frame = CloudFrame {
            event: event.to_string(),
            data: serde_json::to_value(data)?,
        };
        let text = serde_json::to_string(&frame)?;
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| CloudError::Disconnected)
    }
}

/// The authenticated session to the cloud service. One instance per
/// process lifetime.
pub struct CloudLink {
    events: mpsc::UnboundedReceiver<CloudFrame>,
    outbound: CloudSender,
}

impl CloudLink {
    /// Open the session: WebSocket handshake with the credential as a
    /// bearer token, one-time ready signal, heartbeat on `interval`.
    ///
    /// Failure here is fatal for the process: there is no retry.
    pub async fn connect(
        url: &str,
        credential: &str,
        interval: Duration,
    ) -> Result<Self, CloudError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| CloudError::InvalidEndpoint(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|e| CloudError::InvalidEndpoint(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| CloudError::ConnectionFailed(e.to_string()))?;
        info!("Connected to cloud: {}", url);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_session(ws, outbound_rx, event_tx));

        let outbound = CloudSender {
            outbound: outbound_tx,
        };

        // One-time ready signal; the cloud's ready_ack is logged by the
        // relay when it arrives, nothing blocks on it.
        outbound.emit(EVENT_READY, &())?;
        debug!("Ready signal sent");

        spawn_heartbeat(outbound.clone(), interval);

        Ok(Self {
            events: event_rx,
            outbound,
        })
    }

    /// Handle for the emitting side of the session.
    pub fn handle(&self) -> CloudSender {
        self.outbound.clone()
    }

    /// Next event pushed by the cloud side. `None` is the terminal
    /// disconnect signal.
    pub async fn recv(&mut self) -> Option<CloudFrame> {
        self.events.recv().await
    }
}

/// Emit a liveness event on a fixed cadence until the session closes. The
/// failed emit after close ends the loop, so no timer outlives the
/// session by more than one interval.
fn spawn_heartbeat(sender: CloudSender, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if sender.emit(EVENT_HEARTBEAT, &()).is_err() {
                debug!("Heartbeat stopped: session closed");
                break;
            }
        }
    });
}

async fn run_session(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<CloudFrame>,
) {
    let (mut sink, mut stream) = ws.split();

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<CloudFrame>(&text) {
                Ok(event) => {
                    let _ = events.send(event);
                }
                Err(e) => debug!("Ignoring unrecognized cloud frame: {}", e),
            },
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    writer.abort();
    warn!("Cloud session closed");
}
