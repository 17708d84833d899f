//! Engine Link
//!
//! Server role for the single local engine connection. The listener keeps
//! accepting; each accepted connection immediately receives the `START`
//! command and becomes the sole active connection, silently replacing any
//! prior one. There is no reconnection logic here: when the engine drops,
//! the slot is cleared and the link waits for the engine to come back on
//! its own initiative.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{EngineMessage, JobPacket, StartCommand};

/// Error types for engine link operations
#[derive(Debug, thiserror::Error)]
pub enum EngineLinkError {
    #[error("No engine connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// The currently active engine connection.
struct EngineConnection {
    id: Uuid,
    outbound: mpsc::UnboundedSender<Message>,
}

type ConnectionSlot = Arc<RwLock<Option<EngineConnection>>>;

/// Cheap handle for delivering packets to whichever engine connection is
/// active. Cloneable so the relay can hold it independently of the link.
#[derive(Clone)]
pub struct EngineSender {
    active: ConnectionSlot,
}

impl EngineSender {
    /// Deliver a job packet to the active connection.
    ///
    /// `NotConnected` is a warnable condition for the caller, not a fatal
    /// one: the dispatch is dropped and the process keeps serving.
    pub async fn send(&self, packet: &JobPacket) -> Result<(), EngineLinkError> {
        let guard = self.active.read().await;
        let conn = guard.as_ref().ok_or(EngineLinkError::NotConnected)?;

        let text = serde_json::to_string(packet)
            .map_err(|e| EngineLinkError::SendFailed(e.to_string()))?;
        conn.outbound
            .send(Message::Text(text))
            .map_err(|e| EngineLinkError::SendFailed(e.to_string()))
    }

    /// Is an engine connection currently active?
    pub async fn is_connected(&self) -> bool {
        self.active.read().await.is_some()
    }
}

/// WebSocket server owning the single inbound engine connection.
pub struct EngineLink {
    local_addr: SocketAddr,
    active: ConnectionSlot,
    inbound: mpsc::UnboundedReceiver<EngineMessage>,
}

impl EngineLink {
    /// Bind the listener and start accepting engine connections. Port 0
    /// binds an ephemeral port; the chosen address is queryable via
    /// [`EngineLink::local_addr`].
    pub async fn start(port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let local_addr = listener.local_addr()?;

        let active: ConnectionSlot = Arc::new(RwLock::new(None));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(accept_loop(listener, active.clone(), inbound_tx));
        info!("Engine server listening on ws://{}", local_addr);

        Ok(Self {
            local_addr,
            active,
            inbound: inbound_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for the sending side of the link.
    pub fn handle(&self) -> EngineSender {
        EngineSender {
            active: self.active.clone(),
        }
    }

    /// Next message from the active connection. Suspends across engine
    /// disconnects; messages arrive in per-connection order.
    pub async fn recv(&mut self) -> Option<EngineMessage> {
        self.inbound.recv().await
    }
}

async fn accept_loop(
    listener: TcpListener,
    active: ConnectionSlot,
    inbound: mpsc::UnboundedSender<EngineMessage>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Engine accept failed: {}", e);
                continue;
            }
        };

        let ws = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("Engine handshake failed from {}: {}", peer, e);
                continue;
            }
        };

        let id = Uuid::new_v4();
        info!("Engine connected: {} ({})", id, peer);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        // START is queued before the connection becomes eligible for job
        // packets, so it is always the first frame the engine sees.
        let start = serde_json::to_string(&StartCommand::new())
            .expect("START command serialization");
        if outbound_tx.send(Message::Text(start)).is_err() {
            continue;
        }

        {
            let mut slot = active.write().await;
            if let Some(prev) = slot.replace(EngineConnection {
                id,
                outbound: outbound_tx,
            }) {
                debug!("Engine connection {} replaced by {}", prev.id, id);
            }
        }

        tokio::spawn(run_connection(
            ws,
            id,
            outbound_rx,
            active.clone(),
            inbound.clone(),
        ));
    }
}

/// Pump one engine connection until it closes, then release the slot if
/// this connection still owns it.
async fn run_connection(
    ws: WebSocketStream<TcpStream>,
    id: Uuid,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    active: ConnectionSlot,
    inbound: mpsc::UnboundedSender<EngineMessage>,
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
            Ok(Message::Text(text)) => match serde_json::from_str::<EngineMessage>(&text) {
                Ok(msg) => {
                    let _ = inbound.send(msg);
                }
                Err(e) => debug!("Ignoring unrecognized engine frame: {}", e),
            },
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    writer.abort();

    let mut slot = active.write().await;
    if slot.as_ref().map(|conn| conn.id) == Some(id) {
        *slot = None;
        info!("Engine disconnected: {}", id);
    } else {
        debug!("Engine connection {} closed after replacement", id);
    }
}
