//! The peer transport port.
//!
//! Federation needs only a bidirectional, ordered frame stream per peer.
//! The production adapter (QUIC, WebSocket, whatever the deployment
//! chooses) lives outside this crate; tests and single-process
//! deployments use the in-memory pair below.

use crate::messages::Frame;
use crate::FederationError;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

/// A bidirectional frame stream to one peer.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send one frame.
    async fn send(&self, frame: Frame) -> Result<(), FederationError>;

    /// Receive the next frame. `None` means the peer closed the stream.
    async fn recv(&self) -> Result<Option<Frame>, FederationError>;
}

/// In-memory duplex transport.
pub struct MemoryTransport {
    tx: mpsc::Sender<Frame>,
    rx: Mutex<mpsc::Receiver<Frame>>,
}

/// Create a connected transport pair.
pub fn memory_pair() -> (MemoryTransport, MemoryTransport) {
    let (tx_a, rx_a) = mpsc::channel(64);
    let (tx_b, rx_b) = mpsc::channel(64);
    (
        MemoryTransport {
            tx: tx_a,
            rx: Mutex::new(rx_b),
        },
        MemoryTransport {
            tx: tx_b,
            rx: Mutex::new(rx_a),
        },
    )
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    async fn send(&self, frame: Frame) -> Result<(), FederationError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| FederationError::Transport("peer stream closed".to_string()))
    }

    async fn recv(&self) -> Result<Option<Frame>, FederationError> {
        Ok(self.rx.lock().await.recv().await)
    }
}
