//! In-process connection pair.
//!
//! [`pair`] returns two [`MemoryConnection`]s wired back to back: whatever
//! one side sends, the other receives. Closing either side ends the stream
//! for both, the same way a socket close would.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{Connection, ConnectionId, TransportError};

/// Memory connections get their own ID range so they never collide with
/// socket-backed ones in logs.
static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1 << 48);

/// One end of an in-process connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: CancellationToken,
}

/// Creates two connected in-memory endpoints.
pub fn pair() -> (MemoryConnection, MemoryConnection) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (MemoryConnection::new(a_tx, b_rx), MemoryConnection::new(b_tx, a_rx))
}

impl MemoryConnection {
    fn new(tx: mpsc::UnboundedSender<Vec<u8>>, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            id: ConnectionId::new(NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed)),
            outbound: Mutex::new(Some(tx)),
            inbound: Mutex::new(rx),
            closed: CancellationToken::new(),
        }
    }

    /// Whether `close` has been called on this end.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let outbound = self.outbound.lock().await;
        let Some(tx) = outbound.as_ref() else {
            return Err(TransportError::ConnectionClosed(format!("{} is closed", self.id)));
        };
        tx.send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("peer hung up".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Ok(None),
            frame = inbound.recv() => Ok(frame),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.cancel();
        // Dropping the sender ends the peer's stream.
        self.outbound.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
