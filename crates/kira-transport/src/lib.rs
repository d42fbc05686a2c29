//! Byte-level transport layer for the Kira relay.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the relay
//! uses to talk to both of its peers without caring how frames travel.
//! A relay sits on two connections at once (the game client and the
//! upstream server), so every connection must allow a read and a write
//! to be in flight at the same time.
//!
//! # Implementations
//!
//! - [`WebSocketTransport`] / [`WebSocketConnection`]: binary frames over
//!   WebSocket (`websocket` feature, on by default). Supports both the
//!   accepting side and dialing an upstream.
//! - [`memory::pair`]: an in-process connected pair, handy for embedding
//!   the relay or exercising it without sockets.

use std::fmt;
use std::future::Future;

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::MemoryConnection;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

/// Opaque identifier for a connection, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
///
/// Accepting is split in two: [`accept`](Transport::accept) only takes the
/// raw peer off the listener, and [`Incoming::establish`] runs the protocol
/// handshake. An accept loop can hand the handshake to a per-peer task so a
/// silent peer never holds up the peers behind it.
///
/// The returned futures are `Send` so the accept loop itself can be
/// spawned onto the runtime.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// A peer that has been accepted but not yet handshaken.
    type Incoming: Incoming<Connection = Self::Connection>;

    /// Waits for the next peer.
    fn accept(&mut self) -> impl Future<Output = Result<Self::Incoming, TransportError>> + Send;
}

/// An accepted peer whose handshake has not run yet.
pub trait Incoming: Send + 'static {
    type Connection: Connection;

    /// Completes the handshake and yields the connection.
    fn establish(self) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single connection that can send and receive whole frames.
///
/// `send` and `recv` take `&self` and must not block each other: the relay
/// keeps one task reading while other tasks write to the same connection.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the remote peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection. Closing twice is not an error.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
