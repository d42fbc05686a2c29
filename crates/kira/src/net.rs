//! How sessions get their two endpoints.
//!
//! [`Acceptor`] yields client endpoints. [`SessionFactory`] drives the
//! per-session handshake on both legs: reading the client's login, dialing
//! upstream, starting the game on the client and finishing spawn on the
//! server. The relay engine only ever talks to these traits, so tests can
//! drive sessions over in-memory endpoints.
//!
//! The WebSocket implementations speak one JSON [`Message`] per binary
//! frame:
//!
//! ```text
//! client            relay                     server
//!   │── Login ───────▶│                          │
//!   │                 │── Login ────────────────▶│
//!   │                 │◀──────────── StartGame ──│
//!   │◀── StartGame ───│── RequestChunkRadius ───▶│   (concurrently)
//!   │                 │◀─ PlayStatus(PlayerSpawn)│
//!   │◀═══════════════ relay loops ══════════════▶│
//! ```

use std::future::Future;
use std::net::SocketAddr;

use kira_protocol::{GameData, JsonCodec, Login, Message, PlayStatus, ProtocolError};
use kira_transport::{Incoming, PendingWebSocket, Transport, WebSocketConnection, WebSocketTransport};
use tracing::{debug, trace};

use crate::endpoint::{CodecEndpoint, Endpoint};
use crate::KiraError;

/// A WebSocket connection speaking JSON messages.
pub type WsEndpoint = CodecEndpoint<WebSocketConnection, JsonCodec>;

/// Produces client endpoints.
///
/// Accepting is two-step so the accept loop never waits on a peer's
/// handshake: [`accept`](Self::accept) returns as soon as a peer arrives
/// and [`establish`](Self::establish) runs on that peer's own task.
pub trait Acceptor: Send + 'static {
    type Client: Endpoint;
    /// A peer that still has to complete its transport handshake.
    type Incoming: Send + 'static;

    /// Waits for the next peer. An error affects that peer only.
    fn accept(&mut self) -> impl Future<Output = Result<Self::Incoming, KiraError>> + Send;

    /// Turns an accepted peer into a client endpoint.
    fn establish(
        incoming: Self::Incoming,
    ) -> impl Future<Output = Result<Self::Client, KiraError>> + Send;
}

/// Performs the handshake on both legs of one session.
pub trait SessionFactory: Send + Sync + 'static {
    type Client: Endpoint;
    type Server: Endpoint;

    /// Reads the client's identity.
    fn login(&self, client: &Self::Client)
    -> impl Future<Output = Result<Login, KiraError>> + Send;

    /// Connects to `upstream` as `login` and returns the world to join.
    fn dial(
        &self,
        upstream: &str,
        login: &Login,
    ) -> impl Future<Output = Result<(Self::Server, GameData), KiraError>> + Send;

    /// Sends the upstream world to the client.
    fn start_game(
        &self,
        client: &Self::Client,
        game: &GameData,
    ) -> impl Future<Output = Result<(), KiraError>> + Send;

    /// Completes the spawn sequence with the server.
    fn spawn(&self, server: &Self::Server) -> impl Future<Output = Result<(), KiraError>> + Send;
}

/// Accepts game clients over WebSocket.
pub struct WsAcceptor {
    transport: WebSocketTransport,
}

impl WsAcceptor {
    pub async fn bind(addr: &str) -> Result<Self, KiraError> {
        Ok(Self {
            transport: WebSocketTransport::bind(addr).await?,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }
}

impl Acceptor for WsAcceptor {
    type Client = WsEndpoint;
    type Incoming = PendingWebSocket;

    async fn accept(&mut self) -> Result<PendingWebSocket, KiraError> {
        Ok(self.transport.accept().await?)
    }

    async fn establish(incoming: PendingWebSocket) -> Result<WsEndpoint, KiraError> {
        let conn = incoming.establish().await?;
        Ok(CodecEndpoint::new(conn, JsonCodec))
    }
}

/// Handshakes sessions whose both legs are WebSocket.
#[derive(Debug, Clone)]
pub struct WsSessionFactory {
    /// View distance requested from the server during spawn.
    pub chunk_radius: i32,
}

impl Default for WsSessionFactory {
    fn default() -> Self {
        Self { chunk_radius: 16 }
    }
}

impl SessionFactory for WsSessionFactory {
    type Client = WsEndpoint;
    type Server = WsEndpoint;

    async fn login(&self, client: &WsEndpoint) -> Result<Login, KiraError> {
        match client.read_message().await? {
            Message::Login(login) => Ok(login),
            other => Err(ProtocolError::Unexpected {
                expected: "Login",
                got: other.name(),
            }
            .into()),
        }
    }

    async fn dial(&self, upstream: &str, login: &Login) -> Result<(WsEndpoint, GameData), KiraError> {
        let server = CodecEndpoint::new(WebSocketConnection::connect(upstream).await?, JsonCodec);
        server.write_message(&Message::Login(login.clone())).await?;

        loop {
            match server.read_message().await? {
                Message::StartGame(game) => return Ok((server, game)),
                Message::PlayStatus {
                    status: PlayStatus::LoginSuccess,
                } => debug!(upstream, "upstream accepted login"),
                Message::PlayStatus {
                    status: PlayStatus::LoginFailed,
                } => return Err(KiraError::Handshake("upstream rejected login".into())),
                Message::Disconnect { message } => return Err(KiraError::Handshake(message)),
                other => trace!(kind = other.name(), "skipping message before StartGame"),
            }
        }
    }

    async fn start_game(&self, client: &WsEndpoint, game: &GameData) -> Result<(), KiraError> {
        client.write_message(&Message::StartGame(game.clone())).await
    }

    async fn spawn(&self, server: &WsEndpoint) -> Result<(), KiraError> {
        server
            .write_message(&Message::RequestChunkRadius {
                radius: self.chunk_radius,
            })
            .await?;

        loop {
            match server.read_message().await? {
                Message::PlayStatus {
                    status: PlayStatus::PlayerSpawn,
                } => return Ok(()),
                Message::Disconnect { message } => return Err(KiraError::Handshake(message)),
                other => trace!(kind = other.name(), "skipping message before spawn"),
            }
        }
    }
}
