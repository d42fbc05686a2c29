//! # Kira
//!
//! A transparent relay between a game client and an upstream game server.
//!
//! Every message crossing the relay passes through a set of interception
//! rules that can observe, rewrite, or consume it. Chat lines starting with
//! `.` are turned into commands run against the player's own session:
//! teleports, status effects, a proximity radar, forced time of day and
//! more.
//!
//! ```text
//! client ⇄ Endpoint ⇄ [rules + commands + session state] ⇄ Endpoint ⇄ server
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kira::prelude::*;
//!
//! # async fn start() -> Result<(), KiraError> {
//! let config = ProxyConfig::load_or_create("config.toml")?;
//! ProxyServer::builder().config(&config).build().await?.run().await
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod endpoint;
mod error;
pub mod lifecycle;
pub mod net;
pub mod relay;
pub mod reply;
pub mod rules;
mod server;
pub mod teleport;

pub use endpoint::{CodecEndpoint, Endpoint};
pub use error::KiraError;
pub use server::{ProxyServer, ProxyServerBuilder, serve};

/// Common imports for running and embedding the relay.
pub mod prelude {
    pub use crate::config::{ConfigError, ConnectionConfig, ProxyConfig, RelayConfig};
    pub use crate::endpoint::{CodecEndpoint, Endpoint};
    pub use crate::lifecycle::Lifecycle;
    pub use crate::net::{Acceptor, SessionFactory, WsAcceptor, WsEndpoint, WsSessionFactory};
    pub use crate::relay::RelaySession;
    pub use crate::{KiraError, ProxyServer, ProxyServerBuilder, serve};

    pub use kira_protocol::{GameData, JsonCodec, Login, Message};
    pub use kira_session::{LocalPlayer, SessionPhase, SessionState};
    pub use kira_transport::{Connection, ConnectionId, Transport};
}
