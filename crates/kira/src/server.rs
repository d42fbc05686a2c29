//! `ProxyServer` builder and accept loop.
//!
//! This is the entry point for running the relay. It ties the layers
//! together: acceptor → session factory → relay session.

use std::sync::Arc;

use tokio::time;
use tracing::{debug, error, info};

use crate::config::{ConnectionConfig, ProxyConfig, RelayConfig};
use crate::net::{Acceptor, SessionFactory, WsAcceptor, WsEndpoint, WsSessionFactory};
use crate::relay::handle_connection;
use crate::{Endpoint, KiraError};

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<F> {
    pub(crate) factory: F,
    pub(crate) upstream: String,
    pub(crate) relay: RelayConfig,
}

/// Builder for configuring and starting the relay.
///
/// # Example
///
/// ```rust,no_run
/// # async fn start() -> Result<(), kira::KiraError> {
/// use kira::prelude::*;
///
/// let server = ProxyServer::builder()
///     .listen("0.0.0.0:19132")
///     .upstream("play.nethergames.org:19132")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProxyServerBuilder {
    listen: String,
    upstream: String,
    relay: RelayConfig,
}

impl ProxyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        let connection = ConnectionConfig::default();
        Self {
            listen: connection.local_address,
            upstream: connection.remote_address,
            relay: RelayConfig::default(),
        }
    }

    /// Takes every setting from a loaded configuration.
    pub fn config(mut self, config: &ProxyConfig) -> Self {
        self.listen = config.connection.local_address.clone();
        self.upstream = config.connection.remote_address.clone();
        self.relay = config.relay.clone();
        self
    }

    /// Sets the address clients connect to.
    pub fn listen(mut self, addr: &str) -> Self {
        self.listen = addr.to_string();
        self
    }

    /// Sets the upstream server address.
    pub fn upstream(mut self, addr: &str) -> Self {
        self.upstream = addr.to_string();
        self
    }

    /// Sets the per-session tuning.
    pub fn relay_config(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Binds the WebSocket listener.
    pub async fn build(self) -> Result<ProxyServer<WsAcceptor, WsSessionFactory>, KiraError> {
        let acceptor = WsAcceptor::bind(&self.listen).await?;
        Ok(self.build_with(acceptor, WsSessionFactory::default()))
    }

    /// Builds a server on a custom acceptor and session factory.
    pub fn build_with<A, F>(self, acceptor: A, factory: F) -> ProxyServer<A, F>
    where
        A: Acceptor,
        F: SessionFactory<Client = A::Client>,
    {
        ProxyServer {
            acceptor,
            state: Arc::new(ServerState {
                factory,
                upstream: self.upstream,
                relay: self.relay.validated(),
            }),
        }
    }
}

impl Default for ProxyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A relay accepting clients.
///
/// Call [`run()`](Self::run) to start relaying.
pub struct ProxyServer<A, F> {
    acceptor: A,
    state: Arc<ServerState<F>>,
}

impl ProxyServer<WsAcceptor, WsSessionFactory> {
    /// Creates a new builder.
    pub fn builder() -> ProxyServerBuilder {
        ProxyServerBuilder::new()
    }
}

impl<F> ProxyServer<WsAcceptor, F> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.acceptor.local_addr()
    }
}

impl<A, F> ProxyServer<A, F>
where
    A: Acceptor,
    F: SessionFactory<Client = A::Client>,
{
    pub fn upstream(&self) -> &str {
        &self.state.upstream
    }

    /// Runs the accept loop.
    ///
    /// Each accepted peer is upgraded and relayed on its own task, with the
    /// upgrade bounded by the dial timeout. Sessions are independent: a
    /// failing session is logged and never affects the others. Runs until
    /// the process is terminated.
    pub async fn run(mut self) -> Result<(), KiraError> {
        info!(upstream = %self.state.upstream, "relay running");

        loop {
            match self.acceptor.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let limit = state.relay.dial_timeout();
                        let client = match time::timeout(limit, A::establish(incoming)).await {
                            Ok(Ok(client)) => client,
                            Ok(Err(e)) => {
                                debug!(error = %e, "client handshake failed");
                                return;
                            }
                            Err(_) => {
                                debug!(?limit, "client handshake timed out");
                                return;
                            }
                        };
                        let conn_id = client.id();
                        if let Err(e) = handle_connection(client, state).await {
                            debug!(%conn_id, error = %e, "session ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Listens on `listen` and relays every client to `upstream` with default
/// tuning.
pub async fn serve<F>(listen: &str, upstream: &str, factory: F) -> Result<(), KiraError>
where
    F: SessionFactory<Client = WsEndpoint>,
{
    let acceptor = WsAcceptor::bind(listen).await?;
    ProxyServerBuilder::new()
        .upstream(upstream)
        .build_with(acceptor, factory)
        .run()
        .await
}
