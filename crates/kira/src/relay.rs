//! Per-connection relay: handshake barrier, relay tasks, teardown.
//!
//! Each accepted client gets its own Tokio task running
//! [`handle_connection`]. The flow is:
//!   1. Read the client's login, dial upstream (bounded by a timeout)
//!   2. Barrier: start the game on the client and finish spawn on the
//!      server concurrently; both must succeed
//!   3. [`RelaySession::run`]: three relay tasks plus a supervisor
//!
//! ```text
//!            client-read ──▶ [hand-off queue] ──▶ queue-drain
//! client ◀──────────────────── server-read ◀───────────────── server
//!                         supervisor (teardown)
//! ```
//!
//! Any read or write failure on either leg tears the whole session down.
//! Teardown is driven by the session's [`Lifecycle`]; every await in a
//! relay task races against it, and no task forwards anything once it has
//! begun.

use std::sync::Arc;
use std::time::Duration;

use kira_protocol::Message;
use kira_session::{LocalPlayer, SessionPhase, SessionState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::commands::{self, CommandContext};
use crate::config::RelayConfig;
use crate::endpoint::Endpoint;
use crate::lifecycle::Lifecycle;
use crate::net::SessionFactory;
use crate::rules::{Direction, Interception, Interceptor, Verdict};
use crate::server::ServerState;
use crate::KiraError;

/// Disconnect text when a leg fails without saying why.
pub const CONNECTION_LOST: &str = "Connection lost";

/// How long the supervisor waits for the farewell disconnect to be written.
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Tears the session down when a relay task exits for any reason,
/// including a panic.
struct TeardownGuard(Arc<Lifecycle>);

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.0.teardown(CONNECTION_LOST);
    }
}

/// Handles a single client from accept to close.
pub(crate) async fn handle_connection<F: SessionFactory>(
    client: F::Client,
    shared: Arc<ServerState<F>>,
) -> Result<(), KiraError> {
    let conn_id = client.id();
    let lifecycle = Arc::new(Lifecycle::new());
    debug!(%conn_id, "handling new connection");

    let (server, local) = match establish(&client, &shared).await {
        Ok(established) => established,
        Err(e) => {
            let reason = e.disconnect_reason();
            lifecycle.teardown(reason);
            let farewell = Message::Disconnect {
                message: reason.to_string(),
            };
            let _ = time::timeout(DISCONNECT_GRACE, client.write_message(&farewell)).await;
            let _ = client.close().await;
            lifecycle.advance(SessionPhase::Closed);
            return Err(e);
        }
    };

    info!(%conn_id, player = %local.display_name, "session ready, relaying");
    lifecycle.advance(SessionPhase::Ready);

    RelaySession::new(
        Arc::new(client),
        Arc::new(server),
        local,
        lifecycle,
        &shared.relay,
    )
    .run()
    .await;
    Ok(())
}

/// Login, dial, then the two-sided barrier.
async fn establish<F: SessionFactory>(
    client: &F::Client,
    shared: &ServerState<F>,
) -> Result<(F::Server, LocalPlayer), KiraError> {
    let factory = &shared.factory;
    let limit = shared.relay.dial_timeout();

    let login = time::timeout(limit, factory.login(client))
        .await
        .map_err(|_| KiraError::Timeout("client login"))??;
    debug!(player = %login.display_name, upstream = %shared.upstream, "dialing upstream");

    let dial_error = |reason: String| KiraError::Dial {
        addr: shared.upstream.clone(),
        reason,
    };
    let (server, game) = match time::timeout(limit, factory.dial(&shared.upstream, &login)).await {
        Ok(Ok(dialed)) => dialed,
        Ok(Err(e)) => return Err(dial_error(e.to_string())),
        Err(_) => return Err(dial_error(format!("timed out after {limit:?}"))),
    };

    let barrier = async {
        tokio::try_join!(
            factory.start_game(client, &game),
            factory.spawn(&server)
        )
    };
    let outcome = match time::timeout(limit, barrier).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(KiraError::Timeout("handshake")),
    };
    if let Err(e) = outcome {
        let _ = server.close().await;
        return Err(e);
    }

    Ok((server, LocalPlayer::from_handshake(&login, &game)))
}

/// One established session: both legs connected, handshake done.
pub struct RelaySession<C, S> {
    client: Arc<C>,
    server: Arc<S>,
    state: Arc<SessionState>,
    lifecycle: Arc<Lifecycle>,
    interceptor: Arc<Interceptor>,
    config: Arc<RelayConfig>,
}

impl<C: Endpoint, S: Endpoint> RelaySession<C, S> {
    pub fn new(
        client: Arc<C>,
        server: Arc<S>,
        local: LocalPlayer,
        lifecycle: Arc<Lifecycle>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            client,
            server,
            state: Arc::new(SessionState::new(local, config.proximity_policy())),
            lifecycle,
            interceptor: Arc::new(Interceptor::new(config)),
            config: Arc::new(config.clone()),
        }
    }

    pub fn state(&self) -> Arc<SessionState> {
        Arc::clone(&self.state)
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }

    /// Relays until teardown, then closes both legs. Returns once every
    /// task has exited and the session is `Closed`.
    pub async fn run(self) {
        let conn_id = self.client.id();
        let phase = self.lifecycle.phase();
        if !phase.is_live() {
            debug!(%conn_id, %phase, "session torn down before relaying");
        } else if !self.lifecycle.advance(SessionPhase::Relaying) {
            debug!(%conn_id, %phase, "session not ready to relay");
        }

        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity.max(1));

        let tasks: [JoinHandle<()>; 3] = [
            tokio::spawn(client_read_loop(
                Arc::clone(&self.client),
                queue_tx,
                Arc::clone(&self.state),
                Arc::clone(&self.lifecycle),
                Arc::clone(&self.interceptor),
                Arc::clone(&self.config),
            )),
            tokio::spawn(queue_drain_loop(
                queue_rx,
                Arc::clone(&self.server),
                Arc::clone(&self.lifecycle),
            )),
            tokio::spawn(server_read_loop(
                Arc::clone(&self.client),
                Arc::clone(&self.server),
                Arc::clone(&self.state),
                Arc::clone(&self.lifecycle),
                Arc::clone(&self.interceptor),
            )),
        ];

        self.supervise(tasks).await;
        info!(%conn_id, reason = self.lifecycle.reason().unwrap_or(CONNECTION_LOST), "session closed");
    }

    async fn supervise(&self, tasks: [JoinHandle<()>; 3]) {
        self.lifecycle.cancelled().await;

        let farewell = Message::Disconnect {
            message: self.lifecycle.reason().unwrap_or(CONNECTION_LOST).to_string(),
        };
        if let Ok(Err(e)) = time::timeout(DISCONNECT_GRACE, self.client.write_message(&farewell)).await {
            debug!(error = %e, "client gone before disconnect");
        }

        if let Err(e) = self.client.close().await {
            debug!(error = %e, "closing client failed");
        }
        if let Err(e) = self.server.close().await {
            debug!(error = %e, "closing server failed");
        }

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "relay task panicked");
            }
        }
        self.lifecycle.advance(SessionPhase::Closed);
    }
}

/// Writes one message on a relay leg, racing teardown. Returns `false`
/// once the caller should stop.
async fn relay_to<E: Endpoint>(endpoint: &E, message: &Message, lifecycle: &Lifecycle) -> bool {
    match lifecycle.until_teardown(endpoint.write_message(message)).await {
        Ok(()) => true,
        Err(KiraError::Cancelled) => false,
        Err(e) => {
            warn!(conn_id = %endpoint.id(), error = %e, "write failed");
            lifecycle.teardown(CONNECTION_LOST);
            false
        }
    }
}

/// Writes rule output to the client. Returns `false` if the session is
/// over and the caller should stop.
async fn deliver<C: Endpoint>(client: &C, messages: Vec<Message>, lifecycle: &Lifecycle) -> bool {
    for message in messages {
        if !relay_to(client, &message, lifecycle).await {
            return false;
        }
    }
    true
}

async fn client_read_loop<C: Endpoint>(
    client: Arc<C>,
    upstream: mpsc::Sender<Message>,
    state: Arc<SessionState>,
    lifecycle: Arc<Lifecycle>,
    interceptor: Arc<Interceptor>,
    config: Arc<RelayConfig>,
) {
    let _guard = TeardownGuard(Arc::clone(&lifecycle));

    loop {
        let read = tokio::select! {
            biased;
            _ = lifecycle.cancelled() => break,
            read = client.read_message() => read,
        };
        let message = match read {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "client read ended");
                lifecycle.teardown(CONNECTION_LOST);
                break;
            }
        };

        let Interception { verdict, to_client } = interceptor
            .intercept(Direction::ClientToServer, message, &state)
            .await;
        if !deliver(&*client, to_client, &lifecycle).await {
            break;
        }

        match verdict {
            Verdict::Forward(message) => {
                tokio::select! {
                    biased;
                    _ = lifecycle.cancelled() => break,
                    sent = upstream.send(message) => if sent.is_err() { break },
                }
            }
            Verdict::Command(line) => {
                let ctx = CommandContext {
                    client: &*client,
                    upstream: &upstream,
                    state: &state,
                    lifecycle: &lifecycle,
                    config: &config,
                };
                tokio::select! {
                    biased;
                    _ = lifecycle.cancelled() => break,
                    _ = commands::execute(&line, &ctx) => {}
                }
            }
        }
    }
}

async fn queue_drain_loop<S: Endpoint>(
    mut queue: mpsc::Receiver<Message>,
    server: Arc<S>,
    lifecycle: Arc<Lifecycle>,
) {
    let _guard = TeardownGuard(Arc::clone(&lifecycle));

    loop {
        let message = tokio::select! {
            biased;
            _ = lifecycle.cancelled() => break,
            next = queue.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };
        if !relay_to(&*server, &message, &lifecycle).await {
            break;
        }
    }
}

async fn server_read_loop<C: Endpoint, S: Endpoint>(
    client: Arc<C>,
    server: Arc<S>,
    state: Arc<SessionState>,
    lifecycle: Arc<Lifecycle>,
    interceptor: Arc<Interceptor>,
) {
    let _guard = TeardownGuard(Arc::clone(&lifecycle));

    loop {
        let read = tokio::select! {
            biased;
            _ = lifecycle.cancelled() => break,
            read = server.read_message() => read,
        };
        let message = match read {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "server read ended");
                lifecycle.teardown(CONNECTION_LOST);
                break;
            }
        };

        let Interception { verdict, to_client } = interceptor
            .intercept(Direction::ServerToClient, message, &state)
            .await;
        if !deliver(&*client, to_client, &lifecycle).await {
            break;
        }

        let message = match verdict {
            Verdict::Forward(Message::Disconnect { message }) => {
                info!(reason = %message, "server disconnected the session");
                lifecycle.teardown(message);
                break;
            }
            Verdict::Forward(message) => message,
            Verdict::Command(_) => continue,
        };
        if !relay_to(&*client, &message, &lifecycle).await {
            break;
        }
    }
}
