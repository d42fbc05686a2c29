//! Integration tests for the full relay over loopback WebSocket.
//!
//! A fake upstream server speaks the handshake, the relay sits in the
//! middle, and the test plays the game client.

use std::sync::Arc;
use std::time::Duration;

use kira::prelude::*;
use kira_protocol::{
    EntityRuntimeId, EntityUniqueId, GameMode, PlayStatus, SetTime, Text, Vec3,
};
use kira_transport::{Incoming, WebSocketConnection, WebSocketTransport, memory};
use tokio::sync::{mpsc, oneshot};

type WsPeer = CodecEndpoint<WebSocketConnection, JsonCodec>;

// =========================================================================
// Fake upstream
// =========================================================================

fn world() -> GameData {
    GameData {
        entity_unique_id: EntityUniqueId(42),
        entity_runtime_id: EntityRuntimeId(42),
        player_position: Vec3::new(0.0, 64.0, 0.0),
        game_mode: GameMode::Survival,
        world_name: "Bedrock level".into(),
        time: 0,
    }
}

/// Binds a fake upstream that completes the handshake for every client
/// and hands each endpoint (plus the login it saw) to the test.
async fn fake_upstream() -> (String, mpsc::UnboundedReceiver<(WsPeer, Login)>) {
    let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap().to_string();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok(incoming) = transport.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let peer = CodecEndpoint::new(incoming.establish().await.unwrap(), JsonCodec);

                let Message::Login(login) = peer.read_message().await.unwrap() else {
                    panic!("relay must forward Login first");
                };
                peer.write_message(&Message::PlayStatus { status: PlayStatus::LoginSuccess })
                    .await
                    .unwrap();
                peer.write_message(&Message::StartGame(world())).await.unwrap();

                let Message::RequestChunkRadius { .. } = peer.read_message().await.unwrap() else {
                    panic!("relay must request chunks during spawn");
                };
                peer.write_message(&Message::PlayStatus { status: PlayStatus::PlayerSpawn })
                    .await
                    .unwrap();
                let _ = tx.send((peer, login));
            });
        }
    });
    (addr, rx)
}

async fn upstream_session(rx: &mut mpsc::UnboundedReceiver<(WsPeer, Login)>) -> (WsPeer, Login) {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("upstream never saw the relay")
        .expect("upstream stopped")
}

async fn start_relay(upstream: &str) -> String {
    let server = ProxyServer::builder()
        .listen("127.0.0.1:0")
        .upstream(upstream)
        .build()
        .await
        .expect("relay should bind");
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(server.run());
    addr
}

async fn connect(relay: &str) -> WsPeer {
    CodecEndpoint::new(WebSocketConnection::connect(relay).await.unwrap(), JsonCodec)
}

async fn recv(peer: &WsPeer) -> Message {
    tokio::time::timeout(Duration::from_secs(5), peer.read_message())
        .await
        .expect("timed out waiting for a message")
        .expect("read failed")
}

fn login() -> Login {
    Login {
        display_name: "Steve".into(),
        xuid: "2535".into(),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_handshake_then_relay_both_ways() {
    let (upstream_addr, mut upstream) = fake_upstream().await;
    let relay = start_relay(&upstream_addr).await;

    let client = connect(&relay).await;
    client.write_message(&Message::Login(login())).await.unwrap();
    assert_eq!(recv(&client).await, Message::StartGame(world()));

    let (server, seen_login) = upstream_session(&mut upstream).await;
    assert_eq!(seen_login, login());

    client
        .write_message(&Message::Text(Text::chat("hello", "2535")))
        .await
        .unwrap();
    assert_eq!(
        recv(&server).await,
        Message::Text(Text::chat("§fhello", "2535"))
    );

    server
        .write_message(&Message::SetTime(SetTime { time: 1000 }))
        .await
        .unwrap();
    assert_eq!(recv(&client).await, Message::SetTime(SetTime { time: 1000 }));
}

#[tokio::test]
async fn test_spawn_position_seeds_local_player() {
    let (upstream_addr, mut upstream) = fake_upstream().await;
    let relay = start_relay(&upstream_addr).await;

    let client = connect(&relay).await;
    client.write_message(&Message::Login(login())).await.unwrap();
    recv(&client).await;
    let _server = upstream_session(&mut upstream).await;

    client
        .write_message(&Message::Text(Text::chat(".pos", "2535")))
        .await
        .unwrap();
    let Message::Text(text) = recv(&client).await else {
        panic!("expected a chat reply");
    };
    assert!(text.message.ends_with("Coordinates: 0.0 64.0 0.0"), "{}", text.message);
}

#[tokio::test]
async fn test_unreachable_upstream_disconnects_client() {
    // Bind then drop to get a port nothing listens on.
    let dead = {
        let transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        transport.local_addr().unwrap().to_string()
    };
    let relay = start_relay(&dead).await;

    let client = connect(&relay).await;
    client.write_message(&Message::Login(login())).await.unwrap();
    assert_eq!(
        recv(&client).await,
        Message::Disconnect { message: "Failed to connect to server".into() }
    );
}

#[tokio::test]
async fn test_client_must_log_in_first() {
    let (upstream_addr, _upstream) = fake_upstream().await;
    let relay = start_relay(&upstream_addr).await;

    let client = connect(&relay).await;
    client
        .write_message(&Message::Text(Text::chat("hi", "")))
        .await
        .unwrap();
    assert_eq!(
        recv(&client).await,
        Message::Disconnect { message: "Connection lost".into() }
    );
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (upstream_addr, mut upstream) = fake_upstream().await;
    let relay = start_relay(&upstream_addr).await;

    let first = connect(&relay).await;
    first.write_message(&Message::Login(login())).await.unwrap();
    recv(&first).await;
    let (first_server, _) = upstream_session(&mut upstream).await;

    let second = connect(&relay).await;
    second.write_message(&Message::Login(login())).await.unwrap();
    recv(&second).await;
    let (second_server, _) = upstream_session(&mut upstream).await;

    first
        .write_message(&Message::Text(Text::chat(".setd night", "2535")))
        .await
        .unwrap();
    assert_eq!(recv(&first).await, Message::SetTime(SetTime { time: 18000 }));
    recv(&first).await;

    // Forced time applies to the first session only.
    for server in [&first_server, &second_server] {
        server
            .write_message(&Message::SetTime(SetTime { time: 500 }))
            .await
            .unwrap();
    }
    assert_eq!(recv(&first).await, Message::SetTime(SetTime { time: 18000 }));
    assert_eq!(recv(&second).await, Message::SetTime(SetTime { time: 500 }));

    // Closing one session leaves the other relaying.
    first.close().await.unwrap();
    assert!(first_server.read_message().await.is_err());
    second_server
        .write_message(&Message::SetTime(SetTime { time: 700 }))
        .await
        .unwrap();
    assert_eq!(recv(&second).await, Message::SetTime(SetTime { time: 700 }));
}

#[tokio::test]
async fn test_silent_peer_does_not_block_other_clients() {
    let (upstream_addr, mut upstream) = fake_upstream().await;
    let relay = start_relay(&upstream_addr).await;

    // Opens a socket but never sends the WebSocket upgrade.
    let _silent = tokio::net::TcpStream::connect(&relay).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = tokio::time::timeout(Duration::from_secs(5), connect(&relay))
        .await
        .expect("relay must keep accepting");
    client.write_message(&Message::Login(login())).await.unwrap();
    assert_eq!(recv(&client).await, Message::StartGame(world()));
    upstream_session(&mut upstream).await;
}

#[tokio::test]
async fn test_teardown_completes_while_upstream_stalls() {
    // An upstream that completes the upgrade and then never reads.
    let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap().to_string();
    let (held_tx, held_rx) = oneshot::channel();
    tokio::spawn(async move {
        let incoming = transport.accept().await.unwrap();
        let _ = held_tx.send(incoming.establish().await.unwrap());
    });
    let server_leg = CodecEndpoint::new(WebSocketConnection::connect(&addr).await.unwrap(), JsonCodec);
    let _stalled = held_rx.await.unwrap();

    let (client, client_leg) = memory::pair();
    let client = CodecEndpoint::new(client, JsonCodec);
    let lifecycle = Arc::new(Lifecycle::new());
    lifecycle.advance(SessionPhase::Ready);
    let session = RelaySession::new(
        Arc::new(CodecEndpoint::new(client_leg, JsonCodec)),
        Arc::new(server_leg),
        LocalPlayer::from_handshake(&login(), &world()),
        Arc::clone(&lifecycle),
        &RelayConfig::default(),
    );
    let task = tokio::spawn(session.run());

    // Far more than the socket buffers hold, so the server leg blocks.
    let bulk = "x".repeat(64 * 1024);
    for _ in 0..400 {
        client
            .write_message(&Message::Text(Text::chat(bulk.as_str(), "2535")))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(lifecycle.phase(), SessionPhase::Relaying);

    client.close().await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("teardown must not wait on the stalled upstream")
        .unwrap();
    assert_eq!(lifecycle.phase(), SessionPhase::Closed);
}
