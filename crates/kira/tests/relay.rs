//! Relay sessions driven over in-memory endpoints.
//!
//! Each test plays both the game client and the upstream server against a
//! running `RelaySession`.

use std::sync::Arc;
use std::time::Duration;

use kira::config::RelayConfig;
use kira::prelude::*;
use kira::reply;
use kira_protocol::{
    Attribute, Effect, EntityRuntimeId, EntityUniqueId, GameMode, HEALTH_ATTRIBUTE, MobEffect,
    MovePlayer, PlayerList, PlayerListAction, PlayerListEntry, SetTime, Text, UpdateAttributes,
    Vec3,
};
use kira_transport::memory::{self, MemoryConnection};
use tokio::task::JoinHandle;

type Peer = CodecEndpoint<MemoryConnection, JsonCodec>;

const LOCAL: EntityRuntimeId = EntityRuntimeId(1);

// =========================================================================
// Harness
// =========================================================================

struct Harness {
    /// Plays the game client.
    client: Peer,
    /// Plays the upstream server.
    server: Peer,
    state: Arc<SessionState>,
    lifecycle: Arc<Lifecycle>,
    task: JoinHandle<()>,
}

fn local_player() -> LocalPlayer {
    LocalPlayer {
        display_name: "Me".into(),
        xuid: "100".into(),
        entity_unique_id: EntityUniqueId(1),
        entity_runtime_id: LOCAL,
        position: Vec3::ZERO,
    }
}

fn start() -> Harness {
    let (client, client_leg) = memory::pair();
    let (server, server_leg) = memory::pair();
    let lifecycle = Arc::new(Lifecycle::new());
    lifecycle.advance(SessionPhase::Ready);

    let session = RelaySession::new(
        Arc::new(CodecEndpoint::new(client_leg, JsonCodec)),
        Arc::new(CodecEndpoint::new(server_leg, JsonCodec)),
        local_player(),
        Arc::clone(&lifecycle),
        &RelayConfig::default(),
    );
    let state = session.state();
    let task = tokio::spawn(session.run());

    Harness {
        client: CodecEndpoint::new(client, JsonCodec),
        server: CodecEndpoint::new(server, JsonCodec),
        state,
        lifecycle,
        task,
    }
}

async fn recv(peer: &Peer) -> Message {
    tokio::time::timeout(Duration::from_secs(5), peer.read_message())
        .await
        .expect("timed out waiting for a message")
        .expect("read failed")
}

/// Reads the next relay chat line shown to the player.
async fn recv_reply(peer: &Peer) -> String {
    let message = recv(peer).await;
    reply::body(&message)
        .unwrap_or_else(|| panic!("expected a relay line, got {message:?}"))
        .to_string()
}

fn chat(text: &str) -> Message {
    Message::Text(Text::chat(text, "100"))
}

fn move_to(entity: u64, x: f32) -> Message {
    Message::MovePlayer(MovePlayer::to(EntityRuntimeId(entity), Vec3::new(x, 0.0, 0.0)))
}

async fn finish(harness: Harness) {
    tokio::time::timeout(Duration::from_secs(5), harness.task)
        .await
        .expect("session did not finish")
        .unwrap();
    assert_eq!(harness.lifecycle.phase(), SessionPhase::Closed);
}

// =========================================================================
// Forwarding
// =========================================================================

#[tokio::test]
async fn test_client_messages_reach_server_in_order() {
    let h = start();
    h.client.write_message(&chat("one")).await.unwrap();
    h.client
        .write_message(&Message::Opaque { id: 7, payload: vec![1] })
        .await
        .unwrap();
    h.client.write_message(&chat("two")).await.unwrap();

    assert_eq!(recv(&h.server).await, chat("§fone"));
    assert_eq!(recv(&h.server).await, Message::Opaque { id: 7, payload: vec![1] });
    assert_eq!(recv(&h.server).await, chat("§ftwo"));
    assert_eq!(h.lifecycle.phase(), SessionPhase::Relaying);
}

#[tokio::test]
async fn test_server_messages_reach_client_in_order() {
    let h = start();
    for time in [100, 200, 300] {
        h.server
            .write_message(&Message::SetTime(SetTime { time }))
            .await
            .unwrap();
    }
    for time in [100, 200, 300] {
        assert_eq!(recv(&h.client).await, Message::SetTime(SetTime { time }));
    }
}

#[tokio::test]
async fn test_command_is_not_forwarded() {
    let h = start();
    h.client.write_message(&chat(".pos")).await.unwrap();
    assert_eq!(recv_reply(&h.client).await, "Coordinates: 0.0 0.0 0.0");

    h.client.write_message(&chat("after")).await.unwrap();
    assert_eq!(recv(&h.server).await, chat("§fafter"), ".pos must not reach the server");
}

#[tokio::test]
async fn test_unknown_command_only_replies() {
    let h = start();
    let before = h.state.modes().await;

    h.client.write_message(&chat(".frobnicate")).await.unwrap();
    assert_eq!(recv_reply(&h.client).await, "§cUnknown command. Use .help");
    assert_eq!(h.state.modes().await, before);

    h.client.write_message(&chat("next")).await.unwrap();
    assert_eq!(recv(&h.server).await, chat("§fnext"));
}

#[tokio::test]
async fn test_chat_command_goes_upstream_unprefixed() {
    let h = start();
    h.client.write_message(&chat(".chat hello world")).await.unwrap();
    assert_eq!(recv(&h.server).await, chat("hello world"));
    assert_eq!(recv_reply(&h.client).await, "Message sent");
}

// =========================================================================
// Commands with effects
// =========================================================================

#[tokio::test]
async fn test_speed_amplifier_and_off() {
    let h = start();
    h.client.write_message(&chat(".speed 0.5")).await.unwrap();
    assert_eq!(
        recv(&h.client).await,
        Message::MobEffect(MobEffect::add(LOCAL, Effect::Speed, 0, 999_999))
    );
    assert_eq!(recv_reply(&h.client).await, "Speed set to: 0.5");

    h.client.write_message(&chat(".speed off")).await.unwrap();
    assert_eq!(
        recv(&h.client).await,
        Message::MobEffect(MobEffect::remove(LOCAL, Effect::Speed))
    );
    assert_eq!(recv_reply(&h.client).await, "Speed disabled");
}

#[tokio::test]
async fn test_invalid_arguments_change_nothing() {
    let h = start();
    h.client.write_message(&chat(".speed 42")).await.unwrap();
    assert_eq!(recv_reply(&h.client).await, "§cSpeed must be 0.1-10 or 'off'");
    h.client.write_message(&chat(".radar sideways")).await.unwrap();
    assert_eq!(recv_reply(&h.client).await, "§cUsage: .radar <on/off>");
    assert!(!h.state.modes().await.radar);
}

#[tokio::test]
async fn test_game_mode_and_visibility() {
    let h = start();
    h.client.write_message(&chat(".gm 1")).await.unwrap();
    assert_eq!(
        recv(&h.client).await,
        Message::SetPlayerGameType { game_type: GameMode::Creative }
    );
    assert_eq!(recv_reply(&h.client).await, "Game mode set to: creative");

    h.client.write_message(&chat(".hide on")).await.unwrap();
    assert_eq!(
        recv(&h.client).await,
        Message::MobEffect(MobEffect::add(LOCAL, Effect::Invisibility, 1, 999_999))
    );
    assert_eq!(recv_reply(&h.client).await, "You are now invisible");

    h.client.write_message(&chat(".nv off")).await.unwrap();
    assert_eq!(
        recv(&h.client).await,
        Message::MobEffect(MobEffect::remove(LOCAL, Effect::NightVision))
    );
    assert_eq!(recv_reply(&h.client).await, "Night vision: off");
}

#[tokio::test]
async fn test_forced_time() {
    let h = start();
    h.client.write_message(&chat(".setd day")).await.unwrap();
    assert_eq!(recv(&h.client).await, Message::SetTime(SetTime { time: 6000 }));
    assert_eq!(recv_reply(&h.client).await, "Time set to: day");

    h.server
        .write_message(&Message::SetTime(SetTime { time: 13000 }))
        .await
        .unwrap();
    assert_eq!(recv(&h.client).await, Message::SetTime(SetTime { time: 6000 }));
}

#[tokio::test(start_paused = true)]
async fn test_teleport_steps_then_lands_exactly() {
    let h = start();
    h.client.write_message(&chat(".tp 10 0 0")).await.unwrap();

    let mut moves = Vec::new();
    for _ in 0..21 {
        match recv(&h.client).await {
            Message::MovePlayer(movement) => {
                assert_eq!(movement.entity_runtime_id, LOCAL);
                moves.push(movement.position);
            }
            other => panic!("expected a move, got {other:?}"),
        }
    }
    assert_eq!(moves[0], Vec3::new(0.5, 0.0, 0.0));
    assert_eq!(moves[20], Vec3::new(10.0, 0.0, 0.0));
    assert_eq!(recv_reply(&h.client).await, "Teleported to 10.0 0.0 0.0");
    assert_eq!(h.state.local_position().await, Vec3::new(10.0, 0.0, 0.0));
}

#[tokio::test(start_paused = true)]
async fn test_lag_delays_following_messages() {
    let h = start();
    let started = tokio::time::Instant::now();
    h.client.write_message(&chat(".lag 3")).await.unwrap();
    h.client.write_message(&chat("late")).await.unwrap();

    assert_eq!(recv_reply(&h.client).await, "Delay: 3 sec");
    assert_eq!(recv(&h.server).await, chat("§flate"));
    assert!(started.elapsed() >= Duration::from_secs(3));
}

// =========================================================================
// Rules
// =========================================================================

async fn announce_alex(h: &Harness) {
    h.server
        .write_message(&Message::PlayerList(PlayerList {
            action: PlayerListAction::Add,
            entries: vec![PlayerListEntry {
                username: "Alex".into(),
                entity_unique_id: EntityUniqueId(7),
                xuid: String::new(),
            }],
        }))
        .await
        .unwrap();
    assert!(matches!(recv(&h.client).await, Message::PlayerList(_)));
}

#[tokio::test]
async fn test_radar_alerts_precede_movement() {
    let h = start();
    announce_alex(&h).await;
    h.client.write_message(&chat(".radar on")).await.unwrap();
    assert_eq!(recv_reply(&h.client).await, "Radar: on");

    h.server.write_message(&move_to(7, 75.0)).await.unwrap();
    assert_eq!(recv_reply(&h.client).await, "Player \"Alex\" detected at 75.0 blocks");
    assert_eq!(recv(&h.client).await, move_to(7, 75.0));
}

#[tokio::test]
async fn test_radar_off_forgets_alerted_distances() {
    let h = start();
    announce_alex(&h).await;
    h.client.write_message(&chat(".radar on")).await.unwrap();
    recv_reply(&h.client).await;
    h.server.write_message(&move_to(7, 75.0)).await.unwrap();
    recv_reply(&h.client).await;
    recv(&h.client).await;

    h.client.write_message(&chat(".radar off")).await.unwrap();
    assert_eq!(recv_reply(&h.client).await, "Radar: off");
    assert_eq!(h.state.proximity_entries().await, 0);
    h.client.write_message(&chat(".radar on")).await.unwrap();
    recv_reply(&h.client).await;

    h.server.write_message(&move_to(7, 60.0)).await.unwrap();
    assert_eq!(recv_reply(&h.client).await, "Player \"Alex\" detected at 60.0 blocks");
}

#[tokio::test]
async fn test_low_health_effects() {
    let h = start();
    h.client.write_message(&chat(".xp on")).await.unwrap();
    assert_eq!(recv_reply(&h.client).await, "XP mode: on");

    let update = Message::UpdateAttributes(UpdateAttributes {
        entity_runtime_id: LOCAL,
        attributes: vec![Attribute {
            name: HEALTH_ATTRIBUTE.into(),
            value: 3.0,
            min: 0.0,
            max: 20.0,
        }],
    });
    h.server.write_message(&update).await.unwrap();

    for effect in [Effect::Speed, Effect::Strength, Effect::Regeneration] {
        assert_eq!(
            recv(&h.client).await,
            Message::MobEffect(MobEffect::add(LOCAL, effect, 1, 600))
        );
    }
    assert!(recv_reply(&h.client).await.starts_with("Low health!"));
    assert_eq!(recv(&h.client).await, update);
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test]
async fn test_kick_disconnects_with_message() {
    let h = start();
    h.client.write_message(&chat(".kick see you")).await.unwrap();
    assert_eq!(
        recv(&h.client).await,
        Message::Disconnect { message: "see you".into() }
    );
    assert!(h.client.read_message().await.is_err());
    assert!(h.server.read_message().await.is_err());
    assert_eq!(h.lifecycle.reason(), Some("see you"));
    finish(h).await;
}

#[tokio::test]
async fn test_server_close_tears_down_both_legs() {
    let h = start();
    h.server.close().await.unwrap();
    assert_eq!(
        recv(&h.client).await,
        Message::Disconnect { message: "Connection lost".into() }
    );
    assert!(h.client.read_message().await.is_err());
    finish(h).await;
}

#[tokio::test]
async fn test_server_disconnect_reason_reaches_client_once() {
    let h = start();
    h.server
        .write_message(&Message::Disconnect { message: "Server restarting".into() })
        .await
        .unwrap();
    assert_eq!(
        recv(&h.client).await,
        Message::Disconnect { message: "Server restarting".into() }
    );
    assert!(h.client.read_message().await.is_err());
    finish(h).await;
}

#[tokio::test]
async fn test_client_close_tears_down_server_leg() {
    let h = start();
    h.client.close().await.unwrap();
    assert!(h.server.read_message().await.is_err());
    finish(h).await;
}

#[tokio::test(start_paused = true)]
async fn test_teardown_interrupts_lag() {
    let h = start();
    h.client.write_message(&chat(".lag 100")).await.unwrap();
    h.server.close().await.unwrap();

    assert_eq!(
        recv(&h.client).await,
        Message::Disconnect { message: "Connection lost".into() }
    );
    assert!(h.client.read_message().await.is_err());
    finish(h).await;
}

#[tokio::test(start_paused = true)]
async fn test_teardown_stops_teleport_midway() {
    let h = start();
    h.client.write_message(&chat(".tp 100 0 0")).await.unwrap();
    for _ in 0..3 {
        assert!(matches!(recv(&h.client).await, Message::MovePlayer(_)));
    }
    h.server.close().await.unwrap();

    // Steps already in flight may still land, but the farewell ends it.
    let mut last = None;
    loop {
        match recv(&h.client).await {
            Message::MovePlayer(movement) => last = Some(movement.position),
            Message::Disconnect { message } => {
                assert_eq!(message, "Connection lost");
                break;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_ne!(last, Some(Vec3::new(100.0, 0.0, 0.0)));
    assert!(h.client.read_message().await.is_err(), "no moves after disconnect");
    assert_eq!(h.state.local_position().await, Vec3::ZERO);
    finish(h).await;
}

#[tokio::test]
async fn test_nothing_forwarded_after_teardown() {
    let h = start();
    h.lifecycle.teardown("operator stop");
    assert_eq!(
        recv(&h.client).await,
        Message::Disconnect { message: "operator stop".into() }
    );

    // Writes into a torn-down session go nowhere.
    let _ = h.client.write_message(&chat("too late")).await;
    assert!(h.server.read_message().await.is_err());
    finish(h).await;
}
