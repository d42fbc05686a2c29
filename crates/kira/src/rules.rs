//! Per-message interception applied in both relay directions.
//!
//! Every relayed message passes through [`Interceptor::intercept`] exactly
//! once. Dispatch is a `match` over [`Message`]; anything not listed below
//! passes through untouched.
//!
//! | direction | message | rule |
//! |---|---|---|
//! | both | any | logged first when logging is on |
//! | server → client | `PlayerList` | entries recorded in the registry |
//! | server → client | `MovePlayer` | position tracking, radar alerts |
//! | server → client | `SetTime` | overwritten while time is forced |
//! | server → client | `UpdateAttributes` | low-health effects |
//! | client → server | `Text` (chat) | `.`-prefixed lines become commands, others get the chat prefix |
//! | client → server | `MovePlayer` | local position tracking |

use std::fmt;

use kira_protocol::{Effect, Message, MobEffect, Text};
use kira_session::{Modes, Movement, SessionState};
use tracing::info;

use crate::config::RelayConfig;
use crate::reply;

/// Target for packet logging, so it can be filtered on its own.
pub const PACKET_LOG_TARGET: &str = "kira::packets";

/// Marks chat text as a command.
pub const COMMAND_PREFIX: char = '.';

const LOW_HEALTH_EFFECTS: [Effect; 3] = [Effect::Speed, Effect::Strength, Effect::Regeneration];
const LOW_HEALTH_AMPLIFIER: i32 = 1;

/// Which way a message is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClientToServer => "client -> server",
            Self::ServerToClient => "server -> client",
        })
    }
}

/// What happens to the intercepted message itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Relay the (possibly rewritten) message.
    Forward(Message),
    /// Drop the message and run this command line instead.
    Command(String),
}

/// The outcome of intercepting one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Interception {
    pub verdict: Verdict,
    /// Messages to write to the client before the verdict is carried out.
    pub to_client: Vec<Message>,
}

impl Interception {
    fn forward(message: Message) -> Self {
        Self {
            verdict: Verdict::Forward(message),
            to_client: Vec::new(),
        }
    }
}

/// Applies the interception rules against one session's state.
#[derive(Debug, Clone)]
pub struct Interceptor {
    chat_prefix: String,
    low_health_threshold: f32,
    effect_ticks: i32,
}

impl Interceptor {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            chat_prefix: config.chat_prefix.clone(),
            low_health_threshold: config.low_health_threshold,
            effect_ticks: config.low_health_effect_ticks,
        }
    }

    pub async fn intercept(
        &self,
        direction: Direction,
        message: Message,
        state: &SessionState,
    ) -> Interception {
        let modes = state.modes().await;
        if modes.logging {
            info!(
                target: PACKET_LOG_TARGET,
                %direction,
                elapsed_ms = state.elapsed().as_millis() as u64,
                kind = message.name(),
                content = ?message,
                "packet"
            );
        }

        match direction {
            Direction::ClientToServer => self.from_client(message, state).await,
            Direction::ServerToClient => self.from_server(message, state, modes).await,
        }
    }

    async fn from_client(&self, message: Message, state: &SessionState) -> Interception {
        match message {
            Message::Text(text) if text.is_chat() && text.message.starts_with(COMMAND_PREFIX) => {
                Interception {
                    verdict: Verdict::Command(text.message),
                    to_client: Vec::new(),
                }
            }
            Message::Text(mut text) if text.is_chat() => {
                text.message.insert_str(0, &self.chat_prefix);
                Interception::forward(Message::Text(text))
            }
            Message::MovePlayer(movement) => {
                state
                    .observe_own_movement(movement.entity_runtime_id, movement.position)
                    .await;
                Interception::forward(Message::MovePlayer(movement))
            }
            other => Interception::forward(other),
        }
    }

    async fn from_server(
        &self,
        mut message: Message,
        state: &SessionState,
        modes: Modes,
    ) -> Interception {
        let mut to_client = Vec::new();

        match &mut message {
            Message::PlayerList(list) => {
                let recorded = state
                    .record_players(
                        list.entries
                            .iter()
                            .map(|e| (e.username.clone(), e.entity_unique_id)),
                    )
                    .await;
                tracing::trace!(recorded, "player list recorded");
            }
            Message::MovePlayer(movement) => {
                let moved = state
                    .track_movement(movement.entity_runtime_id, movement.position)
                    .await;
                if let Movement::Tracked { alert: Some(alert), .. } = moved {
                    let xuid = state.local().await.xuid;
                    to_client.push(reply::notice(alert, &xuid));
                }
            }
            Message::SetTime(set_time) => {
                if let Some(forced) = modes.forced_time() {
                    set_time.time = forced;
                }
            }
            Message::UpdateAttributes(update) if modes.low_health_effects => {
                let low = update
                    .health_values()
                    .filter(|health| *health < self.low_health_threshold)
                    .count();
                if low > 0 {
                    let local = state.local().await;
                    for _ in 0..low {
                        to_client.extend(LOW_HEALTH_EFFECTS.iter().map(|effect| {
                            Message::MobEffect(MobEffect::add(
                                local.entity_runtime_id,
                                *effect,
                                LOW_HEALTH_AMPLIFIER,
                                self.effect_ticks,
                            ))
                        }));
                        to_client.push(reply::notice(
                            "Low health! Applied speed, strength, and regeneration effects.",
                            &local.xuid,
                        ));
                    }
                }
            }
            _ => {}
        }

        Interception {
            verdict: Verdict::Forward(message),
            to_client,
        }
    }
}

/// A plain chat line as the local player would type it.
pub fn chat_line(message: impl Into<String>, xuid: &str) -> Message {
    Message::Text(Text::chat(message, xuid))
}
