//! Chat commands typed by the local player.
//!
//! A chat line starting with `.` never reaches the server. It is parsed
//! into a [`Command`] and executed against the session: the interpreter may
//! write to the client, push a message into the upstream queue, flip a
//! mode, or tear the session down. Every outcome is reported back to the
//! player as a tagged chat line.
//!
//! Parsing is pure and never touches the session, so a rejected line
//! changes nothing but the error reply it produces.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use kira_protocol::{Effect, EntityRuntimeId, GameMode, Message, MobEffect, SetTime, Text, Vec3};
use kira_session::{LocalPlayer, SessionState, TimeOfDay};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::lifecycle::Lifecycle;
use crate::reply;
use crate::teleport::{Stepper, TeleportPlan};
use crate::{Endpoint, KiraError};

/// Effect duration, in ticks, that the client treats as permanent.
pub const INDEFINITE_TICKS: i32 = 999_999;

const EFFECT_AMPLIFIER: i32 = 1;

/// Commands split into at most this many whitespace-separated fields; the
/// last field keeps the rest of the line.
const MAX_FIELDS: usize = 4;

const HELP: &str = "§7Commands:\n\
    §7- §c.help §f- Show command list\n\
    §7- §6.tp <x y z> §f- Teleport to coordinates\n\
    §7- §e.gm <0-3> §f- Change game mode\n\
    §7- §a.speed <0.1-10/off> §f- Set movement speed\n\
    §7- §b.log <on/off> §f- Toggle packet logging\n\
    §7- §9.nv <on/off> §f- Toggle night vision\n\
    §7- §9.xp <on/off> §f- Effects on low health\n\
    §7- §d.pos §f- Show current coordinates\n\
    §7- §5.kick <msg> §f- Disconnect with message\n\
    §7- §c.hide <on/off> §f- Toggle invisibility\n\
    §7- §6.lag <sec> §f- Delay in seconds\n\
    §7- §e.chat <msg> §f- Send chat message\n\
    §7- §a.radar <on/off> §f- Toggle player radar\n\
    §7- §b.setd <night/day> §f- Set local night/day\n\
    §7- §5.time §f- Show playtime";

/// An `on`/`off` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl FromStr for Toggle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_on() { "on" } else { "off" })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedSetting {
    Off,
    /// Movement speed multiplier in `0.1..=10`.
    Multiplier(f32),
}

impl SpeedSetting {
    /// Effect amplifier for a multiplier: `value - 1`, truncated toward zero.
    pub fn amplifier(value: f32) -> i32 {
        (value - 1.0) as i32
    }
}

/// A parsed, validated command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Chat(String),
    Radar(Toggle),
    SetDay(TimeOfDay),
    Time,
    Teleport(Vec3),
    GameMode(GameMode),
    Speed(SpeedSetting),
    Log(Toggle),
    NightVision(Toggle),
    LowHealth(Toggle),
    Position,
    Kick(String),
    Hide(Toggle),
    Lag(u64),
}

/// Why a command line was rejected. `Display` is the text shown to the
/// player.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command. Use .help")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    Invalid(&'static str),
}

impl Command {
    /// Parses one command line, including its leading `.`.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let fields = split_fields(line, MAX_FIELDS);
        let Some((head, args)) = fields.split_first() else {
            return Err(CommandError::Unknown(String::new()));
        };
        let name = head.strip_prefix('.').unwrap_or(*head);

        let command = match name {
            "help" => Self::Help,
            "chat" => Self::Chat(free_text(args).ok_or(CommandError::Usage(".chat <message>"))?),
            "radar" => Self::Radar(toggle(args, ".radar <on/off>")?),
            "setd" => Self::SetDay(
                args.first()
                    .and_then(|a| a.parse::<TimeOfDay>().ok())
                    .ok_or(CommandError::Usage(".setd <night/day>"))?,
            ),
            "time" => Self::Time,
            "tp" => Self::Teleport(coordinates(args)?),
            "gm" => {
                let arg = args.first().ok_or(CommandError::Usage(".gm <0|1|2|3>"))?;
                let mode = arg
                    .parse::<i64>()
                    .ok()
                    .and_then(GameMode::from_index)
                    .ok_or(CommandError::Invalid("Mode must be 0, 1, 2, or 3"))?;
                Self::GameMode(mode)
            }
            "speed" => {
                let arg = args.first().ok_or(CommandError::Usage(".speed <0.1-10/off>"))?;
                if *arg == "off" {
                    Self::Speed(SpeedSetting::Off)
                } else {
                    let value = arg
                        .parse::<f32>()
                        .ok()
                        .filter(|v| (0.1..=10.0).contains(v))
                        .ok_or(CommandError::Invalid("Speed must be 0.1-10 or 'off'"))?;
                    Self::Speed(SpeedSetting::Multiplier(value))
                }
            }
            "log" => Self::Log(toggle(args, ".log <on/off>")?),
            "nv" => Self::NightVision(toggle(args, ".nv <on/off>")?),
            "xp" => Self::LowHealth(toggle(args, ".xp <on/off>")?),
            "pos" => Self::Position,
            "kick" => Self::Kick(free_text(args).ok_or(CommandError::Usage(".kick <message>"))?),
            "hide" => Self::Hide(toggle(args, ".hide <on/off>")?),
            "lag" => {
                let arg = args.first().ok_or(CommandError::Usage(".lag <seconds>"))?;
                let seconds = arg
                    .parse::<u64>()
                    .ok()
                    .filter(|s| *s >= 1)
                    .ok_or(CommandError::Invalid("Specify a number > 0"))?;
                Self::Lag(seconds)
            }
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// Splits on whitespace into at most `max` fields; the last one keeps the
/// remainder of the line verbatim.
fn split_fields(line: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(max);
    let mut rest = line.trim();
    while !rest.is_empty() {
        if fields.len() + 1 == max {
            fields.push(rest);
            break;
        }
        match rest.split_once(char::is_whitespace) {
            Some((head, tail)) => {
                fields.push(head);
                rest = tail.trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }
    fields
}

fn free_text(args: &[&str]) -> Option<String> {
    (!args.is_empty()).then(|| args.join(" "))
}

fn toggle(args: &[&str], usage: &'static str) -> Result<Toggle, CommandError> {
    args.first()
        .and_then(|a| a.parse().ok())
        .ok_or(CommandError::Usage(usage))
}

fn coordinates(args: &[&str]) -> Result<Vec3, CommandError> {
    let &[x, y, z] = args else {
        return Err(CommandError::Usage(".tp <x> <y> <z>"));
    };
    let parse = |s: &str| {
        s.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or(CommandError::Invalid("Coordinates must be numbers"))
    };
    Ok(Vec3::new(parse(x)?, parse(y)?, parse(z)?))
}

fn playtime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("Playtime: {}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// What a command needs from its session.
pub struct CommandContext<'a, E> {
    pub client: &'a E,
    /// The client → server hand-off queue.
    pub upstream: &'a mpsc::Sender<Message>,
    pub state: &'a SessionState,
    pub lifecycle: &'a Lifecycle,
    pub config: &'a RelayConfig,
}

impl<E: Endpoint> CommandContext<'_, E> {
    /// Writes to the client, giving up if the session is torn down first.
    async fn write(&self, message: &Message) -> Result<(), KiraError> {
        self.lifecycle
            .until_teardown(self.client.write_message(message))
            .await
    }

    /// Queues a message for the server behind everything already queued.
    async fn forward(&self, message: Message) -> Result<(), KiraError> {
        tokio::select! {
            biased;
            _ = self.lifecycle.cancelled() => Err(KiraError::Cancelled),
            sent = self.upstream.send(message) => sent.map_err(|_| KiraError::Cancelled),
        }
    }
}

/// Parses and runs one command line, replying to the player.
///
/// A failed write to either endpoint tears the session down, the same as
/// it would for a relayed message.
pub async fn execute<E: Endpoint>(line: &str, ctx: &CommandContext<'_, E>) {
    let local = ctx.state.local().await;

    let outcome = match Command::parse(line) {
        Ok(command) => {
            debug!(?command, "running command");
            match run(command, ctx, &local).await {
                Ok(Some(confirmation)) => {
                    ctx.write(&reply::notice(confirmation, &local.xuid)).await
                }
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            }
        }
        Err(e) => {
            debug!(line, error = %e, "command rejected");
            ctx.write(&reply::error(e, &local.xuid)).await
        }
    };

    match outcome {
        Ok(()) | Err(KiraError::Cancelled) => {}
        Err(e) => {
            warn!(error = %e, "command write failed");
            ctx.lifecycle.teardown("Connection lost");
        }
    }
}

/// Performs `command`. Returns the confirmation to show, if any.
async fn run<E: Endpoint>(
    command: Command,
    ctx: &CommandContext<'_, E>,
    local: &LocalPlayer,
) -> Result<Option<String>, KiraError> {
    let entity = local.entity_runtime_id;

    let confirmation = match command {
        Command::Help => HELP.to_string(),
        Command::Chat(text) => {
            ctx.forward(Message::Text(Text::chat(text, local.xuid.as_str())))
                .await?;
            "Message sent".to_string()
        }
        Command::Radar(toggle) => {
            ctx.state.set_radar(toggle.is_on()).await;
            format!("Radar: {toggle}")
        }
        Command::SetDay(time) => {
            ctx.state.update_modes(|m| m.force_time(time)).await;
            ctx.write(&Message::SetTime(SetTime { time: time.ticks() })).await?;
            format!("Time set to: {}", time.as_str())
        }
        Command::Time => playtime(ctx.state.elapsed()),
        Command::Teleport(target) => {
            let from = ctx.state.local_position().await;
            let plan = TeleportPlan::new(from, target, ctx.config.teleport_step);
            let cancel = ctx.lifecycle.token();
            debug!(%from, %target, steps = plan.steps(), "teleporting");
            Stepper::new(ctx.config.teleport_interval(), &cancel)
                .run(&plan, entity, ctx.client)
                .await?;
            ctx.state.set_local_position(target).await;
            format!("Teleported to {target}")
        }
        Command::GameMode(game_type) => {
            ctx.write(&Message::SetPlayerGameType { game_type }).await?;
            format!("Game mode set to: {game_type}")
        }
        Command::Speed(SpeedSetting::Off) => {
            ctx.write(&Message::MobEffect(MobEffect::remove(entity, Effect::Speed)))
                .await?;
            "Speed disabled".to_string()
        }
        Command::Speed(SpeedSetting::Multiplier(value)) => {
            let effect = MobEffect::add(
                entity,
                Effect::Speed,
                SpeedSetting::amplifier(value),
                INDEFINITE_TICKS,
            );
            ctx.write(&Message::MobEffect(effect)).await?;
            format!("Speed set to: {value:.1}")
        }
        Command::Log(toggle) => {
            ctx.state.update_modes(|m| m.logging = toggle.is_on()).await;
            format!("Packet logging: {toggle}")
        }
        Command::NightVision(toggle) => {
            ctx.write(&effect_toggle(entity, Effect::NightVision, toggle)).await?;
            format!("Night vision: {toggle}")
        }
        Command::LowHealth(toggle) => {
            ctx.state
                .update_modes(|m| m.low_health_effects = toggle.is_on())
                .await;
            format!("XP mode: {toggle}")
        }
        Command::Position => format!("Coordinates: {}", ctx.state.local_position().await),
        Command::Kick(message) => {
            info!(player = %local.display_name, %message, "kicking local player");
            ctx.lifecycle.teardown(message);
            return Ok(None);
        }
        Command::Hide(toggle) => {
            ctx.write(&effect_toggle(entity, Effect::Invisibility, toggle)).await?;
            let status = if toggle.is_on() { "invisible" } else { "visible" };
            format!("You are now {status}")
        }
        Command::Lag(seconds) => {
            tokio::select! {
                biased;
                _ = ctx.lifecycle.cancelled() => return Err(KiraError::Cancelled),
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
            }
            format!("Delay: {seconds} sec")
        }
    };

    Ok(Some(confirmation))
}

fn effect_toggle(entity: EntityRuntimeId, effect: Effect, toggle: Toggle) -> Message {
    let effect = match toggle {
        Toggle::On => MobEffect::add(entity, effect, EFFECT_AMPLIFIER, INDEFINITE_TICKS),
        Toggle::Off => MobEffect::remove(entity, effect),
    };
    Message::MobEffect(effect)
}
