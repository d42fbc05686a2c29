//! Message types the relay understands.
//!
//! [`Message`] is a closed, internally tagged union: every frame carries a
//! `"type"` field naming the variant, and the rest of the object holds that
//! variant's fields. The relay only needs to look inside a handful of
//! variants (chat, player list, movement, time, attributes). Everything it
//! has no opinion on is still representable so it can be relayed as-is.

use std::fmt;
use std::ops::{Add, Div, Sub};

use serde::{Deserialize, Serialize};

/// Name of the attribute that carries an entity's health.
pub const HEALTH_ATTRIBUTE: &str = "minecraft:health";

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point in world space, in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// The world origin.
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Straight-line distance to `other`.
    pub fn distance(self, other: Vec3) -> f32 {
        let d = self - other;
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;

    fn div(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// Formats as `x y z` with one decimal, the way coordinates are shown to
/// the player.
impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} {:.1} {:.1}", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Per-connection entity handle used by movement and effect messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRuntimeId(pub u64);

impl EntityRuntimeId {
    /// The player-list id of the same entity, if it fits.
    ///
    /// Servers hand out both ids from the same counter for players, so the
    /// relay treats them as the same number space.
    pub fn as_unique(self) -> Option<EntityUniqueId> {
        i64::try_from(self.0).ok().map(EntityUniqueId)
    }
}

impl fmt::Display for EntityRuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

/// World-wide entity identifier, as advertised in player lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityUniqueId(pub i64);

impl fmt::Display for EntityUniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session setup
// ---------------------------------------------------------------------------

/// Client identity sent as the first message of a connection and forwarded
/// upstream when the relay dials the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    pub display_name: String,
    pub xuid: String,
}

/// World state handed to a player when the game starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub entity_unique_id: EntityUniqueId,
    pub entity_runtime_id: EntityRuntimeId,
    pub player_position: Vec3,
    pub game_mode: GameMode,
    #[serde(default)]
    pub world_name: String,
    #[serde(default)]
    pub time: i32,
}

/// Status codes a server reports during login and spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayStatus {
    LoginSuccess,
    LoginFailed,
    PlayerSpawn,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// The kind of a [`Text`] message. Only [`TextType::Chat`] is ever
/// rewritten or treated as a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextType {
    Raw,
    Chat,
    Translation,
    Popup,
    Tip,
    System,
    Whisper,
    Announcement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub text_type: TextType,
    #[serde(default)]
    pub needs_translation: bool,
    #[serde(default)]
    pub source_name: String,
    pub message: String,
    #[serde(default)]
    pub xuid: String,
}

impl Text {
    /// A plain chat line with no source name.
    pub fn chat(message: impl Into<String>, xuid: impl Into<String>) -> Self {
        Self {
            text_type: TextType::Chat,
            needs_translation: false,
            source_name: String::new(),
            message: message.into(),
            xuid: xuid.into(),
        }
    }

    pub fn is_chat(&self) -> bool {
        self.text_type == TextType::Chat
    }
}

// ---------------------------------------------------------------------------
// Players and movement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerListAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerListEntry {
    pub username: String,
    pub entity_unique_id: EntityUniqueId,
    #[serde(default)]
    pub xuid: String,
}

/// Server broadcast listing the players in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerList {
    pub action: PlayerListAction,
    pub entries: Vec<PlayerListEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveMode {
    #[default]
    Normal,
    Reset,
    Teleport,
    Rotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovePlayer {
    pub entity_runtime_id: EntityRuntimeId,
    pub position: Vec3,
    #[serde(default)]
    pub pitch: f32,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub head_yaw: f32,
    #[serde(default)]
    pub mode: MoveMode,
    #[serde(default)]
    pub on_ground: bool,
}

impl MovePlayer {
    /// A grounded, normal-mode move of `entity` to `position` with all
    /// rotations zeroed.
    pub fn to(entity: EntityRuntimeId, position: Vec3) -> Self {
        Self {
            entity_runtime_id: entity,
            position,
            pitch: 0.0,
            yaw: 0.0,
            head_yaw: 0.0,
            mode: MoveMode::Normal,
            on_ground: true,
        }
    }
}

// ---------------------------------------------------------------------------
// World time, attributes, effects, game mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTime {
    pub time: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: f32,
    #[serde(default)]
    pub min: f32,
    #[serde(default)]
    pub max: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAttributes {
    pub entity_runtime_id: EntityRuntimeId,
    pub attributes: Vec<Attribute>,
}

impl UpdateAttributes {
    /// Values of every health attribute in this update, in order.
    pub fn health_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.attributes
            .iter()
            .filter(|a| a.name == HEALTH_ATTRIBUTE)
            .map(|a| a.value)
    }
}

/// Status effects the relay knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Speed,
    Strength,
    Regeneration,
    Invisibility,
    NightVision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectOperation {
    Add,
    Modify,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobEffect {
    pub entity_runtime_id: EntityRuntimeId,
    pub operation: EffectOperation,
    pub effect: Effect,
    #[serde(default)]
    pub amplifier: i32,
    #[serde(default)]
    pub particles: bool,
    /// Duration in ticks (20 per second).
    #[serde(default)]
    pub duration: i32,
}

impl MobEffect {
    /// Adds `effect` to `entity` without particles.
    pub fn add(entity: EntityRuntimeId, effect: Effect, amplifier: i32, duration: i32) -> Self {
        Self {
            entity_runtime_id: entity,
            operation: EffectOperation::Add,
            effect,
            amplifier,
            particles: false,
            duration,
        }
    }

    pub fn remove(entity: EntityRuntimeId, effect: Effect) -> Self {
        Self {
            entity_runtime_id: entity,
            operation: EffectOperation::Remove,
            effect,
            amplifier: 0,
            particles: false,
            duration: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    /// Maps the numeric game type (0–3) to a mode.
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Survival),
            1 => Some(Self::Creative),
            2 => Some(Self::Adventure),
            3 => Some(Self::Spectator),
            _ => None,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Survival => "survival",
            Self::Creative => "creative",
            Self::Adventure => "adventure",
            Self::Spectator => "spectator",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One decoded game message.
///
/// Serialized internally tagged, e.g.
/// `{ "type": "SetTime", "time": 6000 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Client → relay → server: who is connecting.
    Login(Login),
    /// Server → relay → client: the world the player spawns into.
    StartGame(GameData),
    PlayStatus { status: PlayStatus },
    /// Client → server: view distance request, which also kicks off spawn.
    RequestChunkRadius { radius: i32 },
    Text(Text),
    PlayerList(PlayerList),
    MovePlayer(MovePlayer),
    SetTime(SetTime),
    UpdateAttributes(UpdateAttributes),
    MobEffect(MobEffect),
    SetPlayerGameType { game_type: GameMode },
    /// Either direction: the connection is ending, with a reason to show.
    Disconnect { message: String },
    /// A message the relay has no rules for, carried verbatim.
    Opaque { id: u32, payload: Vec<u8> },
}

impl Message {
    /// The variant name, for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => "Login",
            Self::StartGame(_) => "StartGame",
            Self::PlayStatus { .. } => "PlayStatus",
            Self::RequestChunkRadius { .. } => "RequestChunkRadius",
            Self::Text(_) => "Text",
            Self::PlayerList(_) => "PlayerList",
            Self::MovePlayer(_) => "MovePlayer",
            Self::SetTime(_) => "SetTime",
            Self::UpdateAttributes(_) => "UpdateAttributes",
            Self::MobEffect(_) => "MobEffect",
            Self::SetPlayerGameType { .. } => "SetPlayerGameType",
            Self::Disconnect { .. } => "Disconnect",
            Self::Opaque { .. } => "Opaque",
        }
    }
}
