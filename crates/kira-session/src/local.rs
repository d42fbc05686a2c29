use kira_protocol::{EntityRuntimeId, EntityUniqueId, GameData, Login, Vec3};

/// The player behind the client connection.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayer {
    pub display_name: String,
    pub xuid: String,
    pub entity_unique_id: EntityUniqueId,
    pub entity_runtime_id: EntityRuntimeId,
    /// Last known position; seeded from the spawn point.
    pub position: Vec3,
}

impl LocalPlayer {
    /// Combines the client's login with the world data the server sent.
    pub fn from_handshake(login: &Login, game: &GameData) -> Self {
        Self {
            display_name: login.display_name.clone(),
            xuid: login.xuid.clone(),
            entity_unique_id: game.entity_unique_id,
            entity_runtime_id: game.entity_runtime_id,
            position: game.player_position,
        }
    }
}
