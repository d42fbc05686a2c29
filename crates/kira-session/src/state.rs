//! The state bundle owned by one relay session.
//!
//! # Locking
//!
//! Each table has its own `tokio::sync::Mutex` so the server-read task
//! (movement, player lists) and the client-read task (commands) rarely
//! contend. Locks are never held across network I/O. Where two locks are
//! taken together the order is fixed: `players → positions` and
//! `modes → proximity`.

use std::time::{Duration, Instant};

use kira_protocol::{EntityRuntimeId, EntityUniqueId, Vec3};
use tokio::sync::Mutex;

use crate::{
    LocalPlayer, Modes, PlayerRegistry, PositionTable, ProximityAlert, ProximityMemory,
    ProximityPolicy,
};

/// What a movement message turned out to be about.
#[derive(Debug, Clone, PartialEq)]
pub enum Movement {
    /// The local player moved (or was moved by the server).
    Local,
    /// A registered player moved; `alert` is set when the radar fired.
    Tracked {
        name: String,
        alert: Option<ProximityAlert>,
    },
    /// An entity the registry does not know about.
    Untracked,
}

/// Everything one relay session remembers.
pub struct SessionState {
    players: Mutex<PlayerRegistry>,
    positions: Mutex<PositionTable>,
    proximity: Mutex<ProximityMemory>,
    modes: Mutex<Modes>,
    local: Mutex<LocalPlayer>,
    policy: ProximityPolicy,
    started: Instant,
}

impl SessionState {
    pub fn new(local: LocalPlayer, policy: ProximityPolicy) -> Self {
        Self {
            players: Mutex::new(PlayerRegistry::new()),
            positions: Mutex::new(PositionTable::new()),
            proximity: Mutex::new(ProximityMemory::new()),
            modes: Mutex::new(Modes::default()),
            local: Mutex::new(local),
            policy,
            started: Instant::now(),
        }
    }

    /// Time since the session was set up.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn policy(&self) -> ProximityPolicy {
        self.policy
    }

    // -- Players ----------------------------------------------------------

    /// Records player-list entries. Returns how many were recorded.
    pub async fn record_players<I, S>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (S, EntityUniqueId)>,
        S: Into<String>,
    {
        let mut players = self.players.lock().await;
        let mut count = 0;
        for (name, id) in entries {
            players.insert(name, id);
            count += 1;
        }
        count
    }

    pub async fn player_count(&self) -> usize {
        self.players.lock().await.len()
    }

    pub async fn position_of(&self, name: &str) -> Option<Vec3> {
        self.positions.lock().await.get(name)
    }

    /// Applies a server-reported movement of `entity` to `position`.
    ///
    /// Updates the local position for the local entity. For any other
    /// registered player (other than the local player's own name) the
    /// position table is updated and, with the radar on, the proximity
    /// memory decides whether an alert is due.
    pub async fn track_movement(&self, entity: EntityRuntimeId, position: Vec3) -> Movement {
        let (local_name, local_position) = {
            let mut local = self.local.lock().await;
            if local.entity_runtime_id == entity {
                local.position = position;
                return Movement::Local;
            }
            (local.display_name.clone(), local.position)
        };

        let name = {
            let players = self.players.lock().await;
            let name = match players.name_of(entity) {
                Some(name) if name != local_name => name.to_string(),
                _ => return Movement::Untracked,
            };
            self.positions
                .lock()
                .await
                .record(&players, &name, position);
            name
        };

        let modes = self.modes.lock().await;
        if !modes.radar {
            return Movement::Tracked { name, alert: None };
        }
        let distance = local_position.distance(position);
        let alert = self
            .proximity
            .lock()
            .await
            .observe(&name, distance, &self.policy);
        drop(modes);

        Movement::Tracked { name, alert }
    }

    // -- Local player -----------------------------------------------------

    pub async fn local(&self) -> LocalPlayer {
        self.local.lock().await.clone()
    }

    pub async fn local_position(&self) -> Vec3 {
        self.local.lock().await.position
    }

    pub async fn set_local_position(&self, position: Vec3) {
        self.local.lock().await.position = position;
    }

    /// Records a client-reported move if it is the local entity's own.
    /// Returns `true` when the position was taken.
    pub async fn observe_own_movement(&self, entity: EntityRuntimeId, position: Vec3) -> bool {
        let mut local = self.local.lock().await;
        if local.entity_runtime_id != entity {
            return false;
        }
        local.position = position;
        true
    }

    // -- Modes ------------------------------------------------------------

    /// Snapshot of the current modes.
    pub async fn modes(&self) -> Modes {
        *self.modes.lock().await
    }

    /// Mutates the modes and returns the new snapshot.
    pub async fn update_modes(&self, f: impl FnOnce(&mut Modes)) -> Modes {
        let mut modes = self.modes.lock().await;
        f(&mut modes);
        *modes
    }

    /// Switches the radar. Turning it off forgets every alerted distance,
    /// under the same lock the movement path checks, so no reading taken
    /// while the radar was on can slip back in afterwards.
    pub async fn set_radar(&self, on: bool) {
        let mut modes = self.modes.lock().await;
        modes.radar = on;
        if !on {
            self.proximity.lock().await.clear();
        }
    }

    pub async fn proximity_entries(&self) -> usize {
        self.proximity.lock().await.len()
    }
}
