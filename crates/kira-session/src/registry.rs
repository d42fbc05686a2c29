//! Name ↔ entity id registry built from player-list broadcasts.

use std::collections::HashMap;

use kira_protocol::{EntityRuntimeId, EntityUniqueId};

/// Known players, keyed by display name.
///
/// Entries are never removed: once a name has been seen it stays resolvable
/// for the rest of the session. Re-announcing a name replaces its id (last
/// write wins), so each name maps to at most one id.
///
/// Movement messages carry an id, not a name, so a reverse index from id to
/// name is kept in sync with the forward map instead of scanning every
/// entry on each movement.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    by_name: HashMap<String, EntityUniqueId>,
    by_id: HashMap<EntityUniqueId, String>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name → id`, replacing any earlier id for `name`.
    pub fn insert(&mut self, name: impl Into<String>, id: EntityUniqueId) {
        let name = name.into();
        if let Some(old) = self.by_name.insert(name.clone(), id) {
            if old != id && self.by_id.get(&old) == Some(&name) {
                self.by_id.remove(&old);
            }
        }
        self.by_id.insert(id, name);
    }

    pub fn id_of(&self, name: &str) -> Option<EntityUniqueId> {
        self.by_name.get(name).copied()
    }

    /// The player currently announced under the entity a movement refers to.
    pub fn name_of(&self, entity: EntityRuntimeId) -> Option<&str> {
        let id = entity.as_unique()?;
        let name = self.by_id.get(&id)?;
        // The reverse entry is only trusted while the forward map agrees.
        (self.by_name.get(name) == Some(&id)).then_some(name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
