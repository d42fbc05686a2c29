//! Position tracking and debounced proximity alerts.

use std::collections::HashMap;
use std::fmt;

use kira_protocol::Vec3;

use crate::PlayerRegistry;

/// Last observed position of every tracked player.
#[derive(Debug, Default)]
pub struct PositionTable {
    positions: HashMap<String, Vec3>,
}

impl PositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name`'s position. Names the registry has never announced
    /// are ignored, so every entry here is also a registry entry.
    ///
    /// Returns `true` if the position was stored.
    pub fn record(&mut self, registry: &PlayerRegistry, name: &str, position: Vec3) -> bool {
        if !registry.contains(name) {
            return false;
        }
        self.positions.insert(name.to_string(), position);
        true
    }

    pub fn get(&self, name: &str) -> Option<Vec3> {
        self.positions.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Radar tuning: how close counts as "nearby" and how much a distance must
/// change before the operator hears about it again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityPolicy {
    /// Alert radius in blocks.
    pub radius: f32,
    /// Minimum change, in blocks, since the last alert for a new one.
    pub threshold: f32,
}

impl Default for ProximityPolicy {
    fn default() -> Self {
        Self {
            radius: 80.0,
            threshold: 1.0,
        }
    }
}

/// One radar notification, rendered to the operator via `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProximityAlert {
    /// The player entered the radius (first sighting in this cycle).
    Detected { name: String, distance: f32 },
    /// The player got closer by `by` blocks since the last alert.
    Approached { name: String, by: f32, distance: f32 },
    /// The player got farther by `by` blocks since the last alert.
    MovedAway { name: String, by: f32, distance: f32 },
}

impl ProximityAlert {
    pub fn name(&self) -> &str {
        match self {
            Self::Detected { name, .. }
            | Self::Approached { name, .. }
            | Self::MovedAway { name, .. } => name,
        }
    }

    pub fn distance(&self) -> f32 {
        match self {
            Self::Detected { distance, .. }
            | Self::Approached { distance, .. }
            | Self::MovedAway { distance, .. } => *distance,
        }
    }
}

impl fmt::Display for ProximityAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detected { name, distance } => {
                write!(f, "Player \"{name}\" detected at {distance:.1} blocks")
            }
            Self::Approached { name, by, distance } => write!(
                f,
                "Player \"{name}\" approached by {by:.1} blocks (distance: {distance:.1})"
            ),
            Self::MovedAway { name, by, distance } => write!(
                f,
                "Player \"{name}\" moved away by {by:.1} blocks (distance: {distance:.1})"
            ),
        }
    }
}

/// Distance at which each nearby player was last alerted.
///
/// An entry exists while a player is inside the radius and has been
/// announced at least once; leaving the radius drops it, so re-entering
/// starts a fresh cycle with a new "detected" alert.
#[derive(Debug, Default)]
pub struct ProximityMemory {
    last_alerted: HashMap<String, f32>,
}

impl ProximityMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one distance reading for `name` and returns the alert it
    /// warrants, if any.
    ///
    /// Within the radius, an alert fires on first sighting or when the
    /// distance moved more than `policy.threshold` away from the last
    /// *alerted* distance; small drifts accumulate until they cross it.
    /// Outside the radius the entry is forgotten and nothing is reported.
    pub fn observe(
        &mut self,
        name: &str,
        distance: f32,
        policy: &ProximityPolicy,
    ) -> Option<ProximityAlert> {
        if distance > policy.radius {
            if self.last_alerted.remove(name).is_some() {
                tracing::trace!(name, distance, "player left radar radius");
            }
            return None;
        }

        let alert = match self.last_alerted.get(name).copied() {
            None => ProximityAlert::Detected {
                name: name.to_string(),
                distance,
            },
            Some(last) => {
                let diff = distance - last;
                if diff.abs() <= policy.threshold {
                    return None;
                }
                if diff > 0.0 {
                    ProximityAlert::MovedAway {
                        name: name.to_string(),
                        by: diff,
                        distance,
                    }
                } else {
                    ProximityAlert::Approached {
                        name: name.to_string(),
                        by: -diff,
                        distance,
                    }
                }
            }
        };

        self.last_alerted.insert(name.to_string(), distance);
        Some(alert)
    }

    pub fn last_alerted(&self, name: &str) -> Option<f32> {
        self.last_alerted.get(name).copied()
    }

    /// Forgets every player, e.g. when the radar is switched off.
    pub fn clear(&mut self) {
        self.last_alerted.clear();
    }

    pub fn len(&self) -> usize {
        self.last_alerted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_alerted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kira_protocol::EntityUniqueId;

    fn feed(memory: &mut ProximityMemory, readings: &[f32]) -> Vec<Option<ProximityAlert>> {
        let policy = ProximityPolicy::default();
        readings
            .iter()
            .map(|d| memory.observe("Alex", *d, &policy))
            .collect()
    }

    #[test]
    fn test_hysteresis_sequence() {
        let mut memory = ProximityMemory::new();
        let alerts = feed(&mut memory, &[85.0, 75.0, 74.5, 60.0]);

        assert_eq!(alerts[0], None, "outside the radius");
        assert_eq!(
            alerts[1],
            Some(ProximityAlert::Detected { name: "Alex".into(), distance: 75.0 })
        );
        assert_eq!(alerts[2], None, "0.5 block drift is below the threshold");
        assert!(matches!(
            alerts[3],
            Some(ProximityAlert::Approached { distance, .. }) if distance == 60.0
        ));
        assert_eq!(memory.last_alerted("Alex"), Some(60.0));
    }

    #[test]
    fn test_drift_is_measured_from_last_alert() {
        let mut memory = ProximityMemory::new();
        let alerts = feed(&mut memory, &[50.0, 50.6, 51.2]);
        assert!(alerts[0].is_some());
        assert_eq!(alerts[1], None);
        // 1.2 blocks from the alerted 50.0, even though each step was 0.6.
        assert!(matches!(alerts[2], Some(ProximityAlert::MovedAway { .. })));
    }

    #[test]
    fn test_exactly_threshold_is_not_reported() {
        let mut memory = ProximityMemory::new();
        let alerts = feed(&mut memory, &[40.0, 41.0, 39.0]);
        assert!(alerts[0].is_some());
        assert_eq!(alerts[1], None);
        assert_eq!(alerts[2], None);
    }

    #[test]
    fn test_exactly_radius_counts_as_inside() {
        let mut memory = ProximityMemory::new();
        assert!(feed(&mut memory, &[80.0])[0].is_some());
    }

    #[test]
    fn test_leaving_radius_resets_cycle() {
        let mut memory = ProximityMemory::new();
        let alerts = feed(&mut memory, &[70.0, 90.0, 70.0]);
        assert!(matches!(alerts[0], Some(ProximityAlert::Detected { .. })));
        assert_eq!(alerts[1], None);
        assert!(matches!(alerts[2], Some(ProximityAlert::Detected { .. })));
    }

    #[test]
    fn test_clear_forgets_everyone() {
        let mut memory = ProximityMemory::new();
        feed(&mut memory, &[10.0]);
        assert_eq!(memory.len(), 1);
        memory.clear();
        assert!(memory.is_empty());
    }

    #[test]
    fn test_alert_messages() {
        let detected = ProximityAlert::Detected { name: "Alex".into(), distance: 75.0 };
        assert_eq!(detected.to_string(), "Player \"Alex\" detected at 75.0 blocks");

        let closer = ProximityAlert::Approached { name: "Alex".into(), by: 15.0, distance: 60.0 };
        assert_eq!(
            closer.to_string(),
            "Player \"Alex\" approached by 15.0 blocks (distance: 60.0)"
        );

        let away = ProximityAlert::MovedAway { name: "Alex".into(), by: 2.5, distance: 62.5 };
        assert_eq!(
            away.to_string(),
            "Player \"Alex\" moved away by 2.5 blocks (distance: 62.5)"
        );
        assert_eq!(away.name(), "Alex");
        assert_eq!(away.distance(), 62.5);
    }

    #[test]
    fn test_position_table_only_tracks_registered_names() {
        let mut registry = PlayerRegistry::new();
        registry.insert("Alex", EntityUniqueId(2));
        let mut table = PositionTable::new();

        assert!(table.record(&registry, "Alex", Vec3::new(1.0, 2.0, 3.0)));
        assert!(!table.record(&registry, "Ghost", Vec3::ZERO));
        assert_eq!(table.get("Alex"), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(table.get("Ghost"), None);
        assert_eq!(table.len(), 1);
    }
}
