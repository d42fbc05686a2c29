//! Per-session state for the Kira relay.
//!
//! Everything the interception rules and the command interpreter remember
//! about one relayed connection lives here:
//!
//! 1. **Players**: who is in the world ([`PlayerRegistry`]) and where they
//!    were last seen ([`PositionTable`]).
//! 2. **Proximity**: debounced "player nearby" alerts ([`ProximityMemory`]).
//! 3. **Modes**: the operator's toggles ([`Modes`]).
//! 4. **Local player**: identity and position of the player behind the
//!    client connection ([`LocalPlayer`]).
//! 5. **Lifecycle**: [`SessionPhase`], the connection's state machine.
//!
//! [`SessionState`] bundles the tables, each behind its own lock, and is
//! owned by exactly one relay session. Nothing here is process-global.
//!
//! ```text
//! Relay (above)  ← reads/writes state from its relay tasks and commands
//!     ↕
//! Session State (this crate)
//!     ↕
//! Protocol (below)  ← Vec3, entity ids, Login/GameData
//! ```

mod local;
mod modes;
mod phase;
mod registry;
mod state;
mod tracker;

pub use local::LocalPlayer;
pub use modes::{Modes, TimeOfDay};
pub use phase::SessionPhase;
pub use registry::PlayerRegistry;
pub use state::{Movement, SessionState};
pub use tracker::{PositionTable, ProximityAlert, ProximityMemory, ProximityPolicy};
