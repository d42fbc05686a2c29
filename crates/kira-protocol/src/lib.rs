//! Game messages for the Kira relay.
//!
//! This crate defines what the relay sees once frames have been decoded:
//!
//! - **Types** ([`Message`] and its payloads): the closed set of game
//!   messages the relay understands. Anything else travels as
//!   [`Message::Opaque`] and is forwarded untouched.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages are turned
//!   into frames and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames) → Protocol (Message) → Relay (interception)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Attribute, Effect, EffectOperation, EntityRuntimeId, EntityUniqueId, GameData, GameMode,
    HEALTH_ATTRIBUTE, Login, Message, MobEffect, MoveMode, MovePlayer, PlayStatus, PlayerList,
    PlayerListAction, PlayerListEntry, SetTime, Text, TextType, UpdateAttributes, Vec3,
};
