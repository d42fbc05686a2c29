//! Codec trait and implementations.
//!
//! The relay never looks at bytes directly. Each endpoint owns a [`Codec`]
//! that turns frames into [`Message`](crate::Message)s and back, so the
//! frame format can change without touching interception logic.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to frames and decodes frames back.
///
/// `Send + Sync + 'static` because a codec lives inside endpoints that are
/// shared by several relay tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one frame.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes one frame.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use kira_protocol::{Codec, JsonCodec, Message, SetTime};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Message::SetTime(SetTime { time: 6000 })).unwrap();
/// let back: Message = codec.decode(&bytes).unwrap();
/// assert_eq!(back, Message::SetTime(SetTime { time: 6000 }));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
