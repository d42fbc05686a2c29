//! Unified error type for the relay.

use kira_protocol::ProtocolError;
use kira_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps every crate-specific error.
///
/// `#[from]` on the wrapping variants lets `?` convert transport, protocol
/// and config errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KiraError {
    /// A transport-level error (connect, send, recv, closed).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unexpected message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The configuration file could not be read, parsed, or written.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reaching the upstream server failed or timed out.
    #[error("failed to connect to upstream {addr}: {reason}")]
    Dial { addr: String, reason: String },

    /// A peer broke off or misbehaved during session setup.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A bounded wait ran out.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// The session was torn down while an operation was in flight.
    #[error("session is shutting down")]
    Cancelled,
}

impl KiraError {
    /// The disconnect text shown to the client when this error ends its
    /// session before relaying started.
    pub fn disconnect_reason(&self) -> &'static str {
        match self {
            Self::Dial { .. } => "Failed to connect to server",
            _ => "Connection lost",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: KiraError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, KiraError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: KiraError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, KiraError::Protocol(_)));
    }

    #[test]
    fn test_dial_failure_reason_for_client() {
        let err = KiraError::Dial {
            addr: "example.org:19132".into(),
            reason: "refused".into(),
        };
        assert_eq!(err.disconnect_reason(), "Failed to connect to server");
        assert!(err.to_string().contains("example.org:19132"));
        assert_eq!(KiraError::Timeout("login").disconnect_reason(), "Connection lost");
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(KiraError::Timeout("handshake").to_string(), "handshake timed out");
    }
}
