//! Message-level view of a connection.
//!
//! The relay never handles frames. An [`Endpoint`] reads and writes whole
//! [`Message`]s; [`CodecEndpoint`] builds one from any transport
//! [`Connection`] and a [`Codec`].

use std::future::Future;

use kira_protocol::{Codec, Message};
use kira_transport::{Connection, ConnectionId, TransportError};

use crate::KiraError;

/// One side of a relayed session, either the client or the upstream server.
///
/// Reads and writes may run concurrently from different tasks. A read
/// that ends because the peer went away is an error, never a silent `Ok`.
pub trait Endpoint: Send + Sync + 'static {
    /// Receives the next message.
    fn read_message(&self) -> impl Future<Output = Result<Message, KiraError>> + Send;

    /// Sends one message.
    fn write_message(&self, message: &Message)
    -> impl Future<Output = Result<(), KiraError>> + Send;

    /// Closes the underlying connection. Safe to call more than once.
    fn close(&self) -> impl Future<Output = Result<(), KiraError>> + Send;

    fn id(&self) -> ConnectionId;
}

/// An [`Endpoint`] made of a transport connection and a codec.
pub struct CodecEndpoint<C, K> {
    conn: C,
    codec: K,
}

impl<C: Connection, K: Codec> CodecEndpoint<C, K> {
    pub fn new(conn: C, codec: K) -> Self {
        Self { conn, codec }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }
}

impl<C: Connection, K: Codec> Endpoint for CodecEndpoint<C, K> {
    async fn read_message(&self) -> Result<Message, KiraError> {
        match self.conn.recv().await? {
            Some(frame) => Ok(self.codec.decode(&frame)?),
            None => Err(TransportError::ConnectionClosed(format!(
                "{} closed by peer",
                self.conn.id()
            ))
            .into()),
        }
    }

    async fn write_message(&self, message: &Message) -> Result<(), KiraError> {
        let frame = self.codec.encode(message)?;
        self.conn.send(&frame).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), KiraError> {
        self.conn.close().await?;
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.conn.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kira_protocol::{JsonCodec, SetTime};
    use kira_transport::memory;

    fn pair() -> (
        CodecEndpoint<memory::MemoryConnection, JsonCodec>,
        CodecEndpoint<memory::MemoryConnection, JsonCodec>,
    ) {
        let (a, b) = memory::pair();
        (CodecEndpoint::new(a, JsonCodec), CodecEndpoint::new(b, JsonCodec))
    }

    #[tokio::test]
    async fn test_message_crosses_endpoints() {
        let (a, b) = pair();
        a.write_message(&Message::SetTime(SetTime { time: 1200 }))
            .await
            .unwrap();
        assert_eq!(
            b.read_message().await.unwrap(),
            Message::SetTime(SetTime { time: 1200 })
        );
    }

    #[tokio::test]
    async fn test_peer_close_is_an_error() {
        let (a, b) = pair();
        a.close().await.unwrap();
        let err = b.read_message().await.unwrap_err();
        assert!(matches!(
            err,
            KiraError::Transport(TransportError::ConnectionClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_an_error() {
        let (a, b) = memory::pair();
        let b = CodecEndpoint::new(b, JsonCodec);
        a.send(b"not json").await.unwrap();
        assert!(matches!(
            b.read_message().await.unwrap_err(),
            KiraError::Protocol(_)
        ));
    }
}
