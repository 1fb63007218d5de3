//! Transports carry framed text and binary messages to and from the server.
//!
//! The channel needs an ordered, reliable, full-duplex connection with message
//! framing. Ordering matters: replies carry no request id, so a frame is
//! matched to the most recent unanswered request purely by arrival order.

pub mod websocket;

use bytes::Bytes;

use crate::Result;

pub use websocket::WebSocketTransport;

/// One framed message received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Text(String),
    Binary(Bytes),
}

/// Duplex message transport
///
/// Implementations own the connection; the driver owns the transport.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Send one text message.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Receive the next message.
    ///
    /// Returns:
    /// - `Ok(Some(message))` - A message arrived
    /// - `Ok(None)` - The peer closed the connection (normal termination)
    /// - `Err(e)` - Transport failure
    ///
    /// Must be cancel safe: the driver polls it inside `tokio::select!` and
    /// drops the future whenever another event wins.
    async fn recv(&mut self) -> Result<Option<WireMessage>>;

    /// Close the connection. Closing an already closed transport is not an error.
    async fn close(&mut self) -> Result<()>;
}
