//! Test utilities: fixture images and an in-memory transport.
//!
//! [`memory_pair`] returns a [`MemoryTransport`] for the client side and a
//! [`MemoryServer`] handle that plays the render server, so driver and
//! connection tests can run the full protocol without sockets.

#![cfg(any(test, feature = "test-utils"))]

use bytes::Bytes;
use std::io::Cursor;
use tokio::sync::mpsc;

use crate::protocol::{self, CameraRequest, ClientMessage, ControlMessage};
use crate::transport::{Transport, WireMessage};
use crate::types::{ImageFormat, SessionParams};
use crate::{Result, SyncError};

/// Encode a small gradient image. Pixel (0, 0) is `[0, 0, 128]`.
pub fn encode_test_image(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let mut encoded = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut encoded), format.into())
        .expect("in-memory image encoding should not fail");
    encoded
}

/// Handshake parameters used throughout the tests.
pub fn test_params(frame_count: u32, format: ImageFormat) -> SessionParams {
    SessionParams { frame_count, fov: 49.1, format, width: 64, height: 48 }
}

/// JSON text of a `hello` message.
pub fn hello_json(frame_count: u32, format: ImageFormat) -> String {
    serde_json::to_string(&ControlMessage::from(test_params(frame_count, format)))
        .expect("hello serializes")
}

/// JSON text of an `error` message.
pub fn error_json(message: &str) -> String {
    serde_json::to_string(&ControlMessage::Error { message: message.to_string() })
        .expect("error serializes")
}

/// Client half of an in-memory connection.
pub struct MemoryTransport {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<WireMessage>,
    closed: bool,
}

/// Server half of an in-memory connection.
pub struct MemoryServer {
    requests: mpsc::UnboundedReceiver<String>,
    replies: Option<mpsc::UnboundedSender<WireMessage>>,
}

/// Create a connected client/server pair.
pub fn memory_pair() -> (MemoryTransport, MemoryServer) {
    let (outgoing, requests) = mpsc::unbounded_channel();
    let (replies, incoming) = mpsc::unbounded_channel();
    (
        MemoryTransport { outgoing, incoming, closed: false },
        MemoryServer { requests, replies: Some(replies) },
    )
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.closed {
            return Err(SyncError::connection_failed("transport closed"));
        }
        self.outgoing.send(text).map_err(|_| SyncError::connection_failed("server hung up"))
    }

    async fn recv(&mut self) -> Result<Option<WireMessage>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.incoming.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.incoming.close();
        Ok(())
    }
}

impl MemoryServer {
    /// Next camera request, or `None` once the client is gone.
    pub async fn next_request(&mut self) -> Option<CameraRequest> {
        let raw = self.requests.recv().await?;
        match protocol::parse_client(&raw).expect("client sent a malformed request") {
            ClientMessage::Camera(request) => Some(request),
        }
    }

    /// Requests already received, without waiting.
    pub fn drain_requests(&mut self) -> Vec<CameraRequest> {
        let mut requests = Vec::new();
        while let Ok(raw) = self.requests.try_recv() {
            if let Ok(ClientMessage::Camera(request)) = protocol::parse_client(&raw) {
                requests.push(request);
            }
        }
        requests
    }

    pub fn send(&self, message: WireMessage) {
        if let Some(replies) = &self.replies {
            let _ = replies.send(message);
        }
    }

    pub fn send_hello(&self, frame_count: u32, format: ImageFormat) {
        self.send(WireMessage::Text(hello_json(frame_count, format)));
    }

    pub fn send_error(&self, message: &str) {
        self.send(WireMessage::Text(error_json(message)));
    }

    pub fn send_frame(&self, format: ImageFormat) {
        self.send(WireMessage::Binary(Bytes::from(encode_test_image(format, 64, 48))));
    }

    /// Drop the reply channel; the client sees a clean close.
    pub fn disconnect(&mut self) {
        self.replies = None;
    }
}
