//! WebSocket transport built on tokio-tungstenite

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::{debug, info, trace};

use super::{Transport, WireMessage};
use crate::{Result, SyncError};

/// Client side of a WebSocket connection to the render server.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a connection, failing with a timeout error after `connect_timeout`.
    ///
    /// `max_message_size` bounds a single inbound frame payload.
    pub async fn connect(
        url: &str,
        max_message_size: usize,
        connect_timeout: Duration,
    ) -> Result<Self> {
        info!(url, "Connecting to render server");

        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(max_message_size);
        config.max_frame_size = Some(max_message_size);

        let (stream, response) = tokio::time::timeout(
            connect_timeout,
            connect_async_with_config(url, Some(config), true),
        )
        .await
        .map_err(|_| SyncError::timeout(connect_timeout))?
        .map_err(|e| {
            SyncError::connection_failed_with_source(format!("WebSocket handshake with {url}"), Box::new(e))
        })?;

        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Self { stream, closed: false })
    }
}

fn is_closed_error(error: &tungstenite::Error) -> bool {
    matches!(error, tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        trace!(len = text.len(), "Sending text message");
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| SyncError::connection_failed_with_source("send failed", Box::new(e)))
    }

    async fn recv(&mut self) -> Result<Option<WireMessage>> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Err(e)) if is_closed_error(&e) => return Ok(None),
                Some(Err(e)) => {
                    return Err(SyncError::connection_failed_with_source("receive failed", Box::new(e)));
                }
                Some(Ok(Message::Text(text))) => return Ok(Some(WireMessage::Text(text))),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(WireMessage::Binary(Bytes::from(data))));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Server sent close frame");
                    return Ok(None);
                }
                // Pings are answered by tungstenite while the stream is polled
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(e) if is_closed_error(&e) => Ok(()),
            Err(e) => Err(SyncError::connection_failed_with_source("close failed", Box::new(e))),
        }
    }
}
