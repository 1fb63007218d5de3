//! Error types for the camera-sync client.
//!
//! Every failure the channel can run into is described by [`SyncError`]. Inside
//! the driver these errors never propagate up through the tick loop; they are
//! logged and converted into a [`ChannelNotice`](crate::ChannelNotice) on the
//! observable channel status instead. Only setup operations (loading a config,
//! opening the transport) return them to the caller.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: the transport could not be opened or dropped mid-session
//! - **Protocol Errors**: malformed or unexpected control messages
//! - **Server Errors**: the render server reported a failure for a request
//! - **Decode Errors**: a frame payload could not be decoded into an image
//! - **Timeouts**: a request went unanswered past the response deadline
//! - **Configuration Errors**: invalid or unreadable client configuration
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use camsync::SyncError;
//!
//! let error = SyncError::connection_failed("server refused the handshake");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::ImageFormat;

/// Result type alias for camera-sync operations.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Main error type for camera-sync operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    #[error("Failed to connect to render server: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Protocol error in {context}: {details}")]
    Protocol { context: String, details: String },

    #[error("Render server reported an error: {message}")]
    ServerReported { message: String },

    #[error("Failed to decode {format} frame: {details}")]
    Decode { format: String, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Config file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Connection { .. } => true,
            SyncError::Timeout { .. } => true,
            SyncError::ServerReported { .. } => true,
            SyncError::Decode { .. } => true,
            SyncError::Protocol { .. } => false,
            SyncError::Config { .. } => false,
            SyncError::File { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SyncError::Connection { .. } => vec![
                "Ensure the render server is running and reachable",
                "Check the WebSocket URL and port",
                "Reconnect with a fresh connection",
            ],
            SyncError::Protocol { .. } => vec![
                "Check that client and server speak the same protocol version",
                "Inspect the raw control message in the debug log",
            ],
            SyncError::ServerReported { .. } => vec![
                "Check the render server log for the failing request",
                "Verify the requested resolution and time index are supported",
            ],
            SyncError::Decode { .. } => vec![
                "Verify the server's negotiated image format",
                "Check for truncated frames caused by the message size limit",
            ],
            SyncError::Timeout { .. } => vec![
                "Increase the response timeout",
                "Lower the stream resolution to reduce render time",
                "Check network latency to the render server",
            ],
            SyncError::Config { .. } => vec![
                "Check configuration values against their documented ranges",
                "Remove overrides to fall back to defaults",
            ],
            SyncError::File { .. } => vec![
                "Check the config file exists and is readable",
                "Check file permissions",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        SyncError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SyncError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for protocol errors.
    pub fn protocol_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        SyncError::Protocol { context: context.into(), details: details.into() }
    }

    /// Helper constructor for errors reported by the render server.
    pub fn server_reported(message: impl Into<String>) -> Self {
        SyncError::ServerReported { message: message.into() }
    }

    /// Helper constructor for frame decode errors.
    ///
    /// `format` is `None` when the payload arrived before a handshake and the
    /// format had to be guessed.
    pub fn decode_failed(format: Option<ImageFormat>, details: impl Into<String>) -> Self {
        let format = format.map_or_else(|| "unknown".to_string(), |f| f.to_string());
        SyncError::Decode { format, details: details.into() }
    }

    /// Helper constructor for timeouts.
    pub fn timeout(duration: Duration) -> Self {
        SyncError::Timeout { duration }
    }

    /// Helper constructor for configuration errors.
    pub fn config_invalid(reason: impl Into<String>) -> Self {
        SyncError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_invalid_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SyncError::Config { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        SyncError::File { path, source }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            reason in ".*",
            context in "[a-z_]+",
            details in ".*",
            message in ".*",
            duration_ms in 1u64..60000u64
        ) {
            let connection = SyncError::connection_failed(reason.clone());
            prop_assert!(connection.to_string().contains(&reason));

            let protocol = SyncError::protocol_error(context.clone(), details.clone());
            let protocol_msg = protocol.to_string();
            prop_assert!(protocol_msg.contains(&context));
            prop_assert!(protocol_msg.contains(&details));

            let server = SyncError::server_reported(message.clone());
            prop_assert!(server.to_string().contains(&message));

            let timeout = SyncError::timeout(Duration::from_millis(duration_ms));
            prop_assert!(!timeout.to_string().is_empty());
        }

        #[test]
        fn connection_source_chain_is_preserved(base_message in ".*") {
            let source: Box<dyn std::error::Error + Send + Sync> =
                Box::new(std::io::Error::other(base_message.clone()));
            let error = SyncError::connection_failed_with_source("handshake", source);

            let inner = std::error::Error::source(&error).expect("source should be kept");
            prop_assert_eq!(inner.to_string(), base_message);
        }
    }

    #[test]
    fn decode_error_names_the_format() {
        let jpeg = SyncError::decode_failed(Some(ImageFormat::Jpeg), "bad huffman table");
        assert_eq!(jpeg.to_string(), "Failed to decode jpeg frame: bad huffman table");

        let unknown = SyncError::decode_failed(None, "no magic bytes");
        assert!(unknown.to_string().contains("unknown"));
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<SyncError>();

        let error = SyncError::connection_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_methods_work() {
        let connection = SyncError::connection_failed("test");
        let protocol = SyncError::protocol_error("hello", "missing field `T`");
        let config = SyncError::config_invalid("target_fps must be positive");

        assert!(connection.is_retryable());
        assert!(SyncError::timeout(Duration::from_secs(2)).is_retryable());
        assert!(!protocol.is_retryable());
        assert!(!config.is_retryable());

        for error in [&connection, &protocol, &config] {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn from_io_error_keeps_the_message() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "camsync.yaml");
        match SyncError::from(io_err) {
            SyncError::File { source, .. } => assert_eq!(source.to_string(), "camsync.yaml"),
            other => panic!("Expected File error variant, got {other:?}"),
        }
    }
}
