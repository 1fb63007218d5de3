//! Camera-sync client for remote volumetric renderers.
//!
//! Camsync keeps a local camera and a render server in step over one WebSocket:
//! the client sends camera and time requests, the server answers each with an
//! encoded frame. At most one request is ever outstanding, so a slow server
//! sees fewer requests instead of a growing queue.
//!
//! # Features
//!
//! - **Flow control**: one in-flight request, released on frame, decode failure,
//!   close or response timeout
//! - **Playback clock**: virtual time that plays, pauses and scrubs independently
//!   of the network
//! - **Observable state**: status, clock and frames published on `watch` channels
//! - **Pluggable edges**: `PoseSource`, `PresentationSink` and `Transport` traits
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use camsync::{Camsync, OrbitPose};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> camsync::Result<()> {
//!     let pose = OrbitPose::new(15.0, 0.0, 2.0).with_auto_rotate(30.0);
//!     let connection = Camsync::connect_with_pose("ws://localhost:8765", pose).await?;
//!     let mut frames = Box::pin(connection.frames());
//!
//!     while let Some(frame) = frames.next().await {
//!         println!("frame {} in {:?}", frame.sequence, frame.latency);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
pub mod protocol;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

// Configuration and local state
pub mod clock;
pub mod config;
pub mod pose;

// Channel architecture
pub mod connection;
pub mod decode;
pub mod driver;
pub mod session;
pub mod sink;
pub mod transport;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use clock::{ClockSnapshot, PlaybackClock, PlaybackState};
pub use config::ClientConfig;
pub use connection::RemoteConnection;
pub use pose::{FixedPose, OrbitPose, PoseSource};
pub use sink::{PresentationSink, WatchSink};
pub use transport::{Transport, WebSocketTransport};

/// Unified entry point for camera-sync connections.
///
/// # Examples
///
/// ```rust,no_run
/// use camsync::Camsync;
///
/// #[tokio::main]
/// async fn main() -> camsync::Result<()> {
///     let connection = Camsync::connect("ws://localhost:8765").await?;
///     println!("{:?}", connection.status().state);
///     Ok(())
/// }
/// ```
pub struct Camsync;

impl Camsync {
    /// Connect to a render server with default settings and a fixed camera.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The URL is not a WebSocket URL
    /// - The server cannot be reached or the handshake fails
    /// - The connect timeout is reached
    pub async fn connect(url: impl Into<String>) -> Result<RemoteConnection> {
        RemoteConnection::connect(ClientConfig { url: url.into(), ..ClientConfig::default() }).await
    }

    /// Connect with default settings, reading the camera from `pose`.
    pub async fn connect_with_pose<P: PoseSource>(
        url: impl Into<String>,
        pose: P,
    ) -> Result<RemoteConnection> {
        let config = ClientConfig { url: url.into(), ..ClientConfig::default() };
        RemoteConnection::connect_with_pose(config, pose).await
    }

    /// Connect using a full configuration, typically loaded from YAML.
    ///
    /// ```rust,no_run
    /// use camsync::{Camsync, ClientConfig};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> camsync::Result<()> {
    /// let config = ClientConfig::from_file("camsync.yaml")?.with_env_overrides()?;
    /// let _connection = Camsync::connect_with(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect_with(config: ClientConfig) -> Result<RemoteConnection> {
        RemoteConnection::connect(config).await
    }
}
