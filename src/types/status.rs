//! Observable channel status

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::SyncError;

/// Lifecycle of the single connection owned by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Image encoding negotiated in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => f.write_str("png"),
            ImageFormat::Jpeg => f.write_str("jpeg"),
        }
    }
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// Parameters announced by the server's `hello`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SessionParams {
    /// Number of distinct time steps `T`; virtual time wraps at this value
    pub frame_count: u32,
    pub fov: f32,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Category of a [`ChannelNotice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum NoticeKind {
    Connection,
    Protocol,
    ServerReported,
    Decode,
    Timeout,
    Config,
}

/// A non-fatal condition surfaced on the status instead of being returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ChannelNotice {
    pub kind: NoticeKind,
    pub message: String,
}

impl From<&SyncError> for ChannelNotice {
    fn from(error: &SyncError) -> Self {
        let kind = match error {
            SyncError::Connection { .. } => NoticeKind::Connection,
            SyncError::Protocol { .. } => NoticeKind::Protocol,
            SyncError::ServerReported { .. } => NoticeKind::ServerReported,
            SyncError::Decode { .. } => NoticeKind::Decode,
            SyncError::Timeout { .. } => NoticeKind::Timeout,
            SyncError::Config { .. } | SyncError::File { .. } => NoticeKind::Config,
        };
        Self { kind, message: error.to_string() }
    }
}

/// Running counters for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ChannelStats {
    /// Camera requests actually transmitted
    pub sends: u64,
    /// Send attempts dropped because a request was already in flight
    pub skipped_sends: u64,
    pub frames: u64,
    pub decode_failures: u64,
    pub server_errors: u64,
    pub timeouts: u64,
    /// Responses ignored because nothing was in flight
    pub stale_messages: u64,
}

/// Everything an observer can learn about a channel at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStatus {
    pub state: ConnectionState,
    pub ready: bool,
    pub in_flight: bool,
    pub params: Option<SessionParams>,
    pub last_notice: Option<ChannelNotice>,
    pub last_latency: Option<Duration>,
    /// Exponentially weighted moving average of frame latency
    pub average_latency: Option<Duration>,
    pub stats: ChannelStats,
}

impl Default for ChannelStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Closed,
            ready: false,
            in_flight: false,
            params: None,
            last_notice: None,
            last_latency: None,
            average_latency: None,
            stats: ChannelStats::default(),
        }
    }
}

impl ChannelStatus {
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }
}
