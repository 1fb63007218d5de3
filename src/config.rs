//! Client configuration.
//!
//! Values start from [`ClientConfig::default`], can be loaded from YAML, and
//! can be overridden from `CAMSYNC_*` environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `CAMSYNC_URL` | `url` |
//! | `CAMSYNC_TARGET_FPS` | `target_fps` |
//! | `CAMSYNC_REFRESH_HZ` | `refresh_hz` |
//! | `CAMSYNC_RESPONSE_TIMEOUT_MS` | `response_timeout_ms` |
//!
//! ```rust
//! use camsync::ClientConfig;
//!
//! let config = ClientConfig::from_yaml_str("url: ws://render-box:8765\ntarget_fps: 12\n")?;
//! assert_eq!(config.target_fps, 12.0);
//! assert_eq!(config.width, 512);
//! # Ok::<(), camsync::SyncError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::types::Viewport;
use crate::{Result, SyncError};

/// Tunables for one remote-rendering client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// WebSocket URL of the render server
    pub url: String,

    /// Playback rate of virtual time, and the pacing rate for requests
    pub target_fps: f64,

    /// Rate of the local drive loop
    pub refresh_hz: f64,

    pub width: u32,
    pub height: u32,

    /// Vertical field of view in degrees
    pub fov: f32,

    pub znear: Option<f32>,
    pub zfar: Option<f32>,

    /// Frame count used until the server's handshake announces the real one
    pub default_frame_count: u32,

    /// Force-clear an unanswered request after this long; 0 disables
    pub response_timeout_ms: u64,

    pub connect_timeout_ms: u64,

    /// A request write that has not completed after this long closes the connection
    pub send_timeout_ms: u64,

    /// Largest inbound message accepted by the transport, in bytes
    pub max_message_size: usize,

    /// Treat a server `error` as the answer to the outstanding request
    pub release_on_server_error: bool,

    /// Keep the configured viewport and fov instead of adopting the handshake's
    pub pin_viewport: bool,

    /// Start with the playback clock paused at time 0
    pub start_paused: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8765".to_string(),
            target_fps: 24.0,
            refresh_hz: 60.0,
            width: 512,
            height: 512,
            fov: 49.1,
            znear: None,
            zfar: None,
            default_frame_count: 1,
            response_timeout_ms: 2_000,
            connect_timeout_ms: 5_000,
            send_timeout_ms: 1_000,
            max_message_size: 1 << 23,
            release_on_server_error: false,
            pin_viewport: false,
            start_paused: false,
        }
    }
}

impl ClientConfig {
    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| {
            SyncError::config_invalid_with_source("failed to parse YAML config", Box::new(e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| SyncError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), "Loaded client config");
        Self::from_yaml_str(&yaml)
    }

    /// Apply `CAMSYNC_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup, then re-validate.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CAMSYNC_URL") {
            self.url = url;
        }
        if let Some(value) = lookup("CAMSYNC_TARGET_FPS") {
            self.target_fps = parse_override("CAMSYNC_TARGET_FPS", &value)?;
        }
        if let Some(value) = lookup("CAMSYNC_REFRESH_HZ") {
            self.refresh_hz = parse_override("CAMSYNC_REFRESH_HZ", &value)?;
        }
        if let Some(value) = lookup("CAMSYNC_RESPONSE_TIMEOUT_MS") {
            self.response_timeout_ms = parse_override("CAMSYNC_RESPONSE_TIMEOUT_MS", &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(SyncError::config_invalid(format!(
                "target_fps must be positive, got {}",
                self.target_fps
            )));
        }
        if !(self.refresh_hz.is_finite() && self.refresh_hz > 0.0) {
            return Err(SyncError::config_invalid(format!(
                "refresh_hz must be positive, got {}",
                self.refresh_hz
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SyncError::config_invalid(format!(
                "viewport must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(SyncError::config_invalid(format!(
                "fov must be within (0, 180) degrees, got {}",
                self.fov
            )));
        }
        if let (Some(near), Some(far)) = (self.znear, self.zfar) {
            if !(near > 0.0 && far > near) {
                return Err(SyncError::config_invalid(format!(
                    "clip planes must satisfy 0 < znear < zfar, got {near}..{far}"
                )));
            }
        }
        if self.send_timeout_ms == 0 {
            return Err(SyncError::config_invalid("send_timeout_ms must be at least 1"));
        }
        if self.default_frame_count == 0 {
            return Err(SyncError::config_invalid("default_frame_count must be at least 1"));
        }
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(SyncError::config_invalid(format!(
                "url must use the ws:// or wss:// scheme, got {:?}",
                self.url
            )));
        }
        Ok(())
    }

    /// Minimum spacing between two requests: `1000 / target_fps` milliseconds.
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_hz)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        (self.response_timeout_ms > 0).then(|| Duration::from_millis(self.response_timeout_ms))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().map_err(|e: T::Err| {
        SyncError::config_invalid_with_source(format!("invalid value for {key}: {value:?}"), Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_message_size, 8 * 1024 * 1024);
        assert_eq!(config.response_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn send_interval_follows_target_fps() {
        let config = ClientConfig { target_fps: 20.0, ..Default::default() };
        assert_eq!(config.send_interval(), Duration::from_millis(50));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ClientConfig::from_yaml_str(
            "url: ws://gpu-box:9000\nwidth: 1024\nheight: 576\nzfar: 100.0\nznear: 0.1\n",
        )
        .unwrap();

        assert_eq!(config.url, "ws://gpu-box:9000");
        assert_eq!(config.viewport(), Viewport::new(1024, 576));
        assert_eq!(config.target_fps, 24.0);
        assert_eq!(config.zfar, Some(100.0));
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        let err = ClientConfig::from_yaml_str("target_fsp: 30\n").unwrap_err();
        assert!(matches!(err, SyncError::Config { .. }));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for yaml in [
            "target_fps: 0\n",
            "refresh_hz: -1\n",
            "width: 0\n",
            "fov: 180\n",
            "default_frame_count: 0\n",
            "send_timeout_ms: 0\n",
            "znear: 5.0\nzfar: 1.0\n",
            "url: http://localhost:8765\n",
        ] {
            assert!(ClientConfig::from_yaml_str(yaml).is_err(), "accepted {yaml:?}");
        }
    }

    #[test]
    fn overrides_apply_and_revalidate() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CAMSYNC_URL", "ws://10.0.0.5:8765"),
            ("CAMSYNC_TARGET_FPS", "30"),
            ("CAMSYNC_RESPONSE_TIMEOUT_MS", "0"),
        ]);
        let config = ClientConfig::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.url, "ws://10.0.0.5:8765");
        assert_eq!(config.target_fps, 30.0);
        assert_eq!(config.response_timeout(), None);

        let bad = ClientConfig::default()
            .with_overrides_from(|key| (key == "CAMSYNC_TARGET_FPS").then(|| "fast".to_string()));
        assert!(matches!(bad, Err(SyncError::Config { .. })));
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let err = ClientConfig::from_file("/nonexistent/camsync.yaml").unwrap_err();
        assert!(matches!(err, SyncError::File { .. }));
    }
}
