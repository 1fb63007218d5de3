//! Remote connection to a render server

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::ClockSnapshot;
use crate::config::ClientConfig;
use crate::driver::{Command, Driver, DriverChannels};
use crate::pose::{FixedPose, PoseSource};
use crate::sink::WatchSink;
use crate::transport::{Transport, WebSocketTransport};
use crate::types::{ChannelStatus, ConnectionState, Frame, Viewport};
use crate::{Result, SyncError};

/// Handle to a running camera-sync channel.
///
/// Dropping the handle stops the drive loop and closes the transport.
pub struct RemoteConnection {
    /// Latest presented frame
    frames: watch::Receiver<Option<Arc<Frame>>>,

    /// Channel status
    status: watch::Receiver<ChannelStatus>,

    /// Playback clock
    clock: watch::Receiver<ClockSnapshot>,

    /// Commands into the drive loop
    commands: mpsc::UnboundedSender<Command>,

    /// Cancellation token for stopping tasks
    cancel: CancellationToken,

    /// Pending outcome of the connection attempt, until someone awaits it
    connected: Option<oneshot::Receiver<Result<()>>>,
}

impl RemoteConnection {
    /// Connect to the configured server with a fixed camera.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Self::connect_with_pose(config, FixedPose::default()).await
    }

    /// Connect to the configured server, reading the camera from `pose`.
    ///
    /// Fails if the configuration is invalid or the WebSocket handshake does
    /// not complete within `connect_timeout_ms`. There is no automatic retry;
    /// watch [`status_updates`](Self::status_updates) and reconnect as needed.
    pub async fn connect_with_pose<P: PoseSource>(config: ClientConfig, pose: P) -> Result<Self> {
        let mut connection = Self::start(config, pose)?;
        connection.connected().await?;
        Ok(connection)
    }

    /// Start connecting in the background and return at once.
    ///
    /// The status reads `Connecting` until the handshake finishes, then `Open`,
    /// or `Closed` with a connection notice if it fails. Await
    /// [`connected`](Self::connected) for the outcome as a `Result`.
    pub fn start<P: PoseSource>(config: ClientConfig, pose: P) -> Result<Self> {
        config.validate()?;
        let url = config.url.clone();
        let max_message_size = config.max_message_size;
        let connect_timeout = config.connect_timeout();
        let connect = async move {
            let transport = WebSocketTransport::connect(&url, max_message_size, connect_timeout).await?;
            info!(url = %url, "Remote connection established");
            Ok::<_, SyncError>(transport)
        };
        Ok(Self::start_with(connect, pose, &config))
    }

    /// Start the channel over a transport produced by `connect`.
    pub fn start_with<F, T, P>(connect: F, pose: P, config: &ClientConfig) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Transport,
        P: PoseSource,
    {
        let (sink, frames) = WatchSink::new();
        Self::from_channels(frames, Driver::spawn_connecting(connect, pose, sink, config))
    }

    /// Run the channel over an already connected transport.
    pub fn with_transport<T, P>(transport: T, pose: P, config: &ClientConfig) -> Self
    where
        T: Transport,
        P: PoseSource,
    {
        let (sink, frames) = WatchSink::new();
        Self::from_channels(frames, Driver::spawn(transport, pose, sink, config))
    }

    fn from_channels(frames: watch::Receiver<Option<Arc<Frame>>>, channels: DriverChannels) -> Self {
        Self {
            frames,
            status: channels.status,
            clock: channels.clock,
            commands: channels.commands,
            cancel: channels.cancel,
            connected: Some(channels.connected),
        }
    }

    /// Wait for the connection attempt to finish.
    ///
    /// Returns the connect error on failure. Once the outcome has been taken,
    /// later calls answer from the current status instead.
    pub async fn connected(&mut self) -> Result<()> {
        if let Some(pending) = self.connected.take() {
            return pending
                .await
                .unwrap_or_else(|_| Err(SyncError::connection_failed("connection attempt was abandoned")));
        }
        let status = self.status();
        match status.state {
            ConnectionState::Open => Ok(()),
            _ => Err(SyncError::connection_failed(
                status.last_notice.map_or_else(|| "not connected".to_string(), |n| n.message),
            )),
        }
    }

    /// Stream of presented frames.
    ///
    /// Yields the latest frame when polled; frames produced faster than the
    /// consumer reads are skipped, not queued.
    pub fn frames(&self) -> impl Stream<Item = Arc<Frame>> + 'static {
        WatchStream::new(self.frames.clone()).filter_map(|opt| async move { opt })
    }

    /// Most recent frame, if any has been presented
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.frames.borrow().clone()
    }

    /// Current channel status snapshot
    pub fn status(&self) -> ChannelStatus {
        self.status.borrow().clone()
    }

    /// Status changes as a stream, starting with the current value
    pub fn status_updates(&self) -> impl Stream<Item = ChannelStatus> + 'static {
        WatchStream::new(self.status.clone())
    }

    /// Raw status receiver, for `changed()`/`wait_for()` style waiting
    pub fn status_receiver(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    /// Current playback clock snapshot
    pub fn clock(&self) -> ClockSnapshot {
        *self.clock.borrow()
    }

    /// Raw clock receiver
    pub fn clock_receiver(&self) -> watch::Receiver<ClockSnapshot> {
        self.clock.clone()
    }

    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn toggle_playback(&self) -> Result<()> {
        self.send(Command::TogglePlayback)
    }

    /// Pause and pin virtual time; wrapped into the current frame range.
    pub fn scrub(&self, time: f64) -> Result<()> {
        self.send(Command::Scrub(time))
    }

    /// Request a new stream resolution. Pins it against later handshakes.
    pub fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.send(Command::SetViewport(viewport))
    }

    pub fn set_fov(&self, fov: f32) -> Result<()> {
        self.send(Command::SetFov(fov))
    }

    /// Close the connection. The handle stays usable for status and clock.
    pub fn close(&self) -> Result<()> {
        self.send(Command::Close)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::connection_failed("drive loop is no longer running"))
    }
}

impl Drop for RemoteConnection {
    fn drop(&mut self) {
        debug!("Dropping remote connection");
        self.cancel.cancel();
    }
}
