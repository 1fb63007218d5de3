//! Driver spawns and runs the camera-sync actor
//!
//! One task owns everything mutable: the [`Session`], the transport, the
//! playback clock and the pose source. Refresh ticks, wire messages, decode
//! completions and user commands are multiplexed with `tokio::select!` on that
//! task, so the in-flight flag never needs a lock. Results leave the task via
//! `watch` channels and the presentation sink.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::clock::{ClockSnapshot, PlaybackClock};
use crate::config::ClientConfig;
use crate::pose::PoseSource;
use crate::protocol::ControlMessage;
use crate::session::{DecodeOutcome, Session, SessionOptions};
use crate::sink::PresentationSink;
use crate::transport::{Transport, WireMessage};
use crate::types::{CameraState, ChannelStatus, Viewport};
use crate::{Result, SyncError};

/// User commands accepted by a running driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Play,
    Pause,
    TogglePlayback,
    /// Pause and pin virtual time to this value
    Scrub(f64),
    /// Request this resolution from now on, ignoring the handshake's
    SetViewport(Viewport),
    SetFov(f32),
    /// Close the connection; the clock keeps running
    Close,
}

/// Result of spawning the driver task
pub struct DriverChannels {
    /// Receiver for channel status updates
    pub status: watch::Receiver<ChannelStatus>,
    /// Receiver for playback clock updates
    pub clock: watch::Receiver<ClockSnapshot>,
    /// Sender for user commands
    pub commands: mpsc::UnboundedSender<Command>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Outcome of the connection attempt; dropped unsent if cancelled first
    pub connected: oneshot::Receiver<Result<()>>,
}

enum Event {
    Tick(Instant),
    Wire(crate::Result<Option<WireMessage>>),
    Decoded(DecodeOutcome),
    Command(Command),
}

/// What the drive loop currently asks the server to render.
struct View {
    viewport: Viewport,
    fov: f32,
    znear: Option<f32>,
    zfar: Option<f32>,
    /// Set once the caller chose a viewport; the handshake no longer overrides it
    pinned: bool,
}

/// Driver spawns and manages the camera-sync task
pub struct Driver;

impl Driver {
    /// Spawn the driver for an already connected transport.
    pub fn spawn<T, P, S>(transport: T, pose: P, sink: S, config: &ClientConfig) -> DriverChannels
    where
        T: Transport,
        P: PoseSource,
        S: PresentationSink,
    {
        Self::spawn_connecting(async move { Ok::<_, SyncError>(transport) }, pose, sink, config)
    }

    /// Spawn the driver and let it establish the transport itself.
    ///
    /// The status reads `Connecting` from the moment this returns. On success
    /// the session opens and the drive loop runs until the cancellation token
    /// fires or every command sender is dropped; a closed connection does not
    /// stop it, so the clock and status stay live for whoever retries. On
    /// failure the status turns `Closed` with a notice and the task ends.
    pub fn spawn_connecting<F, T, P, S>(
        connect: F,
        pose: P,
        sink: S,
        config: &ClientConfig,
    ) -> DriverChannels
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Transport,
        P: PoseSource,
        S: PresentationSink,
    {
        let mut session = Session::new(SessionOptions::from(config));
        session.begin_connect();
        let status = session.subscribe();
        let (connected_tx, connected) = oneshot::channel();

        let mut clock = PlaybackClock::new(config.default_frame_count, config.target_fps);
        if config.start_paused {
            clock.pause();
        }
        let (clock_tx, clock_rx) = watch::channel(clock.snapshot());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let view = View {
            viewport: config.viewport(),
            fov: config.fov,
            znear: config.znear,
            zfar: config.zfar,
            pinned: config.pin_viewport,
        };
        let pacing = Pacing {
            send_interval: config.send_interval(),
            refresh: config.refresh_interval(),
            send_timeout: config.send_timeout(),
        };

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = task_cancel.cancelled() => {
                    info!("Cancelled while connecting");
                    session.close();
                    return;
                }
                result = connect => result,
            };
            let transport = match result {
                Ok(transport) => {
                    session.open();
                    let _ = connected_tx.send(Ok(()));
                    transport
                }
                Err(e) => {
                    error!("Connection failed: {}", e);
                    session.connection_lost(&e);
                    let _ = connected_tx.send(Err(e));
                    return;
                }
            };

            Self::drive_task(
                DriveState { session, clock, view, transport, pose, sink },
                pacing,
                clock_tx,
                command_rx,
                task_cancel,
            )
            .await;
        });

        DriverChannels { status, clock: clock_rx, commands, cancel, connected }
    }

    async fn drive_task<T, P, S>(
        mut state: DriveState<T, P, S>,
        pacing: Pacing,
        clock_tx: watch::Sender<ClockSnapshot>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) where
        T: Transport,
        P: PoseSource,
        S: PresentationSink,
    {
        info!(
            send_interval_ms = pacing.send_interval.as_millis() as u64,
            refresh_ms = pacing.refresh.as_millis() as u64,
            "Drive loop started"
        );

        let mut ticker = interval(pacing.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let (decode_tx, mut decode_rx) = mpsc::unbounded_channel::<DecodeOutcome>();
        let mut last_tick = Instant::now();
        let mut transport_open = true;

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Drive loop cancelled");
                    break;
                }
                _ = ticker.tick() => Event::Tick(Instant::now()),
                result = state.transport.recv(), if transport_open => Event::Wire(result),
                Some(outcome) = decode_rx.recv() => Event::Decoded(outcome),
                command = commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => {
                        debug!("All command senders dropped, stopping");
                        break;
                    }
                },
            };

            match event {
                Event::Tick(now) => {
                    let elapsed = now.saturating_duration_since(last_tick);
                    last_tick = now;
                    if !state.tick(now, elapsed, &pacing, &mut transport_open).await {
                        continue;
                    }
                    clock_tx.send_replace(state.clock.snapshot());
                }
                Event::Wire(Ok(Some(WireMessage::Text(raw)))) => {
                    if state.on_text(&raw) {
                        clock_tx.send_replace(state.clock.snapshot());
                    }
                }
                Event::Wire(Ok(Some(WireMessage::Binary(bytes)))) => {
                    if let Some(job) = state.session.on_binary_message(bytes) {
                        let decode_tx = decode_tx.clone();
                        tokio::spawn(async move {
                            let _ = decode_tx.send(job.run().await);
                        });
                    }
                }
                Event::Wire(Ok(None)) => {
                    info!("Server closed the connection");
                    state.session.close();
                    transport_open = false;
                }
                Event::Wire(Err(e)) => {
                    error!("Transport error: {}", e);
                    state.session.connection_lost(&e);
                    transport_open = false;
                }
                Event::Decoded(outcome) => {
                    if let Some(frame) = state.session.complete_decode(outcome, Instant::now()) {
                        state.sink.present(frame, state.view.viewport);
                    }
                }
                Event::Command(command) => {
                    state.apply(command, pacing.send_timeout, &mut transport_open).await;
                    clock_tx.send_replace(state.clock.snapshot());
                }
            }
        }

        if transport_open {
            state.close_transport(pacing.send_timeout).await;
        }
        state.session.close();
        info!(stats = ?state.session.stats(), "Drive loop ended");
    }
}

struct Pacing {
    send_interval: Duration,
    refresh: Duration,
    /// Upper bound on any single write, so a stalled socket cannot stall the loop
    send_timeout: Duration,
}

fn valid_viewport(viewport: Viewport) -> bool {
    viewport.width > 0 && viewport.height > 0
}

fn valid_fov(fov: f32) -> bool {
    fov > 0.0 && fov < 180.0
}

struct DriveState<T, P, S> {
    session: Session,
    clock: PlaybackClock,
    view: View,
    transport: T,
    pose: P,
    sink: S,
}

impl<T, P, S> DriveState<T, P, S>
where
    T: Transport,
    P: PoseSource,
    S: PresentationSink,
{
    /// One refresh tick. Returns `false` if nothing observable changed.
    async fn tick(
        &mut self,
        now: Instant,
        elapsed: Duration,
        pacing: &Pacing,
        transport_open: &mut bool,
    ) -> bool {
        let before = self.clock.time();
        let time = self.clock.tick(elapsed);
        let pose = self.pose.current_pose(elapsed);

        self.session.check_timeout(now);

        let due = self.session.last_send().is_none_or(|sent| now.saturating_duration_since(sent) >= pacing.send_interval);
        if due && *transport_open {
            let camera = CameraState {
                pose,
                fov: self.view.fov,
                viewport: self.view.viewport,
                time,
                znear: self.view.znear,
                zfar: self.view.zfar,
            };
            if let Some(payload) = self.session.try_send(&camera, now) {
                trace!(time, "Sending camera request");
                let sent = match timeout(pacing.send_timeout, self.transport.send_text(payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::timeout(pacing.send_timeout)),
                };
                if let Err(e) = sent {
                    error!("Failed to send camera request: {}", e);
                    self.session.connection_lost(&e);
                    *transport_open = false;
                }
            }
        }

        time != before
    }

    /// Handle a control message. Returns `true` if the clock changed.
    fn on_text(&mut self, raw: &str) -> bool {
        let Some(message) = self.session.on_text_message(raw) else {
            return false;
        };
        let ControlMessage::Hello { frame_count, fov, width, height, .. } = message else {
            return false;
        };

        if !self.view.pinned {
            let viewport = Viewport::new(width, height);
            if valid_viewport(viewport) && valid_fov(fov) {
                self.view.viewport = viewport;
                self.view.fov = fov;
                debug!(width, height, fov, "Adopted server view parameters");
            } else {
                warn!(width, height, fov, "Handshake view is unusable, keeping current view");
            }
        }
        let changed = self.clock.frame_count() != frame_count.max(1);
        self.clock.set_frame_count(frame_count);
        changed
    }

    async fn apply(&mut self, command: Command, send_timeout: Duration, transport_open: &mut bool) {
        debug!(?command, "Applying command");
        match command {
            Command::Play => self.clock.play(),
            Command::Pause => self.clock.pause(),
            Command::TogglePlayback => self.clock.toggle(),
            Command::Scrub(time) => self.clock.scrub(time),
            Command::SetViewport(viewport) => {
                if valid_viewport(viewport) {
                    self.view.viewport = viewport;
                    self.view.pinned = true;
                } else {
                    warn!(?viewport, "Ignoring empty viewport");
                }
            }
            Command::SetFov(fov) => {
                if valid_fov(fov) {
                    self.view.fov = fov;
                    self.view.pinned = true;
                } else {
                    warn!(fov, "Ignoring out-of-range fov");
                }
            }
            Command::Close => {
                if *transport_open {
                    self.close_transport(send_timeout).await;
                    *transport_open = false;
                }
                self.session.close();
            }
        }
    }

    async fn close_transport(&mut self, limit: Duration) {
        match timeout(limit, self.transport.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to close transport: {}", e),
            Err(_) => warn!("Transport close timed out after {:?}", limit),
        }
    }
}
