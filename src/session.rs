//! Camera-sync session state machine.
//!
//! [`Session`] holds all flow-control state of one channel: the connection
//! state, the `ready` and in-flight flags, the last-send timestamp and the
//! parameters negotiated in the handshake. It performs no I/O. The driver feeds
//! it events (ticks, wire messages, decode completions) and carries out the
//! sends it approves, so every rule below can be exercised without a network.
//!
//! ## Flow control
//!
//! At most one camera request is awaiting an answer at any time. A send attempt
//! while one is outstanding is dropped, not queued: a slow server makes the
//! client skip requests, so the next request always carries the freshest camera
//! state instead of replaying a backlog.
//!
//! The in-flight flag is released by:
//! - a binary reply, once its decode completes (successfully or not)
//! - `close()` and connection loss
//! - the response timeout, when configured
//! - a server `error`, only when `release_on_server_error` is set
//!
//! ## Generations
//!
//! Decoding happens off the driver task. Every decode job carries the session
//! generation it was issued under; the generation moves on at open, close and
//! timeout, and completions from an older generation are discarded.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::decode::{decode_image, decode_off_thread};
use crate::protocol::{self, ControlMessage};
use crate::types::{
    CameraState, ChannelNotice, ChannelStats, ChannelStatus, ConnectionState, DecodedImage, Frame,
    ImageFormat, SessionParams,
};
use crate::{Result, SyncError};

/// Weight of the newest sample in the moving latency average
const LATENCY_SMOOTHING: f64 = 0.2;

/// Flow-control options for a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionOptions {
    /// Force-release an unanswered request after this long
    pub response_timeout: Option<Duration>,
    /// Treat a server `error` as the answer to the outstanding request
    pub release_on_server_error: bool,
}

impl From<&ClientConfig> for SessionOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            response_timeout: config.response_timeout(),
            release_on_server_error: config.release_on_server_error,
        }
    }
}

/// Encoded frame bytes waiting to be decoded.
#[derive(Debug, Clone)]
pub struct DecodeJob {
    generation: u64,
    format: Option<ImageFormat>,
    bytes: Bytes,
}

impl DecodeJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    /// Decode on the blocking pool.
    pub async fn run(self) -> DecodeOutcome {
        let result = decode_off_thread(self.bytes, self.format).await;
        DecodeOutcome { generation: self.generation, result }
    }

    /// Decode on the current thread.
    pub fn run_inline(self) -> DecodeOutcome {
        let result = decode_image(&self.bytes, self.format);
        DecodeOutcome { generation: self.generation, result }
    }
}

/// Result of a [`DecodeJob`], tagged with the generation it belongs to.
#[derive(Debug)]
pub struct DecodeOutcome {
    pub generation: u64,
    pub result: Result<DecodedImage>,
}

/// Flow-control state of one camera-sync channel.
pub struct Session {
    state: ConnectionState,
    ready: bool,
    in_flight: bool,
    /// A reply arrived and is being decoded; the request is still in flight
    decode_pending: bool,
    last_send: Option<Instant>,
    requested_time: f64,
    params: Option<SessionParams>,
    generation: u64,
    sequence: u64,
    options: SessionOptions,
    stats: ChannelStats,
    last_notice: Option<ChannelNotice>,
    last_latency: Option<Duration>,
    average_latency: Option<Duration>,
    status: watch::Sender<ChannelStatus>,
}

impl Session {
    /// Create a closed session.
    pub fn new(options: SessionOptions) -> Self {
        let (status, _) = watch::channel(ChannelStatus::default());
        Self {
            state: ConnectionState::Closed,
            ready: false,
            in_flight: false,
            decode_pending: false,
            last_send: None,
            requested_time: 0.0,
            params: None,
            generation: 0,
            sequence: 0,
            options,
            stats: ChannelStats::default(),
            last_notice: None,
            last_latency: None,
            average_latency: None,
            status,
        }
    }

    /// Observe status changes.
    pub fn subscribe(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }

    /// Mark a connection attempt as underway.
    pub fn begin_connect(&mut self) {
        debug!("Session connecting");
        self.state = ConnectionState::Connecting;
        self.ready = false;
        self.in_flight = false;
        self.decode_pending = false;
        self.publish();
    }

    /// The transport is open: start a fresh session, ready to send.
    pub fn open(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Open;
        self.ready = true;
        self.in_flight = false;
        self.decode_pending = false;
        self.last_send = None;
        self.params = None;
        info!(generation = self.generation, "Session open");
        self.publish();
    }

    /// End the session. Releases any outstanding request unconditionally.
    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            info!(generation = self.generation, "Session closed");
        }
        self.generation += 1;
        self.state = ConnectionState::Closed;
        self.ready = false;
        self.in_flight = false;
        self.decode_pending = false;
        self.publish();
    }

    /// The transport failed: close and surface the cause.
    pub fn connection_lost(&mut self, error: &SyncError) {
        warn!("Connection lost: {}", error);
        self.last_notice = Some(ChannelNotice::from(error));
        self.close();
    }

    /// Open, ready and nothing in flight.
    pub fn can_send(&self) -> bool {
        self.state == ConnectionState::Open && self.ready && !self.in_flight
    }

    /// Claim the single request slot and serialize `camera` for sending.
    ///
    /// Returns `None` without side effects on the flags when the session is not
    /// open and ready, or a request is already in flight. The caller transmits
    /// the returned text.
    pub fn try_send(&mut self, camera: &CameraState, now: Instant) -> Option<String> {
        if !self.can_send() {
            if self.state == ConnectionState::Open && self.in_flight {
                self.stats.skipped_sends += 1;
                trace!(skipped = self.stats.skipped_sends, "Request in flight, skipping send");
            }
            return None;
        }

        let payload = match protocol::encode_camera(camera) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping camera request: {}", e);
                self.last_notice = Some(ChannelNotice::from(&e));
                self.publish();
                return None;
            }
        };

        self.in_flight = true;
        self.last_send = Some(now);
        self.requested_time = camera.time;
        self.stats.sends += 1;
        trace!(time = camera.time, sends = self.stats.sends, "Camera request approved");
        self.publish();
        Some(payload)
    }

    /// Handle a text message from the server.
    ///
    /// Returns the parsed message when it was accepted. Malformed messages are
    /// logged and surfaced as a protocol notice.
    pub fn on_text_message(&mut self, raw: &str) -> Option<ControlMessage> {
        if self.state != ConnectionState::Open {
            trace!("Ignoring text message on a session that is not open");
            return None;
        }

        let message = match protocol::parse_control(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(raw, "Ignoring malformed control message: {}", e);
                self.last_notice = Some(ChannelNotice::from(&e));
                self.publish();
                return None;
            }
        };

        match &message {
            ControlMessage::Hello { .. } => {
                let params = message.session_params();
                if self.params.is_some() && self.params != params {
                    debug!(?params, "Handshake repeated with new parameters");
                }
                if let Some(params) = params {
                    info!(
                        frame_count = params.frame_count,
                        format = %params.format,
                        width = params.width,
                        height = params.height,
                        fov = params.fov,
                        "Handshake received"
                    );
                }
                self.params = params;
            }
            ControlMessage::Error { message: text } => {
                if !self.in_flight {
                    self.stats.stale_messages += 1;
                    debug!(message = %text, "Ignoring server error with no request in flight");
                    self.publish();
                    return None;
                }
                let error = SyncError::server_reported(text.clone());
                warn!("{}", error);
                self.stats.server_errors += 1;
                self.last_notice = Some(ChannelNotice::from(&error));
                if self.options.release_on_server_error && !self.decode_pending {
                    self.in_flight = false;
                }
            }
        }

        self.publish();
        Some(message)
    }

    /// Handle a binary frame from the server.
    ///
    /// Returns the decode job to run when the frame answers the request in
    /// flight. The request stays in flight until [`Session::complete_decode`].
    pub fn on_binary_message(&mut self, bytes: Bytes) -> Option<DecodeJob> {
        if self.state != ConnectionState::Open {
            trace!("Ignoring binary message on a session that is not open");
            return None;
        }
        if !self.in_flight || self.decode_pending {
            self.stats.stale_messages += 1;
            debug!(len = bytes.len(), "Ignoring frame with no request awaiting it");
            self.publish();
            return None;
        }

        self.decode_pending = true;
        trace!(len = bytes.len(), generation = self.generation, "Frame received, decoding");
        Some(DecodeJob { generation: self.generation, format: self.format(), bytes })
    }

    /// Apply a finished decode.
    ///
    /// Releases the in-flight flag whatever the decode result; on success
    /// returns the frame to present, with latency measured up to `now`.
    pub fn complete_decode(&mut self, outcome: DecodeOutcome, now: Instant) -> Option<Frame> {
        if outcome.generation != self.generation || !self.decode_pending {
            debug!(
                job_generation = outcome.generation,
                generation = self.generation,
                "Discarding stale decode result"
            );
            return None;
        }

        self.decode_pending = false;
        self.in_flight = false;

        let frame = match outcome.result {
            Ok(image) => {
                let latency = self.last_send.map_or(Duration::ZERO, |sent| now.saturating_duration_since(sent));
                self.record_latency(latency);
                self.sequence += 1;
                self.stats.frames += 1;
                trace!(sequence = self.sequence, latency_ms = latency.as_millis() as u64, "Frame ready");
                Some(Frame { image, latency, time: self.requested_time, sequence: self.sequence })
            }
            Err(e) => {
                warn!("Dropping undecodable frame: {}", e);
                self.stats.decode_failures += 1;
                self.last_notice = Some(ChannelNotice::from(&e));
                None
            }
        };

        self.publish();
        frame
    }

    /// Release a request that has gone unanswered past the response timeout.
    ///
    /// Returns `true` when a request was released.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        let (Some(timeout), Some(sent)) = (self.options.response_timeout, self.last_send) else {
            return false;
        };
        if !self.in_flight || now.saturating_duration_since(sent) < timeout {
            return false;
        }

        let error = SyncError::timeout(timeout);
        warn!("No response to camera request: {}", error);
        self.generation += 1;
        self.in_flight = false;
        self.decode_pending = false;
        self.stats.timeouts += 1;
        self.last_notice = Some(ChannelNotice::from(&error));
        self.publish();
        true
    }

    fn record_latency(&mut self, latency: Duration) {
        self.last_latency = Some(latency);
        self.average_latency = Some(match self.average_latency {
            None => latency,
            Some(average) => {
                let average = average.as_secs_f64();
                Duration::from_secs_f64(
                    average + LATENCY_SMOOTHING * (latency.as_secs_f64() - average),
                )
            }
        });
    }

    fn publish(&self) {
        self.status.send_replace(ChannelStatus {
            state: self.state,
            ready: self.ready,
            in_flight: self.in_flight,
            params: self.params,
            last_notice: self.last_notice.clone(),
            last_latency: self.last_latency,
            average_latency: self.average_latency,
            stats: self.stats,
        });
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    pub fn params(&self) -> Option<SessionParams> {
        self.params
    }

    /// Negotiated image format, if the handshake has arrived.
    pub fn format(&self) -> Option<ImageFormat> {
        self.params.map(|p| p.format)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn status(&self) -> ChannelStatus {
        self.status.borrow().clone()
    }
}
