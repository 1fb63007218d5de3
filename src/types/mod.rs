//! Core types shared by the channel, the drive loop and observers.
//!
//! ## Overview
//!
//! - [`CameraState`] is the outbound request: pose, field of view, viewport and
//!   virtual time
//! - [`Frame`] is the inbound result: a [`DecodedImage`] plus the round-trip
//!   latency that produced it
//! - [`SessionParams`] holds what the server announced in its handshake
//! - [`ChannelStatus`] is the observable snapshot published after every state
//!   change, including the last [`ChannelNotice`] and running [`ChannelStats`]
//!
//! ## Usage Example
//!
//! ```rust
//! use camsync::types::{CameraPose, CameraState, Viewport};
//!
//! let pose = CameraPose::new([0.0, 0.5, 2.0], [0.0, 0.0, 0.0]);
//! let state = CameraState::new(pose, 49.1, Viewport::new(512, 512), 3.25)
//!     .with_clip_planes(0.01, 100.0);
//!
//! assert_eq!(state.viewport.aspect(), 1.0);
//! assert_eq!(state.znear, Some(0.01));
//! ```

mod camera;
mod frame;
mod status;

pub use camera::{CameraPose, CameraState, Viewport};
pub use frame::{DecodedImage, Frame};
pub use status::{
    ChannelNotice, ChannelStats, ChannelStatus, ConnectionState, ImageFormat, NoticeKind,
    SessionParams,
};
