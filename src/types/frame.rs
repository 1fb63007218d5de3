//! Decoded frame types

use std::sync::Arc;
use std::time::Duration;

/// An RGBA8 bitmap decoded from a server payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 pixels (zero-copy via Arc)
    pub pixels: Arc<[u8]>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self { width, height, pixels: pixels.into() }
    }
}

/// A rendered frame ready for presentation.
///
/// Transient: handed to the presentation sink as soon as it is decoded.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DecodedImage,

    /// Time from sending the request to finishing the decode
    pub latency: Duration,

    /// Virtual time that was requested for this frame
    pub time: f64,

    /// Client-side frame counter, starting at 1
    pub sequence: u64,
}
