//! Presentation sinks receive decoded frames.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

use crate::types::{Frame, Viewport};

/// Final stop for a decoded frame: a canvas blit, a texture upload, a file.
///
/// Called on the driver task; implementations must not block for long.
pub trait PresentationSink: Send + 'static {
    fn present(&mut self, frame: Frame, target: Viewport);
}

impl<F> PresentationSink for F
where
    F: FnMut(Frame, Viewport) + Send + 'static,
{
    fn present(&mut self, frame: Frame, target: Viewport) {
        self(frame, target)
    }
}

/// Publishes the latest frame on a `watch` channel.
///
/// Slow observers simply see fewer frames; nothing queues up.
pub struct WatchSink {
    frames: watch::Sender<Option<Arc<Frame>>>,
}

impl WatchSink {
    pub fn new() -> (Self, watch::Receiver<Option<Arc<Frame>>>) {
        let (frames, rx) = watch::channel(None);
        (Self { frames }, rx)
    }
}

impl PresentationSink for WatchSink {
    fn present(&mut self, frame: Frame, target: Viewport) {
        trace!(
            sequence = frame.sequence,
            width = frame.image.width,
            height = frame.image.height,
            target_width = target.width,
            target_height = target.height,
            "Presenting frame"
        );
        self.frames.send_replace(Some(Arc::new(frame)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DecodedImage;
    use std::time::Duration;

    fn frame(sequence: u64) -> Frame {
        Frame {
            image: DecodedImage::new(1, 1, vec![0, 0, 0, 255]),
            latency: Duration::from_millis(30),
            time: 0.0,
            sequence,
        }
    }

    #[test]
    fn watch_sink_keeps_only_the_latest_frame() {
        let (mut sink, rx) = WatchSink::new();
        assert!(rx.borrow().is_none());

        sink.present(frame(1), Viewport::new(1, 1));
        sink.present(frame(2), Viewport::new(1, 1));

        assert_eq!(rx.borrow().as_ref().map(|f| f.sequence), Some(2));
    }

    #[test]
    fn closures_are_sinks() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut sink = move |frame: Frame, _target: Viewport| {
            let _ = tx.send(frame.sequence);
        };
        sink.present(frame(7), Viewport::new(1, 1));
        assert_eq!(rx.try_recv().ok(), Some(7));
    }
}
