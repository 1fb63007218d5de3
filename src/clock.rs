//! Virtual playback clock.
//!
//! The clock advances a logical time position that selects which of the
//! server's `T` time steps to render. It runs on the drive loop's refresh
//! cadence and never waits for the network: whatever the server has or has not
//! rendered, time keeps moving while playing.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Whether virtual time follows the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum PlaybackState {
    Playing,
    Paused,
}

/// Published view of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ClockSnapshot {
    pub time: f64,
    pub state: PlaybackState,
    pub frame_count: u32,
}

/// Wrap `time` into `[0, frame_count)`.
///
/// A frame count of zero is treated as one. Non-finite input maps to zero.
pub fn wrap_time(time: f64, frame_count: u32) -> f64 {
    let period = f64::from(frame_count.max(1));
    if !time.is_finite() {
        return 0.0;
    }
    let wrapped = time.rem_euclid(period);
    // rem_euclid can round up to exactly `period` for tiny negative inputs
    if wrapped >= period { 0.0 } else { wrapped }
}

/// Two-state playback clock over `T` time steps.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    state: PlaybackState,
    time: f64,
    frame_count: u32,
    fps: f64,
}

impl PlaybackClock {
    /// Create a playing clock at time 0.
    pub fn new(frame_count: u32, fps: f64) -> Self {
        Self { state: PlaybackState::Playing, time: 0.0, frame_count: frame_count.max(1), fps }
    }

    /// Advance by `elapsed` wall time and return the new virtual time.
    ///
    /// While playing, time moves by `elapsed_seconds * fps`; while paused it
    /// stays where it was pinned.
    pub fn tick(&mut self, elapsed: Duration) -> f64 {
        if self.state == PlaybackState::Playing {
            self.time = wrap_time(self.time + elapsed.as_secs_f64() * self.fps, self.frame_count);
        }
        self.time
    }

    /// Resume from the current position. No catch-up for time spent paused.
    pub fn play(&mut self) {
        if self.state != PlaybackState::Playing {
            debug!(time = self.time, "Playback resumed");
            self.state = PlaybackState::Playing;
        }
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Paused {
            debug!(time = self.time, "Playback paused");
            self.state = PlaybackState::Paused;
        }
    }

    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => self.play(),
        }
    }

    /// Pin time to a scrubber value. Scrubbing pauses playback.
    pub fn scrub(&mut self, time: f64) {
        self.pause();
        self.time = wrap_time(time, self.frame_count);
    }

    /// Adopt a new frame count, re-wrapping the current position.
    pub fn set_frame_count(&mut self, frame_count: u32) {
        let frame_count = frame_count.max(1);
        if frame_count != self.frame_count {
            debug!(from = self.frame_count, to = frame_count, "Frame count changed");
            self.frame_count = frame_count;
            self.time = wrap_time(self.time, frame_count);
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot { time: self.time, state: self.state, frame_count: self.frame_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn advancing_past_the_end_wraps() {
        let mut clock = PlaybackClock::new(10, 1.0);
        clock.scrub(9.5);
        clock.play();
        let time = clock.tick(Duration::from_secs(1));
        assert!((time - 0.5).abs() < 1e-9, "got {time}");
    }

    #[test]
    fn playing_advances_by_elapsed_times_fps() {
        let mut clock = PlaybackClock::new(100, 24.0);
        let time = clock.tick(Duration::from_millis(500));
        assert!((time - 12.0).abs() < 1e-9);
    }

    #[test]
    fn paused_clock_holds_its_time() {
        let mut clock = PlaybackClock::new(24, 24.0);
        clock.tick(Duration::from_millis(250));
        let pinned = clock.time();
        clock.pause();

        for _ in 0..120 {
            clock.tick(Duration::from_millis(16));
        }
        assert_eq!(clock.time(), pinned);
    }

    #[test]
    fn scrub_pauses_and_resume_does_not_catch_up() {
        let mut clock = PlaybackClock::new(24, 24.0);
        clock.scrub(5.0);
        assert_eq!(clock.state(), PlaybackState::Paused);

        clock.tick(Duration::from_secs(3));
        assert_eq!(clock.time(), 5.0);

        clock.play();
        let time = clock.tick(Duration::from_millis(125));
        assert!((time - 8.0).abs() < 1e-9);
    }

    #[test]
    fn scrub_value_is_wrapped() {
        let mut clock = PlaybackClock::new(10, 24.0);
        clock.scrub(-0.5);
        assert!((clock.time() - 9.5).abs() < 1e-9);
        clock.scrub(23.0);
        assert!((clock.time() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn shrinking_frame_count_rewraps() {
        let mut clock = PlaybackClock::new(100, 24.0);
        clock.scrub(30.0);
        clock.set_frame_count(24);
        assert!((clock.time() - 6.0).abs() < 1e-9);
        assert_eq!(clock.snapshot().frame_count, 24);
    }

    #[test]
    fn toggle_flips_state() {
        let mut clock = PlaybackClock::new(10, 24.0);
        clock.toggle();
        assert!(!clock.is_playing());
        clock.toggle();
        assert!(clock.is_playing());
    }

    #[test]
    fn degenerate_inputs_stay_in_range() {
        assert_eq!(wrap_time(f64::NAN, 10), 0.0);
        assert_eq!(wrap_time(f64::INFINITY, 10), 0.0);
        assert_eq!(wrap_time(3.7, 0), wrap_time(3.7, 1));
        let tiny = wrap_time(-1e-18, 10);
        assert!((0.0..10.0).contains(&tiny));
    }

    proptest! {
        #[test]
        fn wrapped_time_is_always_in_range(
            start in -1.0e6f64..1.0e6,
            frame_count in 1u32..10_000,
        ) {
            let time = wrap_time(start, frame_count);
            prop_assert!(time >= 0.0);
            prop_assert!(time < f64::from(frame_count));
        }

        #[test]
        fn playing_clock_never_leaves_range(
            frame_count in 1u32..500,
            fps in 0.1f64..240.0,
            steps in prop::collection::vec(0u64..5_000, 1..50),
        ) {
            let mut clock = PlaybackClock::new(frame_count, fps);
            for ms in steps {
                let time = clock.tick(Duration::from_millis(ms));
                prop_assert!((0.0..f64::from(frame_count)).contains(&time));
            }
        }

        #[test]
        fn pause_pins_time_for_any_tick_sequence(
            warmup_ms in 0u64..10_000,
            steps in prop::collection::vec(1u64..1_000, 1..100),
        ) {
            let mut clock = PlaybackClock::new(48, 24.0);
            clock.tick(Duration::from_millis(warmup_ms));
            clock.pause();
            let pinned = clock.time();
            for ms in steps {
                prop_assert_eq!(clock.tick(Duration::from_millis(ms)), pinned);
            }
        }
    }
}
