//! Camera pose sources.
//!
//! The drive loop asks a [`PoseSource`] for the current pose once per tick.
//! Interactive input handling (mouse orbit, touch zoom) lives outside this
//! crate; it either drives an [`OrbitPose`] directly or publishes poses through
//! a `watch` channel, which is itself a pose source.

use std::time::Duration;
use tokio::sync::watch;

use crate::types::CameraPose;

/// Supplies the camera pose for each tick of the drive loop.
pub trait PoseSource: Send + 'static {
    /// Current pose. `elapsed` is the wall time since the previous call.
    fn current_pose(&mut self, elapsed: Duration) -> CameraPose;
}

/// A camera that never moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPose(pub CameraPose);

impl PoseSource for FixedPose {
    fn current_pose(&mut self, _elapsed: Duration) -> CameraPose {
        self.0
    }
}

impl PoseSource for watch::Receiver<CameraPose> {
    fn current_pose(&mut self, _elapsed: Duration) -> CameraPose {
        *self.borrow_and_update()
    }
}

const MAX_ELEVATION_DEG: f32 = 89.9;

/// Orbit camera on a sphere around a target point.
///
/// Elevation and azimuth are in degrees. Zero elevation and azimuth put the
/// camera on the +Z axis; positive elevation moves it towards -Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitPose {
    elevation: f32,
    azimuth: f32,
    radius: f32,
    target: [f32; 3],
    min_radius: f32,
    /// Degrees of azimuth added per second of wall time
    spin: f32,
}

impl Default for OrbitPose {
    fn default() -> Self {
        Self::new(0.0, 0.0, 2.0)
    }
}

impl OrbitPose {
    pub fn new(elevation: f32, azimuth: f32, radius: f32) -> Self {
        Self {
            elevation: elevation.clamp(-MAX_ELEVATION_DEG, MAX_ELEVATION_DEG),
            azimuth: azimuth.rem_euclid(360.0),
            radius: radius.max(0.01),
            target: [0.0; 3],
            min_radius: 0.01,
            spin: 0.0,
        }
    }

    /// Rotate continuously at `degrees_per_second`.
    pub fn with_auto_rotate(mut self, degrees_per_second: f32) -> Self {
        self.spin = degrees_per_second;
        self
    }

    pub fn with_target(mut self, target: [f32; 3]) -> Self {
        self.target = target;
        self
    }

    /// Rotate around the target.
    pub fn orbit(&mut self, delta_azimuth: f32, delta_elevation: f32) {
        self.azimuth = (self.azimuth + delta_azimuth).rem_euclid(360.0);
        self.elevation =
            (self.elevation + delta_elevation).clamp(-MAX_ELEVATION_DEG, MAX_ELEVATION_DEG);
    }

    /// Scale the distance to the target; factors below 1 move closer.
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.radius = (self.radius * factor).max(self.min_radius);
        }
    }

    /// Move camera and target together.
    pub fn pan(&mut self, offset: [f32; 3]) {
        for (axis, delta) in self.target.iter_mut().zip(offset) {
            *axis += delta;
        }
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn pose(&self) -> CameraPose {
        let elevation = self.elevation.to_radians();
        let azimuth = self.azimuth.to_radians();
        let position = [
            self.target[0] + self.radius * elevation.cos() * azimuth.sin(),
            self.target[1] - self.radius * elevation.sin(),
            self.target[2] + self.radius * elevation.cos() * azimuth.cos(),
        ];
        CameraPose::new(position, self.target)
    }
}

impl PoseSource for OrbitPose {
    fn current_pose(&mut self, elapsed: Duration) -> CameraPose {
        if self.spin != 0.0 {
            self.orbit(self.spin * elapsed.as_secs_f32(), 0.0);
        }
        self.pose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: [f32; 3], expected: [f32; 3]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-4, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn default_orbit_sits_on_positive_z() {
        assert_close(OrbitPose::default().pose().position, [0.0, 0.0, 2.0]);
    }

    #[test]
    fn quarter_turn_moves_to_positive_x() {
        let mut orbit = OrbitPose::default();
        orbit.orbit(90.0, 0.0);
        assert_close(orbit.pose().position, [2.0, 0.0, 0.0]);
    }

    #[test]
    fn positive_elevation_looks_down_from_negative_y() {
        let orbit = OrbitPose::new(30.0, 0.0, 2.0);
        let pose = orbit.pose();
        assert!(pose.position[1] < 0.0);
        assert!((pose.distance() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn elevation_is_clamped_short_of_the_poles() {
        let mut orbit = OrbitPose::default();
        orbit.orbit(0.0, 500.0);
        assert_eq!(orbit.elevation(), MAX_ELEVATION_DEG);
    }

    #[test]
    fn zoom_respects_minimum_radius_and_ignores_bad_factors() {
        let mut orbit = OrbitPose::default();
        orbit.zoom(0.5);
        assert!((orbit.radius() - 1.0).abs() < 1e-6);
        orbit.zoom(1e-9);
        assert_eq!(orbit.radius(), 0.01);
        orbit.zoom(f32::NAN);
        orbit.zoom(-2.0);
        assert_eq!(orbit.radius(), 0.01);
    }

    #[test]
    fn pan_moves_target_and_keeps_distance() {
        let mut orbit = OrbitPose::default();
        orbit.pan([1.0, 0.0, -1.0]);
        let pose = orbit.pose();
        assert_close(pose.target, [1.0, 0.0, -1.0]);
        assert_close(pose.position, [1.0, 0.0, 1.0]);
    }

    #[test]
    fn auto_rotate_advances_with_elapsed_time() {
        let mut orbit = OrbitPose::default().with_auto_rotate(90.0);
        orbit.current_pose(Duration::from_millis(500));
        assert!((orbit.azimuth() - 45.0).abs() < 1e-3);
    }

    #[test]
    fn watch_receiver_yields_latest_pose() {
        let (tx, mut rx) = watch::channel(CameraPose::default());
        let moved = CameraPose::new([1.0, 2.0, 3.0], [0.0; 3]);
        tx.send(moved).unwrap();
        assert_eq!(rx.current_pose(Duration::ZERO), moved);
    }
}
