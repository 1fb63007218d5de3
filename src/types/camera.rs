//! Camera pose and request state

use serde::{Deserialize, Serialize};

/// Where the camera sits and what it looks at, in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct CameraPose {
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl CameraPose {
    pub fn new(position: [f32; 3], target: [f32; 3]) -> Self {
        Self { position, target }
    }

    /// Distance between the camera and its look-at target.
    pub fn distance(&self) -> f32 {
        let [dx, dy, dz] = [
            self.position[0] - self.target[0],
            self.position[1] - self.target[1],
            self.position[2] - self.target[2],
        ];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.position.iter().chain(self.target.iter()).all(|v| v.is_finite())
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self { position: [0.0, 0.0, 2.0], target: [0.0, 0.0, 0.0] }
    }
}

/// Output resolution requested from the server, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 { 1.0 } else { self.width as f32 / self.height as f32 }
    }
}

/// Snapshot of everything the server needs to render one frame.
///
/// Built by the drive loop each time a request is due; the channel only ever
/// reads it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub pose: CameraPose,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub viewport: Viewport,
    /// Virtual playback time in `[0, T)`
    pub time: f64,
    pub znear: Option<f32>,
    pub zfar: Option<f32>,
}

impl CameraState {
    pub fn new(pose: CameraPose, fov: f32, viewport: Viewport, time: f64) -> Self {
        Self { pose, fov, viewport, time, znear: None, zfar: None }
    }

    /// Attach explicit clip planes.
    pub fn with_clip_planes(mut self, znear: f32, zfar: f32) -> Self {
        self.znear = Some(znear);
        self.zfar = Some(zfar);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pose_matches_server_radius() {
        let pose = CameraPose::default();
        assert!((pose.distance() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn non_finite_pose_is_detected() {
        let pose = CameraPose::new([f32::NAN, 0.0, 1.0], [0.0; 3]);
        assert!(!pose.is_finite());
        assert!(CameraPose::default().is_finite());
    }

    #[test]
    fn zero_height_viewport_has_unit_aspect() {
        assert_eq!(Viewport::new(640, 0).aspect(), 1.0);
        assert_eq!(Viewport::new(1024, 512).aspect(), 2.0);
    }
}
