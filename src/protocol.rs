//! Wire format spoken with the render server.
//!
//! Control traffic is JSON text tagged by a `type` field; rendered frames
//! travel as raw encoded image bytes in binary messages.
//!
//! Outbound, one message per request:
//!
//! ```text
//! {"type":"camera","pos":[x,y,z],"target":[x,y,z],"fov":49.1,
//!  "width":512,"height":512,"time":3.0}
//! ```
//!
//! Inbound, `hello` once near session start and `error` whenever a render
//! fails. Requests carry no id; a binary reply always answers the most recent
//! unanswered request, which holds only because the transport is ordered.

use serde::{Deserialize, Serialize};

use crate::types::{CameraState, ImageFormat, SessionParams};
use crate::{Result, SyncError};

/// Control messages the server may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Hello {
        #[serde(rename = "T")]
        frame_count: u32,
        fov: f32,
        format: ImageFormat,
        width: u32,
        height: u32,
    },
    Error {
        message: String,
    },
}

impl ControlMessage {
    /// Session parameters carried by a `hello`.
    pub fn session_params(&self) -> Option<SessionParams> {
        match *self {
            ControlMessage::Hello { frame_count, fov, format, width, height } => {
                Some(SessionParams { frame_count, fov, format, width, height })
            }
            ControlMessage::Error { .. } => None,
        }
    }
}

impl From<SessionParams> for ControlMessage {
    fn from(params: SessionParams) -> Self {
        ControlMessage::Hello {
            frame_count: params.frame_count,
            fov: params.fov,
            format: params.format,
            width: params.width,
            height: params.height,
        }
    }
}

/// Body of an outbound camera request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRequest {
    pub pos: [f32; 3],
    pub target: [f32; 3],
    pub fov: f32,
    pub width: u32,
    pub height: u32,
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub znear: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zfar: Option<f32>,
}

impl From<&CameraState> for CameraRequest {
    fn from(state: &CameraState) -> Self {
        Self {
            pos: state.pose.position,
            target: state.pose.target,
            fov: state.fov,
            width: state.viewport.width,
            height: state.viewport.height,
            time: state.time,
            znear: state.znear,
            zfar: state.zfar,
        }
    }
}

/// Messages the client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Camera(CameraRequest),
}

/// Serialize a camera state into the JSON text sent to the server.
///
/// JSON has no representation for NaN or infinity, so non-finite values are
/// rejected here rather than silently turned into `null`.
pub fn encode_camera(state: &CameraState) -> Result<String> {
    let finite_clip = state.znear.is_none_or(f32::is_finite) && state.zfar.is_none_or(f32::is_finite);
    if !state.pose.is_finite() || !state.fov.is_finite() || !state.time.is_finite() || !finite_clip
    {
        return Err(SyncError::protocol_error("camera", "camera state contains non-finite values"));
    }

    serde_json::to_string(&ClientMessage::Camera(CameraRequest::from(state)))
        .map_err(|e| SyncError::protocol_error("camera", e.to_string()))
}

/// Parse a text message received from the server.
pub fn parse_control(raw: &str) -> Result<ControlMessage> {
    serde_json::from_str(raw).map_err(|e| SyncError::protocol_error("control message", e.to_string()))
}

/// Parse a client request; the counterpart of [`encode_camera`] used by
/// servers and test harnesses.
pub fn parse_client(raw: &str) -> Result<ClientMessage> {
    serde_json::from_str(raw).map_err(|e| SyncError::protocol_error("client message", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CameraPose, Viewport};
    use serde_json::Value;

    fn sample_state() -> CameraState {
        CameraState::new(
            CameraPose::new([0.0, 0.5, 2.0], [0.0, 0.0, 0.0]),
            49.1,
            Viewport::new(640, 480),
            7.5,
        )
    }

    #[test]
    fn camera_request_has_the_expected_shape() {
        let text = encode_camera(&sample_state()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["type"], "camera");
        assert_eq!(value["pos"], serde_json::json!([0.0, 0.5, 2.0]));
        assert_eq!(value["target"], serde_json::json!([0.0, 0.0, 0.0]));
        assert_eq!(value["width"], 640);
        assert_eq!(value["height"], 480);
        assert_eq!(value["time"], 7.5);
        assert!(value.get("znear").is_none(), "unset clip planes stay off the wire");
        assert!(value.get("zfar").is_none());
    }

    #[test]
    fn clip_planes_are_sent_when_set() {
        let text = encode_camera(&sample_state().with_clip_planes(0.01, 50.0)).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!((value["znear"].as_f64().unwrap() - 0.01).abs() < 1e-6);
        assert_eq!(value["zfar"], 50.0);
    }

    #[test]
    fn non_finite_camera_is_rejected() {
        let mut state = sample_state();
        state.time = f64::NAN;
        assert!(matches!(encode_camera(&state), Err(SyncError::Protocol { .. })));

        let mut state = sample_state();
        state.zfar = Some(f32::INFINITY);
        assert!(encode_camera(&state).is_err());
    }

    #[test]
    fn hello_parses_with_uppercase_frame_count() {
        let raw = r#"{"type":"hello","T":24,"fov":49.1,"format":"jpeg","width":512,"height":512}"#;
        let message = parse_control(raw).unwrap();
        let params = message.session_params().unwrap();

        assert_eq!(params.frame_count, 24);
        assert_eq!(params.format, ImageFormat::Jpeg);
        assert_eq!((params.width, params.height), (512, 512));
    }

    #[test]
    fn error_message_parses() {
        let raw = r#"{"type":"error","message":"CUDA out of memory"}"#;
        assert_eq!(
            parse_control(raw).unwrap(),
            ControlMessage::Error { message: "CUDA out of memory".to_string() }
        );
    }

    #[test]
    fn unknown_or_malformed_control_is_a_protocol_error() {
        for raw in [
            r#"{"type":"camera","pos":[0,0,0]}"#,
            r#"{"type":"hello","T":24}"#,
            r#"{"message":"no tag"}"#,
            "not json at all",
        ] {
            assert!(
                matches!(parse_control(raw), Err(SyncError::Protocol { .. })),
                "expected protocol error for {raw}"
            );
        }
    }

    #[test]
    fn server_side_parse_sees_the_same_request() {
        let state = sample_state();
        let ClientMessage::Camera(request) = parse_client(&encode_camera(&state).unwrap()).unwrap();
        assert_eq!(request, CameraRequest::from(&state));
    }
}
