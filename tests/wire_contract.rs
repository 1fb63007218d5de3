//! Wire contract with the render server, checked through the public API.
//!
//! The literals below are what a server produces and consumes; the session is
//! driven with them exactly as the drive loop would.

use camsync::protocol::{ControlMessage, encode_camera, parse_control};
use camsync::session::{Session, SessionOptions};
use camsync::types::{CameraPose, CameraState, ConnectionState, ImageFormat, NoticeKind, Viewport};
use camsync::{ClientConfig, SyncError};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

fn camera(time: f64) -> CameraState {
    CameraState::new(CameraPose::default(), 49.1, Viewport::new(512, 512), time)
}

#[test]
fn camera_request_matches_server_fields() {
    let text = encode_camera(&camera(3.0)).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["type"], "camera");
    assert_eq!(value["pos"], serde_json::json!([0.0, 0.0, 2.0]));
    assert_eq!(value["target"], serde_json::json!([0.0, 0.0, 0.0]));
    assert_eq!(value["width"], 512);
    assert_eq!(value["height"], 512);
    assert_eq!(value["time"], 3.0);
    assert!(value.get("znear").is_none());
    assert!(value.get("zfar").is_none());
}

#[test]
fn server_hello_and_error_parse() {
    let hello = parse_control(
        r#"{"type": "hello", "T": 300, "fov": 49.1, "format": "jpeg", "width": 512, "height": 512}"#,
    )
    .unwrap();
    let params = hello.session_params().unwrap();
    assert_eq!(params.frame_count, 300);
    assert_eq!(params.format, ImageFormat::Jpeg);

    let error = parse_control(r#"{"type": "error", "message": "CUDA out of memory"}"#).unwrap();
    assert_eq!(error, ControlMessage::Error { message: "CUDA out of memory".to_string() });

    let unknown = parse_control(r#"{"type": "ping"}"#).unwrap_err();
    assert!(matches!(unknown, SyncError::Protocol { .. }));
}

#[test]
fn session_gates_requests_on_server_traffic() {
    let config = ClientConfig::default();
    let mut session = Session::new(SessionOptions::from(&config));
    let status = session.subscribe();
    let start = Instant::now();

    assert!(session.try_send(&camera(0.0), start).is_none(), "closed session must not send");

    session.open();
    assert!(session.try_send(&camera(0.0), start).is_some());
    assert!(session.try_send(&camera(1.0), start + Duration::from_millis(50)).is_none());

    session.on_text_message(
        r#"{"type":"hello","T":24,"fov":49.1,"format":"png","width":512,"height":512}"#,
    );
    session.on_text_message(r#"{"type":"error","message":"render failed"}"#);
    assert!(session.is_in_flight());
    assert_eq!(status.borrow().last_notice.as_ref().map(|n| n.kind), Some(NoticeKind::ServerReported));

    session.on_text_message("{not json");
    assert_eq!(status.borrow().last_notice.as_ref().map(|n| n.kind), Some(NoticeKind::Protocol));
    assert!(session.is_open());

    session.close();
    assert_eq!(status.borrow().state, ConnectionState::Closed);
    assert!(!status.borrow().in_flight);
}
