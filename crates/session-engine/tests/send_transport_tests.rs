//! Integration tests for the send side of a session.
//!
//! Drives a spawned `SessionActor` through its handle with a mock socket and
//! device, covering transport creation, producing and pause/resume.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use se_test_utils::{MockDevice, MockMediaStream, MockSignaling, TestIdentity, TestSession};
use serde_json::json;
use session_engine::model::{MediaKind, TransportKind};
use session_engine::platform::{Producer, Transport};
use session_engine::render::AlertSeverity;
use session_engine::signaling::events;
use session_engine::{EngineConfig, EngineError};

const TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Transport creation
// ============================================================================

#[tokio::test]
async fn test_create_all_transports() {
    let session = TestSession::spawn(TestIdentity::host().build());

    session
        .handle
        .create_send_transport(TransportKind::All, TIMEOUT)
        .await
        .unwrap();

    let payloads = session.signaling.payloads(events::CREATE_WEBRTC_TRANSPORT);
    assert_eq!(payloads.len(), 2);
    assert!(payloads
        .iter()
        .all(|p| *p == json!({ "consumer": false, "islevel": "2" })));

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.send_transports, vec![MediaKind::Audio, MediaKind::Video]);

    session.shutdown().await;
}

#[tokio::test]
async fn test_create_transport_is_reused() {
    let session = TestSession::spawn(TestIdentity::attendee().build());

    session
        .handle
        .create_send_transport(TransportKind::Video, TIMEOUT)
        .await
        .unwrap();
    session
        .handle
        .create_send_transport(TransportKind::Video, TIMEOUT)
        .await
        .unwrap();

    assert_eq!(session.signaling.count(events::CREATE_WEBRTC_TRANSPORT), 1);
    assert_eq!(session.device.transports().len(), 1);

    session.shutdown().await;
}

#[tokio::test]
async fn test_create_transport_while_disconnected() {
    let session = TestSession::spawn_with(
        TestIdentity::attendee().build(),
        EngineConfig::default(),
        MockSignaling::disconnected(),
        MockDevice::new(),
    );

    let err = session
        .handle
        .create_send_transport(TransportKind::Audio, TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Signaling(_)));
    assert!(session.signaling.requests().is_empty());

    let snapshot = session.handle.snapshot().await.unwrap();
    assert!(snapshot.send_transports.is_empty());
    let alert = session.alerts.last().unwrap();
    assert_eq!(alert.severity, AlertSeverity::Danger);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_create_transport_times_out() {
    let signaling = MockSignaling::builder()
        .silent(events::CREATE_WEBRTC_TRANSPORT)
        .build();
    let session = TestSession::spawn_with(
        TestIdentity::attendee().build(),
        EngineConfig::default(),
        signaling,
        MockDevice::new(),
    );

    let err = session
        .handle
        .create_send_transport(TransportKind::Video, Duration::from_secs(2))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Timeout { .. }));
    let snapshot = session.handle.snapshot().await.unwrap();
    assert!(snapshot.send_transports.is_empty());
    assert_eq!(
        session.alerts.last().unwrap().severity,
        AlertSeverity::Warning
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_create_transport_rejected_by_server() {
    let signaling = MockSignaling::builder()
        .reject(events::CREATE_WEBRTC_TRANSPORT, "room is full")
        .build();
    let session = TestSession::spawn_with(
        TestIdentity::attendee().build(),
        EngineConfig::default(),
        signaling,
        MockDevice::new(),
    );

    let err = session
        .handle
        .create_send_transport(TransportKind::Audio, TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Transport(reason) if reason == "room is full"));
    assert!(session.device.transports().is_empty());

    session.shutdown().await;
}

// ============================================================================
// Producing
// ============================================================================

#[tokio::test]
async fn test_connect_video_adds_self_view() {
    let session = TestSession::spawn(TestIdentity::host().build());
    session
        .handle
        .create_send_transport(TransportKind::Video, TIMEOUT)
        .await
        .unwrap();

    let camera = MockMediaStream::new("camera");
    session
        .handle
        .connect_video_transport(camera.clone())
        .await
        .unwrap();

    let transport = session.device.transport(MediaKind::Video).unwrap();
    let producers = transport.producers();
    assert_eq!(producers.len(), 1);
    let producer_id = producers[0].id().to_string();

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.ordered, vec![producer_id.clone()]);
    assert_eq!(session.render.last_rendered_ids(), vec![producer_id]);

    session.shutdown().await;
}

#[tokio::test]
async fn test_connect_without_transport() {
    let session = TestSession::spawn(TestIdentity::attendee().build());

    let err = session
        .handle
        .connect_audio_transport(MockMediaStream::new("mic"))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidState(_)));
    assert!(session.signaling.requests().is_empty());

    session.shutdown().await;
}

#[tokio::test]
async fn test_produce_failure_is_surfaced() {
    let session = TestSession::spawn_with(
        TestIdentity::attendee().build(),
        EngineConfig::default(),
        MockSignaling::accepting(),
        MockDevice::builder().fail_produce().build(),
    );
    session
        .handle
        .create_send_transport(TransportKind::Video, TIMEOUT)
        .await
        .unwrap();

    let err = session
        .handle
        .connect_video_transport(MockMediaStream::new("camera"))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Transport(_)));
    let snapshot = session.handle.snapshot().await.unwrap();
    assert!(snapshot.ordered.is_empty());
    assert_eq!(snapshot.send_transports, vec![MediaKind::Video]);
    assert_eq!(session.alerts.last().unwrap().severity, AlertSeverity::Danger);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_produce_times_out() {
    let config = EngineConfig {
        transport_timeout: Duration::from_secs(3),
        ..EngineConfig::default()
    };
    let session = TestSession::spawn_with(
        TestIdentity::attendee().build(),
        config,
        MockSignaling::accepting(),
        MockDevice::builder()
            .with_produce_delay(Duration::from_secs(10))
            .build(),
    );
    session
        .handle
        .create_send_transport(TransportKind::Audio, TIMEOUT)
        .await
        .unwrap();

    let err = session
        .handle
        .connect_audio_transport(MockMediaStream::new("mic"))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Timeout { .. }));

    session.shutdown().await;
}

// ============================================================================
// Disconnect and resume
// ============================================================================

#[tokio::test]
async fn test_disconnect_video_closes_producer() {
    let session = TestSession::spawn(TestIdentity::attendee().build());
    session
        .handle
        .create_send_transport(TransportKind::Video, TIMEOUT)
        .await
        .unwrap();
    session
        .handle
        .connect_video_transport(MockMediaStream::new("camera"))
        .await
        .unwrap();

    assert!(session
        .handle
        .disconnect_send_transport(MediaKind::Video)
        .await
        .unwrap());

    let producer = session.device.transport(MediaKind::Video).unwrap().producers()[0].clone();
    assert!(producer.is_closed());
    assert_eq!(
        session.signaling.payloads(events::PAUSE_PRODUCER_MEDIA),
        vec![json!({ "mediaTag": "video", "roomName": "room-test" })]
    );
    let snapshot = session.handle.snapshot().await.unwrap();
    assert!(snapshot.ordered.is_empty());

    // Nothing left to disconnect.
    assert!(!session
        .handle
        .disconnect_send_transport(MediaKind::Video)
        .await
        .unwrap());
    assert_eq!(session.signaling.count(events::PAUSE_PRODUCER_MEDIA), 1);

    session.shutdown().await;
}

#[tokio::test]
async fn test_audio_pause_and_resume() {
    let session = TestSession::spawn(TestIdentity::attendee().build());
    session
        .handle
        .create_send_transport(TransportKind::Audio, TIMEOUT)
        .await
        .unwrap();
    session
        .handle
        .connect_audio_transport(MockMediaStream::new("mic"))
        .await
        .unwrap();
    let producer = session.device.transport(MediaKind::Audio).unwrap().producers()[0].clone();

    assert!(session
        .handle
        .disconnect_send_transport(MediaKind::Audio)
        .await
        .unwrap());
    assert!(producer.is_paused());
    assert!(!producer.is_closed());

    assert!(session
        .handle
        .resume_send_transport(MediaKind::Audio)
        .await
        .unwrap());
    assert!(!producer.is_paused());
    assert_eq!(
        session.signaling.payloads(events::RESUME_PRODUCER_AUDIO),
        vec![json!({ "mediaTag": "audio", "roomName": "room-test" })]
    );

    // Already running.
    assert!(!session
        .handle
        .resume_send_transport(MediaKind::Audio)
        .await
        .unwrap());

    session.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_send_side() {
    let session = TestSession::spawn(TestIdentity::attendee().build());
    session
        .handle
        .create_send_transport(TransportKind::All, TIMEOUT)
        .await
        .unwrap();
    let camera = MockMediaStream::new("camera");
    session
        .handle
        .connect_video_transport(camera.clone())
        .await
        .unwrap();
    let device = session.device.clone();

    session.shutdown().await;

    for (_, transport) in device.transports() {
        assert!(transport.is_closed());
    }
    let transport = device.transport(MediaKind::Video).unwrap();
    assert!(transport.producers()[0].is_closed());
    assert!(camera.is_stopped());
}
