//! Integration tests for the receive side of a session.
//!
//! Covers consumer registration and resume, producer-closed cleanup, remote
//! screen shares and the late-resume race.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use se_test_utils::{
    screen_id, video_id, MockConsumer, MockDevice, MockSignaling, MockTransport, TestIdentity,
    TestParticipant, TestSession,
};
use serde_json::json;
use session_engine::lifecycle::ProducerClosedOutcome;
use session_engine::model::MediaKind;
use session_engine::platform::{Consumer, Transport};
use session_engine::signaling::events;
use session_engine::{EngineConfig, EngineError, SessionHandle};

async fn consume(
    handle: &SessionHandle,
    producer_id: &str,
    kind: MediaKind,
) -> (Arc<MockConsumer>, Arc<MockTransport>) {
    let consumer = MockConsumer::new(producer_id, kind);
    let transport = MockTransport::recv();
    let resumed = handle
        .connect_receive_transport(consumer.clone(), transport.clone(), producer_id, "srv-transport")
        .await
        .unwrap();
    assert!(resumed);
    (consumer, transport)
}

// ============================================================================
// Consumer resume
// ============================================================================

#[tokio::test]
async fn test_remote_video_is_resumed_and_ranked() {
    let session = TestSession::spawn(TestIdentity::attendee().build());
    session
        .handle
        .participant_joined(TestParticipant::attendee("bob").with_video().build())
        .await
        .unwrap();

    let (consumer, _transport) = consume(&session.handle, &video_id("bob"), MediaKind::Video).await;

    assert!(!consumer.is_paused());
    assert_eq!(
        session.signaling.payloads(events::CONSUMER_RESUME),
        vec![json!({ "serverConsumerId": consumer.id() })]
    );
    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.ordered, vec![video_id("bob")]);
    assert_eq!(snapshot.consumer_transports, 1);

    session.shutdown().await;
}

#[tokio::test]
async fn test_consumer_resume_rejected() {
    let signaling = MockSignaling::builder()
        .reject(events::CONSUMER_RESUME, "consumer not found")
        .build();
    let session = TestSession::spawn_with(
        TestIdentity::attendee().build(),
        EngineConfig::default(),
        signaling,
        MockDevice::new(),
    );
    session
        .handle
        .participant_joined(TestParticipant::attendee("bob").with_video().build())
        .await
        .unwrap();

    let consumer = MockConsumer::new(video_id("bob"), MediaKind::Video);
    let err = session
        .handle
        .connect_receive_transport(consumer.clone(), MockTransport::recv(), &video_id("bob"), "srv")
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Signaling(reason) if reason == "consumer not found"));
    assert!(consumer.is_paused());

    // The entry stays registered until the producer closes.
    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.consumer_transports, 1);
    assert!(snapshot.ordered.is_empty());

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_late_resume_is_dropped() {
    let signaling = MockSignaling::builder()
        .with_delay(Duration::from_secs(1))
        .build();
    let session = TestSession::spawn_with(
        TestIdentity::attendee().build(),
        EngineConfig::default(),
        signaling,
        MockDevice::new(),
    );
    session
        .handle
        .participant_joined(TestParticipant::attendee("bob").with_video().build())
        .await
        .unwrap();

    let consumer = MockConsumer::new(video_id("bob"), MediaKind::Video);
    let transport = MockTransport::recv();
    let pending = {
        let handle = session.handle.clone();
        let consumer = consumer.clone();
        let transport = transport.clone();
        tokio::spawn(async move {
            handle
                .connect_receive_transport(consumer, transport, &video_id("bob"), "srv")
                .await
        })
    };

    session.signaling.wait_for(events::CONSUMER_RESUME, 1).await;
    let outcome = session.handle.producer_closed(&video_id("bob")).await.unwrap();
    assert_eq!(outcome, ProducerClosedOutcome::Removed(MediaKind::Video));

    assert!(!pending.await.unwrap().unwrap());
    assert!(consumer.is_closed());
    assert!(transport.is_closed());
    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.consumer_transports, 0);
    assert!(snapshot.ordered.is_empty());

    session.shutdown().await;
}

// ============================================================================
// Producer closed
// ============================================================================

#[tokio::test]
async fn test_producer_closed_removes_only_that_entry() {
    let session = TestSession::spawn(TestIdentity::attendee().build());
    for name in ["bob", "carol"] {
        session
            .handle
            .participant_joined(TestParticipant::attendee(name).with_video().build())
            .await
            .unwrap();
    }
    let (bob, bob_transport) = consume(&session.handle, &video_id("bob"), MediaKind::Video).await;
    let (carol, _) = consume(&session.handle, &video_id("carol"), MediaKind::Video).await;

    let outcome = session.handle.producer_closed(&video_id("bob")).await.unwrap();

    assert_eq!(outcome, ProducerClosedOutcome::Removed(MediaKind::Video));
    assert!(bob.is_closed());
    assert!(bob_transport.is_closed());
    assert!(!carol.is_closed());
    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.consumer_transports, 1);
    assert_eq!(snapshot.ordered, vec![video_id("carol")]);

    session.shutdown().await;
}

#[tokio::test]
async fn test_producer_closed_for_unknown_producer() {
    let session = TestSession::spawn(TestIdentity::attendee().build());
    let renders = session.render.count();

    let outcome = session.handle.producer_closed("never-consumed").await.unwrap();

    assert_eq!(outcome, ProducerClosedOutcome::Unknown(MediaKind::Video));
    assert!(session.render.count() > renders, "layout is still recomputed");
    assert!(session.alerts.alerts().is_empty());

    session.shutdown().await;
}

#[tokio::test]
async fn test_participant_left_closes_their_consumers() {
    let session = TestSession::spawn(TestIdentity::attendee().build());
    for name in ["bob", "carol"] {
        session
            .handle
            .participant_joined(TestParticipant::attendee(name).with_video().build())
            .await
            .unwrap();
    }
    let (bob, bob_transport) = consume(&session.handle, &video_id("bob"), MediaKind::Video).await;
    let (carol, _) = consume(&session.handle, &video_id("carol"), MediaKind::Video).await;

    session.handle.participant_left("bob").await.unwrap();

    assert!(bob.is_closed());
    assert!(bob_transport.is_closed());
    assert!(!carol.is_closed());
    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.consumer_transports, 1);
    assert_eq!(snapshot.ordered, vec![video_id("carol")]);
    assert!(session.alerts.alerts().is_empty());

    session.shutdown().await;
}

// ============================================================================
// Remote screen share
// ============================================================================

#[tokio::test]
async fn test_remote_screen_share_fills_and_clears_main() {
    let session = TestSession::spawn(TestIdentity::host().build());
    session
        .handle
        .participant_joined(TestParticipant::host("local").build())
        .await
        .unwrap();
    session
        .handle
        .participant_joined(TestParticipant::attendee("bob").with_screen().build())
        .await
        .unwrap();

    let (consumer, _) = consume(&session.handle, &screen_id("bob"), MediaKind::Screen).await;

    let snapshot = session.handle.snapshot().await.unwrap();
    assert!(snapshot.share_active);
    assert_eq!(snapshot.main_area_percent, 84);
    assert_eq!(snapshot.screen.main_screen_producer_id, Some(screen_id("bob")));
    let update = session.render.last().unwrap();
    assert_eq!(update.main.len(), 1);

    let outcome = session.handle.producer_closed(&screen_id("bob")).await.unwrap();

    assert_eq!(outcome, ProducerClosedOutcome::Removed(MediaKind::Screen));
    assert!(consumer.is_closed());
    let snapshot = session.handle.snapshot().await.unwrap();
    assert!(!snapshot.share_active);
    assert_eq!(snapshot.main_area_percent, 0);
    assert!(session.render.last().unwrap().main.is_empty());
    session.signaling.wait_for(events::UPDATE_SCREEN_CLIENT, 1).await;

    session.shutdown().await;
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_closes_consumers() {
    let session = TestSession::spawn(TestIdentity::attendee().build());
    session
        .handle
        .participant_joined(TestParticipant::attendee("bob").with_video().with_audio().build())
        .await
        .unwrap();
    let (video, video_transport) = consume(&session.handle, &video_id("bob"), MediaKind::Video).await;
    let (audio, _) = consume(&session.handle, "p-audio-bob", MediaKind::Audio).await;

    session.shutdown().await;

    assert!(video.is_closed());
    assert!(video_transport.is_closed());
    assert!(audio.is_closed());
}

#[tokio::test]
async fn test_actor_exits_when_handles_dropped() {
    let session = TestSession::spawn(TestIdentity::attendee().build());
    let TestSession { handle, task, .. } = session;

    drop(handle);

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("actor should exit once every handle is gone")
        .unwrap();
}
