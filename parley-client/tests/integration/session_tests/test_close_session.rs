use std::sync::Arc;

use parley_client::{NegotiationState, PeerSession, RemoteStream, SessionError, TrackKind};
use parley_core::{IceCandidate, PeerId};

use crate::integration::init_tracing;
use crate::utils::{MockNegotiatorFactory, NegotiatorCall, context_with};

#[tokio::test]
async fn test_close_is_idempotent() {
    init_tracing();

    let negotiators = MockNegotiatorFactory::new();
    let (context, _events) = context_with(&negotiators).await;
    let peer = PeerId::from("9");
    let mut session = PeerSession::open(peer.clone(), "Luis", Arc::new(context))
        .await
        .expect("open");

    session.initiate_call().await.expect("offer");
    session.handle_candidate(IceCandidate::new("candidate:1")).await.expect("queued");

    session.close().await;
    session.close().await;

    assert_eq!(session.state(), NegotiationState::Closed);
    assert_eq!(session.pending_candidates().count(), 0);
    let closes = negotiators
        .calls_for(&peer)
        .await
        .into_iter()
        .filter(|c| *c == NegotiatorCall::Close)
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn test_closed_session_rejects_signals() {
    init_tracing();

    let negotiators = MockNegotiatorFactory::new();
    let (context, _events) = context_with(&negotiators).await;
    let mut session = PeerSession::open(PeerId::from("9"), "Luis", Arc::new(context))
        .await
        .expect("open");
    session.close().await;

    assert!(matches!(
        session.initiate_call().await,
        Err(SessionError::Closed { .. })
    ));
    assert!(matches!(
        session.handle_candidate(IceCandidate::new("candidate:1")).await,
        Err(SessionError::Closed { .. })
    ));
    assert!(!session.accepts(session.epoch()));
}

#[tokio::test]
async fn test_remote_stream_is_attached_once() {
    init_tracing();

    let negotiators = MockNegotiatorFactory::new();
    let (context, _events) = context_with(&negotiators).await;
    let mut session = PeerSession::open(PeerId::from("9"), "Luis", Arc::new(context))
        .await
        .expect("open");

    let audio = RemoteStream {
        stream_id: "luis-cam".to_owned(),
        track_id: "audio".to_owned(),
        kind: TrackKind::Audio,
    };
    let video = RemoteStream {
        track_id: "video".to_owned(),
        kind: TrackKind::Video,
        ..audio.clone()
    };

    assert!(session.on_remote_track(&audio));
    assert!(!session.on_remote_track(&video));
    assert!(!session.on_remote_track(&audio));

    session.close().await;
    assert!(!session.on_remote_track(&audio));
}
