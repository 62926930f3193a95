use parley_client::NegotiationState;
use parley_core::{Envelope, IceCandidate, PeerId, SessionDescription, SignalKind};

use crate::integration::init_tracing;
use crate::utils::{MALFORMED_SDP, NegotiatorCall, RouterHarness};

#[tokio::test]
async fn test_incoming_offer_is_answered_to_sender() {
    init_tracing();

    let mut harness = RouterHarness::new("Luis").await;
    harness.welcome("9").await;
    harness.channel.clear_sent().await;

    harness.offer_from("7", "Ana", "ana-offer").await;

    let session = harness.session("7").expect("session created by offer");
    assert_eq!(session.display_name(), "Ana");
    assert_eq!(session.state(), NegotiationState::Answered);

    let answers = harness.channel.sent_signals_of(SignalKind::Answer).await;
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].from, PeerId::from("9"));
    assert_eq!(answers[0].to, PeerId::from("7"));
    assert_eq!(answers[0].sender_name, "Luis");

    let answer: SessionDescription =
        serde_json::from_value(answers[0].payload.clone()).expect("answer payload");
    assert_eq!(answer.sdp, "mock-answer-7");
}

#[tokio::test]
async fn test_answer_completes_our_call() {
    init_tracing();

    let mut harness = RouterHarness::new("Ana").await;
    harness.welcome("7").await;
    harness
        .dispatch(Envelope::peer_joined(PeerId::from("9"), "Luis"))
        .await;

    harness.answer_from("9", "Luis", "luis-answer").await;

    assert_eq!(
        harness.session("9").map(|s| s.state()),
        Some(NegotiationState::Stable)
    );
}

#[tokio::test]
async fn test_stray_answer_is_only_a_warning() {
    init_tracing();

    let mut harness = RouterHarness::new("Luis").await;
    harness.welcome("9").await;
    harness.offer_from("7", "Ana", "ana-offer").await;

    harness.answer_from("7", "Ana", "late-answer").await;

    assert_eq!(
        harness.session("7").map(|s| s.state()),
        Some(NegotiationState::Answered)
    );
    assert!(harness.renderer.removed_surfaces().is_empty());
}

#[tokio::test]
async fn test_signals_for_others_are_ignored() {
    init_tracing();

    let mut harness = RouterHarness::new("Ana").await;
    harness.welcome("7").await;
    harness.channel.clear_sent().await;

    let payload = serde_json::to_value(SessionDescription::offer("offer")).expect("payload");
    harness
        .dispatch(Envelope::signal(
            PeerId::from("9"),
            PeerId::from("10"),
            SignalKind::Offer,
            payload,
            "Luis",
        ))
        .await;

    assert!(harness.router.registry().is_empty());
    assert!(harness.channel.sent().await.is_empty());
}

#[tokio::test]
async fn test_early_candidates_are_flushed_with_answer() {
    init_tracing();

    let mut harness = RouterHarness::new("Ana").await;
    harness.welcome("7").await;
    harness
        .dispatch(Envelope::peer_joined(PeerId::from("9"), "Luis"))
        .await;

    for n in 1..=2 {
        let candidate = IceCandidate::new(format!("candidate:{}", n));
        harness
            .signal_from(
                "9",
                "Luis",
                SignalKind::Candidate,
                serde_json::to_value(candidate).expect("payload"),
            )
            .await;
    }
    assert_eq!(
        harness.session("9").map(|s| s.pending_candidates().count()),
        Some(2)
    );

    harness.answer_from("9", "Luis", "luis-answer").await;

    assert_eq!(
        harness.negotiators.applied_candidates(&PeerId::from("9")).await,
        vec!["candidate:1".to_owned(), "candidate:2".to_owned()]
    );
}

#[tokio::test]
async fn test_candidates_from_unknown_peer_open_nothing() {
    init_tracing();

    let mut harness = RouterHarness::new("Luis").await;
    harness.welcome("9").await;

    let candidate = IceCandidate::new("candidate:1");
    harness
        .signal_from(
            "7",
            "Ana",
            SignalKind::Candidate,
            serde_json::to_value(candidate).expect("payload"),
        )
        .await;
    harness.answer_from("7", "Ana", "stray-answer").await;

    assert!(harness.router.registry().is_empty());
    assert_eq!(harness.negotiators.created_for(&PeerId::from("7")).await, 0);
}

#[tokio::test]
async fn test_dropped_peer_stays_gone_after_trailing_candidates() {
    init_tracing();

    let mut harness = RouterHarness::new("Ana").await;
    harness.welcome("7").await;

    harness.offer_from("9", "Luis", MALFORMED_SDP).await;
    assert!(harness.session("9").is_none());

    for n in 1..=2 {
        let candidate = IceCandidate::new(format!("candidate:{}", n));
        harness
            .signal_from(
                "9",
                "Luis",
                SignalKind::Candidate,
                serde_json::to_value(candidate).expect("payload"),
            )
            .await;
    }

    assert!(harness.session("9").is_none());
    assert!(harness.router.registry().is_empty());
}

#[tokio::test]
async fn test_malformed_description_drops_the_peer() {
    init_tracing();

    let mut harness = RouterHarness::new("Ana").await;
    harness.welcome("7").await;
    harness
        .dispatch(Envelope::peer_joined(PeerId::from("9"), "Luis"))
        .await;
    harness
        .dispatch(Envelope::peer_joined(PeerId::from("10"), "Marta"))
        .await;

    harness.answer_from("9", "Luis", MALFORMED_SDP).await;

    assert!(harness.session("9").is_none());
    assert_eq!(harness.renderer.removed_surfaces(), vec![PeerId::from("9")]);
    assert!(
        harness
            .negotiators
            .calls_for(&PeerId::from("9"))
            .await
            .contains(&NegotiatorCall::Close)
    );
    assert_eq!(
        harness.session("10").map(|s| s.state()),
        Some(NegotiationState::OfferSent)
    );
}

#[tokio::test]
async fn test_unparseable_payload_drops_existing_session() {
    init_tracing();

    let mut harness = RouterHarness::new("Ana").await;
    harness.welcome("7").await;
    harness
        .dispatch(Envelope::peer_joined(PeerId::from("9"), "Luis"))
        .await;

    harness
        .signal_from("9", "Luis", SignalKind::Candidate, serde_json::json!(42))
        .await;

    assert!(harness.session("9").is_none());
    assert_eq!(harness.renderer.removed_surfaces(), vec![PeerId::from("9")]);
}
