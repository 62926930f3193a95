use std::time::Duration;

use parley_client::{JoinError, SignalChannel};
use parley_core::{Envelope, PeerId};

use crate::integration::{create_test_client, init_tracing};
use crate::utils::{NegotiatorCall, RenderEvent, wait_until};

#[tokio::test]
async fn test_leave_announces_then_tears_down() {
    init_tracing();

    let client = create_test_client();
    client.controller.join("Ana").await.expect("join");
    let channel = client.connector.last_channel().await.expect("channel");

    channel.deliver(Envelope::welcome(PeerId::from("7")));
    channel.deliver(Envelope::peer_joined(PeerId::from("9"), "Luis"));
    let negotiators = client.negotiators.clone();
    assert!(
        wait_until(2000, || {
            let negotiators = negotiators.clone();
            async move { negotiators.created_for(&PeerId::from("9")).await == 1 }
        })
        .await
    );
    assert_eq!(client.controller.sessions().await.len(), 1);

    assert!(client.controller.leave().await);

    let sent = channel.sent().await;
    assert_eq!(sent.last(), Some(&Envelope::peer_left(PeerId::from("7"))));
    assert!(!channel.is_open());
    assert!(
        client
            .negotiators
            .calls_for(&PeerId::from("9"))
            .await
            .contains(&NegotiatorCall::Close)
    );
    assert!(!client.media.is_held());
    assert_eq!(client.media.release_count(), 1);
    assert!(client.controller.sessions().await.is_empty());
    assert!(!client.controller.is_joined().await);
    assert_eq!(client.renderer.count(&RenderEvent::ExitScreenShown), 1);

    tokio::time::timeout(Duration::from_secs(1), client.controller.wait_left())
        .await
        .expect("wait_left resolves");
}

#[tokio::test]
async fn test_leave_twice_is_same_as_once() {
    init_tracing();

    let client = create_test_client();
    client.controller.join("Ana").await.expect("join");
    let channel = client.connector.last_channel().await.expect("channel");
    channel.deliver(Envelope::welcome(PeerId::from("7")));

    assert!(client.controller.leave().await);
    assert!(!client.controller.leave().await);

    assert_eq!(client.media.release_count(), 1);
    assert!(!channel.is_open());
    assert_eq!(client.renderer.count(&RenderEvent::ExitScreenShown), 1);
    let departures = channel
        .sent()
        .await
        .into_iter()
        .filter(|e| *e == Envelope::peer_left(PeerId::from("7")))
        .count();
    assert!(departures <= 1);
}

#[tokio::test]
async fn test_concurrent_leaves_tear_down_once() {
    init_tracing();

    let client = create_test_client();
    client.controller.join("Ana").await.expect("join");

    let (first, second) = tokio::join!(client.controller.leave(), client.controller.leave());

    assert!(first ^ second);
    assert_eq!(client.media.release_count(), 1);
    assert_eq!(client.renderer.count(&RenderEvent::ExitScreenShown), 1);
}

#[tokio::test]
async fn test_leave_before_join_does_nothing() {
    init_tracing();

    let client = create_test_client();

    assert!(!client.controller.leave().await);
    assert_eq!(client.media.release_count(), 0);
    assert!(client.renderer.events().is_empty());
}

#[tokio::test]
async fn test_leave_during_join_cancels_it() {
    init_tracing();

    let client = create_test_client();
    client.connector.set_delay_ms(200);

    let joining = {
        let controller = client.controller.clone();
        tokio::spawn(async move { controller.join("Ana").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(client.controller.leave().await);

    let result = joining.await.expect("join task");
    assert!(matches!(result, Err(JoinError::Cancelled)));
    assert!(!client.controller.is_joined().await);
    assert!(!client.media.is_held());

    let channel = client.connector.last_channel().await.expect("channel");
    assert!(!channel.is_open());
    assert_eq!(channel.close_calls(), 1);
    assert_eq!(client.renderer.count(&RenderEvent::ExitScreenShown), 1);

    tokio::time::timeout(Duration::from_secs(1), client.controller.wait_left())
        .await
        .expect("wait_left resolves");
}

#[tokio::test]
async fn test_leave_during_failing_connect_releases_media_once() {
    init_tracing();

    let client = create_test_client();
    client.connector.set_delay_ms(200);
    client.connector.fail_connect(true);

    let joining = {
        let controller = client.controller.clone();
        tokio::spawn(async move { controller.join("Ana").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(client.controller.leave().await);

    let result = joining.await.expect("join task");
    assert!(matches!(result, Err(JoinError::Cancelled)));
    assert_eq!(client.media.release_calls(), 1);
    assert!(!client.media.is_held());
    assert_eq!(client.connector.connections().await, 0);
    assert_eq!(client.renderer.count(&RenderEvent::ExitScreenShown), 1);
}
