use std::time::Duration;

use parley_core::{Envelope, PeerId};

use crate::integration::{create_test_client, init_tracing};
use crate::utils::{NegotiatorCall, RenderEvent, wait_until};

#[tokio::test]
async fn test_relay_loss_runs_leave() {
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

    channel.drop_connection();

    tokio::time::timeout(Duration::from_secs(2), client.controller.wait_left())
        .await
        .expect("leave runs after the relay goes away");

    assert!(!client.controller.is_joined().await);
    assert!(!client.media.is_held());
    assert!(
        client
            .negotiators
            .calls_for(&PeerId::from("9"))
            .await
            .contains(&NegotiatorCall::Close)
    );

    let events = client.renderer.events();
    let notice = events
        .iter()
        .position(|e| *e == RenderEvent::Notice("You have left the room".to_owned()))
        .expect("notice shown");
    let exit = events
        .iter()
        .position(|e| *e == RenderEvent::ExitScreenShown)
        .expect("exit screen shown");
    assert!(notice < exit);

    assert!(!client.controller.leave().await);
    assert_eq!(client.media.release_count(), 1);
}
