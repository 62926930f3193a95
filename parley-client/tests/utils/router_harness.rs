use parley_client::{
    MediaCapture, PeerSession, SessionContext, SessionEvent, SessionRegistry, SignalRouter,
    SyntheticMedia,
};
use parley_core::{Envelope, PeerId, SessionDescription, SignalKind};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::mock_channel::MockChannel;
use super::mock_negotiator::MockNegotiatorFactory;
use super::mock_renderer::RecordingRenderer;

/// A router wired to mocks, driven by hand instead of by the event loop.
pub struct RouterHarness {
    pub router: SignalRouter,
    pub channel: MockChannel,
    pub negotiators: MockNegotiatorFactory,
    pub renderer: RecordingRenderer,
    session_events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl RouterHarness {
    pub async fn new(display_name: &str) -> Self {
        let negotiators = MockNegotiatorFactory::new();
        let (registry, session_events) = registry_with(&negotiators).await;
        let (channel, _inbound) = MockChannel::new();
        let renderer = RecordingRenderer::new();

        let router = SignalRouter::new(
            display_name,
            registry,
            Arc::new(channel.clone()),
            Arc::new(renderer.clone()),
        );

        Self {
            router,
            channel,
            negotiators,
            renderer,
            session_events,
        }
    }

    pub async fn dispatch(&mut self, envelope: Envelope) {
        self.router.dispatch(envelope).await;
    }

    pub async fn welcome(&mut self, id: &str) {
        self.dispatch(Envelope::welcome(PeerId::from(id))).await;
    }

    /// Signal addressed to us from `from`, with a JSON payload.
    pub async fn signal_from(
        &mut self,
        from: &str,
        name: &str,
        kind: SignalKind,
        payload: serde_json::Value,
    ) {
        let to = self.router.local_id().expect("welcome first");
        self.dispatch(Envelope::signal(PeerId::from(from), to, kind, payload, name))
            .await;
    }

    pub async fn offer_from(&mut self, from: &str, name: &str, sdp: &str) {
        let payload = serde_json::to_value(SessionDescription::offer(sdp)).unwrap();
        self.signal_from(from, name, SignalKind::Offer, payload).await;
    }

    pub async fn answer_from(&mut self, from: &str, name: &str, sdp: &str) {
        let payload = serde_json::to_value(SessionDescription::answer(sdp)).unwrap();
        self.signal_from(from, name, SignalKind::Answer, payload).await;
    }

    /// Feeds every queued negotiator event through the router.
    pub async fn pump_session_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.session_events.try_recv() {
            self.router.handle_session_event(event).await;
            handled += 1;
        }
        handled
    }

    pub fn session(&self, id: &str) -> Option<&PeerSession> {
        self.router.registry().get(&PeerId::from(id))
    }
}

/// Registry backed by `negotiators` with synthetic local media attached.
pub async fn registry_with(
    negotiators: &MockNegotiatorFactory,
) -> (SessionRegistry, mpsc::UnboundedReceiver<SessionEvent>) {
    let (context, events) = context_with(negotiators).await;
    (SessionRegistry::new(context), events)
}

pub async fn context_with(
    negotiators: &MockNegotiatorFactory,
) -> (SessionContext, mpsc::UnboundedReceiver<SessionEvent>) {
    let media = SyntheticMedia::new()
        .acquire()
        .await
        .expect("synthetic media");
    let (tx, rx) = mpsc::unbounded_channel();
    let context = SessionContext::new(Arc::new(negotiators.clone()), Some(Arc::new(media)), tx);
    (context, rx)
}
