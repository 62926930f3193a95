use crate::error::{NegotiationError, SessionError};
use crate::render::Renderer;
use crate::session::{OfferOutcome, SessionEvent, SessionEventKind, SessionRegistry};
use crate::signaling::signal_channel::{ChannelEvent, SignalChannel};
use parley_core::{
    ChatMessage, Envelope, IceCandidate, Identity, PeerId, SessionDescription, SignalKind,
    SignalMessage, SystemEvent,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const DISCONNECTED_NOTICE: &str = "You have left the room";

/// Classifies inbound envelopes and drives the registry and the addressed
/// sessions. Owned by the client event loop; nothing else mutates sessions.
pub struct SignalRouter {
    display_name: String,
    identity: watch::Sender<Option<Identity>>,
    registry: SessionRegistry,
    channel: Arc<dyn SignalChannel>,
    renderer: Arc<dyn Renderer>,
}

impl SignalRouter {
    pub fn new(
        display_name: impl Into<String>,
        registry: SessionRegistry,
        channel: Arc<dyn SignalChannel>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            display_name: display_name.into(),
            identity,
            registry,
            channel,
            renderer,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Id assigned by the relay, once the welcome has arrived.
    pub fn local_id(&self) -> Option<PeerId> {
        self.identity.borrow().as_ref().map(|identity| identity.id.clone())
    }

    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SessionRegistry {
        &mut self.registry
    }

    /// Returns `false` once the channel is gone and the loop should stop.
    pub async fn handle_channel_event(&mut self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Envelope(envelope) => {
                self.dispatch(envelope).await;
                true
            }
            ChannelEvent::Malformed(e) => {
                warn!("Dropping malformed envelope: {}", e);
                true
            }
            ChannelEvent::Disconnected => {
                self.on_disconnected().await;
                false
            }
        }
    }

    pub async fn dispatch(&mut self, envelope: Envelope) {
        debug!("Routing {} envelope", envelope.label());
        match envelope {
            Envelope::Chat(message) => self.on_chat(message),
            Envelope::System(SystemEvent::Welcome { id }) => self.on_welcome(id).await,
            Envelope::System(SystemEvent::PeerJoined { id, name }) => {
                self.on_peer_joined(id, name).await
            }
            Envelope::System(SystemEvent::PeerLeft { id }) => self.on_peer_left(id).await,
            Envelope::Signal(message) => self.on_signal(message).await,
        }
    }

    pub async fn handle_session_event(&mut self, event: SessionEvent) {
        let SessionEvent {
            peer_id,
            epoch,
            kind,
        } = event;

        let Some(session) = self.registry.get_mut(&peer_id) else {
            debug!("Dropping event for unknown session {}", peer_id);
            return;
        };
        if !session.accepts(epoch) {
            debug!("Dropping stale event for {} (epoch {})", peer_id, epoch);
            return;
        }

        match kind {
            SessionEventKind::LocalCandidate(candidate) => {
                self.send_signal(&peer_id, SignalKind::Candidate, &candidate)
                    .await;
            }
            SessionEventKind::RemoteTrack(stream) => {
                if session.on_remote_track(&stream) {
                    self.renderer
                        .attach_remote_stream(&peer_id, session.display_name(), &stream);
                }
            }
            SessionEventKind::Connected => session.mark_connected(),
            SessionEventKind::Failed(reason) => {
                warn!("Connection with {} failed: {}", peer_id, reason);
                self.drop_session(&peer_id).await;
            }
        }
    }

    /// Involuntary loss of the relay connection.
    pub async fn on_disconnected(&mut self) {
        self.renderer.show_system_notice(DISCONNECTED_NOTICE);
        self.shutdown().await;
    }

    /// Closes every session; returns how many were open.
    pub async fn shutdown(&mut self) -> usize {
        self.registry.remove_all().await
    }

    /// Voluntary exit: tell the room, close the channel, then the sessions.
    pub async fn leave(&mut self) -> usize {
        if let Some(id) = self.local_id() {
            if let Err(e) = self.channel.send(&Envelope::peer_left(id)).await {
                debug!("Departure not announced: {}", e);
            }
        }
        self.channel.close().await;
        self.shutdown().await
    }

    fn on_chat(&self, message: ChatMessage) {
        let is_own = message.sender_name == self.display_name;
        self.renderer
            .render_chat_bubble(&message.text, is_own, &message.sender_name);
    }

    async fn on_welcome(&mut self, id: PeerId) {
        if let Some(current) = self.local_id() {
            warn!("Ignoring second welcome ({}), already bound to {}", id, current);
            return;
        }

        info!("Joined as {} ({})", id, self.display_name);
        let identity = Identity::new(id.clone(), self.display_name.clone());
        self.identity.send_replace(Some(identity));

        let announce = Envelope::peer_joined(id, self.display_name.clone());
        if let Err(e) = self.channel.send(&announce).await {
            warn!("Failed to announce presence: {}", e);
        }
    }

    async fn on_peer_joined(&mut self, id: PeerId, name: String) {
        let Some(local_id) = self.local_id() else {
            debug!("Ignoring join of {} before welcome", id);
            return;
        };
        if id == local_id {
            return;
        }

        info!("{} ({}) joined, calling", name, id);
        let result = match self.registry.get_or_create(&id, &name).await {
            Ok(session) => session.initiate_call().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(offer) => self.send_signal(&id, SignalKind::Offer, &offer).await,
            Err(e) => self.on_session_error(&id, e).await,
        }
    }

    async fn on_peer_left(&mut self, id: PeerId) {
        if self.local_id().as_ref() == Some(&id) {
            debug!("Ignoring own departure");
            return;
        }
        if self.registry.remove(&id).await {
            info!("{} left", id);
            self.renderer.remove_peer_surface(&id);
        }
    }

    async fn on_signal(&mut self, message: SignalMessage) {
        let Some(local_id) = self.local_id() else {
            debug!("Ignoring {:?} from {} before welcome", message.kind, message.from);
            return;
        };
        if message.to != local_id {
            debug!("Ignoring {:?} addressed to {}", message.kind, message.to);
            return;
        }
        if message.from == local_id {
            warn!("Ignoring {:?} addressed from ourselves", message.kind);
            return;
        }

        let from = message.from.clone();
        let result = match message.kind {
            SignalKind::Offer => self.on_offer(message, &local_id).await,
            SignalKind::Answer => self.on_answer(message).await,
            SignalKind::Candidate => self.on_candidate(message).await,
        };
        if let Err(e) = result {
            self.on_session_error(&from, e).await;
        }
    }

    async fn on_offer(
        &mut self,
        message: SignalMessage,
        local_id: &PeerId,
    ) -> Result<(), SessionError> {
        let offer: SessionDescription = parse_payload(&message, "offer")?;
        let session = self
            .registry
            .get_or_create(&message.from, &message.sender_name)
            .await?;
        let outcome = session.handle_offer(offer, local_id).await?;
        if let OfferOutcome::Answer(answer) = outcome {
            self.send_signal(&message.from, SignalKind::Answer, &answer)
                .await;
        }
        Ok(())
    }

    async fn on_answer(&mut self, message: SignalMessage) -> Result<(), SessionError> {
        let answer: SessionDescription = parse_payload(&message, "answer")?;
        let Some(session) = self.registry.get_mut(&message.from) else {
            debug!("Dropping answer from {}: no session", message.from);
            return Ok(());
        };
        session.handle_answer(answer).await
    }

    async fn on_candidate(&mut self, message: SignalMessage) -> Result<(), SessionError> {
        let candidate: IceCandidate = parse_payload(&message, "ICE candidate")?;
        let Some(session) = self.registry.get_mut(&message.from) else {
            debug!("Dropping candidate from {}: no session", message.from);
            return Ok(());
        };
        session.handle_candidate(candidate).await
    }

    async fn on_session_error(&mut self, peer_id: &PeerId, error: SessionError) {
        if error.is_fatal() {
            warn!("Dropping session with {}: {}", peer_id, error);
            self.drop_session(peer_id).await;
        } else {
            warn!("{}", error);
        }
    }

    /// Treats the peer as departed for media; chat is unaffected.
    async fn drop_session(&mut self, peer_id: &PeerId) {
        if self.registry.remove(peer_id).await {
            self.renderer.remove_peer_surface(peer_id);
        }
    }

    async fn send_signal<T: Serialize>(&self, to: &PeerId, kind: SignalKind, payload: &T) {
        let Some(from) = self.local_id() else {
            warn!("Cannot send {:?} to {} without an identity", kind, to);
            return;
        };
        let payload = match serde_json::to_value(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode {:?} for {}: {}", kind, to, e);
                return;
            }
        };
        let envelope = Envelope::signal(from, to.clone(), kind, payload, self.display_name.clone());
        if let Err(e) = self.channel.send(&envelope).await {
            warn!("Failed to send {:?} to {}: {}", kind, to, e);
        }
    }
}

/// A payload that does not parse is a negotiation failure for that peer.
fn parse_payload<T: DeserializeOwned>(
    message: &SignalMessage,
    what: &'static str,
) -> Result<T, SessionError> {
    serde_json::from_value(message.payload.clone()).map_err(|e| SessionError::Negotiation {
        peer_id: message.from.clone(),
        source: NegotiationError::malformed(what, e),
    })
}
