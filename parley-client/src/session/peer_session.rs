use crate::error::{NegotiationError, SessionError};
use crate::render::RemoteStream;
use crate::session::session_context::SessionContext;
use crate::transport::Negotiator;
use parley_core::{IceCandidate, PeerId, SdpKind, SessionDescription};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    New,
    OfferSent,
    OfferReceived,
    Answered,
    Stable,
    Closed,
}

/// Result of feeding a remote offer into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferOutcome {
    /// Send this answer back to the offering peer.
    Answer(SessionDescription),

    /// Offer collision that we win: our own offer stays in flight.
    Ignored,
}

/// Point-in-time view of a session, as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSessionRecord {
    pub peer_id: PeerId,
    pub display_name: String,
    pub negotiation_state: NegotiationState,
    pub local_media_attached: bool,
    pub pending_candidates: Vec<IceCandidate>,
}

/// Media negotiation with one remote participant.
///
/// Every transition happens in reaction to a signal message or a negotiator
/// event, on the client event loop. Remote candidates that arrive before the
/// remote description are parked and replayed in arrival order.
pub struct PeerSession {
    peer_id: PeerId,
    display_name: String,
    state: NegotiationState,
    context: Arc<SessionContext>,
    negotiator: Option<Box<dyn Negotiator>>,
    epoch: u64,
    local_media_attached: bool,
    remote_description_set: bool,
    pending_candidates: VecDeque<IceCandidate>,
    attached_streams: HashSet<String>,
}

impl PeerSession {
    /// Builds the negotiator and attaches local media. Nothing is sent yet.
    pub async fn open(
        peer_id: PeerId,
        display_name: impl Into<String>,
        context: Arc<SessionContext>,
    ) -> Result<Self, SessionError> {
        let mut session = Self {
            peer_id,
            display_name: display_name.into(),
            state: NegotiationState::New,
            context,
            negotiator: None,
            epoch: 0,
            local_media_attached: false,
            remote_description_set: false,
            pending_candidates: VecDeque::new(),
            attached_streams: HashSet::new(),
        };

        if let Err(source) = session.install_negotiator().await {
            return Err(SessionError::Negotiation {
                peer_id: session.peer_id,
                source,
            });
        }

        debug!("Opened session with {} ({})", session.peer_id, session.display_name);
        Ok(session)
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn local_media_attached(&self) -> bool {
        self.local_media_attached
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending_candidates(&self) -> impl Iterator<Item = &IceCandidate> {
        self.pending_candidates.iter()
    }

    pub fn is_closed(&self) -> bool {
        self.state == NegotiationState::Closed
    }

    pub fn record(&self) -> PeerSessionRecord {
        PeerSessionRecord {
            peer_id: self.peer_id.clone(),
            display_name: self.display_name.clone(),
            negotiation_state: self.state,
            local_media_attached: self.local_media_attached,
            pending_candidates: self.pending_candidates.iter().cloned().collect(),
        }
    }

    /// Whether an event stamped with `epoch` still belongs to this session.
    pub fn accepts(&self, epoch: u64) -> bool {
        !self.is_closed() && epoch == self.epoch
    }

    pub async fn initiate_call(&mut self) -> Result<SessionDescription, SessionError> {
        match self.state {
            NegotiationState::New => {}
            NegotiationState::Closed => return Err(self.closed_error()),
            state => {
                return Err(SessionError::AlreadyNegotiating {
                    peer_id: self.peer_id.clone(),
                    state,
                });
            }
        }

        let result = self.negotiator()?.create_offer().await;
        match result {
            Ok(offer) => {
                self.state = NegotiationState::OfferSent;
                info!("Offer ready for {}", self.peer_id);
                Ok(offer)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// On an offer collision the side with the smaller id yields: it drops
    /// its own offer and answers the remote one. The other side ignores the
    /// incoming offer and waits for its answer.
    pub async fn handle_offer(
        &mut self,
        offer: SessionDescription,
        local_id: &PeerId,
    ) -> Result<OfferOutcome, SessionError> {
        match self.state {
            NegotiationState::New => {}
            NegotiationState::OfferSent if local_id < &self.peer_id => {
                info!(
                    "Offer collision with {}: yielding to the remote offer",
                    self.peer_id
                );
                self.discard_local_offer().await?;
            }
            NegotiationState::OfferSent => {
                info!(
                    "Offer collision with {}: keeping our own offer",
                    self.peer_id
                );
                return Ok(OfferOutcome::Ignored);
            }
            NegotiationState::Closed => return Err(self.closed_error()),
            state => {
                return Err(SessionError::InvalidStateTransition {
                    peer_id: self.peer_id.clone(),
                    state,
                    event: "offer",
                });
            }
        }

        if offer.kind != SdpKind::Offer {
            let e = NegotiationError::UnexpectedDescription {
                expected: SdpKind::Offer,
                actual: offer.kind,
            };
            return Err(self.fail(e).await);
        }

        self.state = NegotiationState::OfferReceived;
        self.apply_remote_description(offer).await?;

        let result = self.negotiator()?.create_answer().await;
        let answer = match result {
            Ok(answer) => answer,
            Err(e) => return Err(self.fail(e).await),
        };

        self.state = NegotiationState::Answered;
        info!("Answer ready for {}", self.peer_id);
        Ok(OfferOutcome::Answer(answer))
    }

    pub async fn handle_answer(&mut self, answer: SessionDescription) -> Result<(), SessionError> {
        match self.state {
            NegotiationState::OfferSent => {}
            NegotiationState::Closed => return Err(self.closed_error()),
            state => {
                return Err(SessionError::InvalidStateTransition {
                    peer_id: self.peer_id.clone(),
                    state,
                    event: "answer",
                });
            }
        }

        if answer.kind != SdpKind::Answer {
            let e = NegotiationError::UnexpectedDescription {
                expected: SdpKind::Answer,
                actual: answer.kind,
            };
            return Err(self.fail(e).await);
        }

        self.apply_remote_description(answer).await?;
        self.state = NegotiationState::Stable;
        info!("Negotiation with {} is stable", self.peer_id);
        Ok(())
    }

    pub async fn handle_candidate(&mut self, candidate: IceCandidate) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        if !self.remote_description_set {
            self.pending_candidates.push_back(candidate);
            debug!(
                "Queued candidate for {} ({} pending)",
                self.peer_id,
                self.pending_candidates.len()
            );
            return Ok(());
        }

        self.apply_candidate(candidate).await
    }

    /// Returns `true` the first time a given remote stream shows up.
    pub fn on_remote_track(&mut self, stream: &RemoteStream) -> bool {
        if self.is_closed() {
            return false;
        }
        self.attached_streams.insert(stream.stream_id.clone())
    }

    /// The answering side settles once media actually flows.
    pub fn mark_connected(&mut self) {
        if self.state == NegotiationState::Answered {
            self.state = NegotiationState::Stable;
            info!("Negotiation with {} is stable", self.peer_id);
        }
    }

    pub async fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = NegotiationState::Closed;
        self.pending_candidates.clear();
        self.attached_streams.clear();

        if let Some(negotiator) = self.negotiator.take() {
            if let Err(e) = negotiator.close().await {
                warn!("Failed to close negotiator for {}: {}", self.peer_id, e);
            }
        }
        info!("Closed session with {}", self.peer_id);
    }

    fn negotiator(&self) -> Result<&dyn Negotiator, SessionError> {
        self.negotiator
            .as_deref()
            .ok_or_else(|| self.closed_error())
    }

    fn closed_error(&self) -> SessionError {
        SessionError::Closed {
            peer_id: self.peer_id.clone(),
        }
    }

    async fn install_negotiator(&mut self) -> Result<(), NegotiationError> {
        self.epoch += 1;
        let context = self.context.clone();
        let negotiator = context
            .negotiators()
            .create(&self.peer_id, context.sink(&self.peer_id, self.epoch))
            .await?;

        self.local_media_attached = false;
        if let Some(media) = context.media() {
            if let Err(e) = negotiator.attach_local_media(media).await {
                let _ = negotiator.close().await;
                return Err(e);
            }
            self.local_media_attached = true;
        }

        self.negotiator = Some(negotiator);
        Ok(())
    }

    async fn discard_local_offer(&mut self) -> Result<(), SessionError> {
        if let Some(negotiator) = self.negotiator.take() {
            if let Err(e) = negotiator.close().await {
                warn!(
                    "Failed to close discarded negotiator for {}: {}",
                    self.peer_id, e
                );
            }
        }
        self.state = NegotiationState::New;
        self.remote_description_set = false;

        match self.install_negotiator().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn apply_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), SessionError> {
        let result = self.negotiator()?.set_remote_description(description).await;
        if let Err(e) = result {
            return Err(self.fail(e).await);
        }
        self.remote_description_set = true;

        while let Some(candidate) = self.pending_candidates.pop_front() {
            self.apply_candidate(candidate).await?;
        }
        Ok(())
    }

    async fn apply_candidate(&mut self, candidate: IceCandidate) -> Result<(), SessionError> {
        let result = self.negotiator()?.add_ice_candidate(candidate).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn fail(&mut self, source: NegotiationError) -> SessionError {
        warn!("Negotiation with {} failed: {}", self.peer_id, source);
        self.close().await;
        SessionError::Negotiation {
            peer_id: self.peer_id.clone(),
            source,
        }
    }
}
