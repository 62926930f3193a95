use crate::error::NegotiationError;
use crate::media::LocalMedia;
use crate::session::SessionEventSink;
use async_trait::async_trait;
use parley_core::{IceCandidate, PeerId, SessionDescription};
use std::sync::Arc;

/// One peer's media negotiation backend.
///
/// `create_offer` and `create_answer` also install the result as the local
/// description. Asynchronous happenings (gathered candidates, remote tracks,
/// connection state) are reported through the [`SessionEventSink`] handed to
/// the factory.
#[async_trait]
pub trait Negotiator: Send + Sync {
    async fn attach_local_media(&self, media: &LocalMedia) -> Result<(), NegotiationError>;

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    async fn close(&self) -> Result<(), NegotiationError>;
}

#[async_trait]
pub trait NegotiatorFactory: Send + Sync {
    async fn create(
        &self,
        peer_id: &PeerId,
        events: SessionEventSink,
    ) -> Result<Box<dyn Negotiator>, NegotiationError>;
}

#[async_trait]
impl<T: NegotiatorFactory + ?Sized> NegotiatorFactory for Arc<T> {
    async fn create(
        &self,
        peer_id: &PeerId,
        events: SessionEventSink,
    ) -> Result<Box<dyn Negotiator>, NegotiationError> {
        (**self).create(peer_id, events).await
    }
}
