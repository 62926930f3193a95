use crate::media::LocalMedia;
use crate::session::session_event::{SessionEvent, SessionEventSink};
use crate::transport::NegotiatorFactory;
use parley_core::PeerId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What every peer session needs from the outside: a way to build
/// negotiators, the shared local media, and the event loop's inbox.
pub struct SessionContext {
    negotiators: Arc<dyn NegotiatorFactory>,
    media: Option<Arc<LocalMedia>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionContext {
    pub fn new(
        negotiators: Arc<dyn NegotiatorFactory>,
        media: Option<Arc<LocalMedia>>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            negotiators,
            media,
            events,
        }
    }

    pub fn negotiators(&self) -> &Arc<dyn NegotiatorFactory> {
        &self.negotiators
    }

    pub fn media(&self) -> Option<&Arc<LocalMedia>> {
        self.media.as_ref()
    }

    pub(crate) fn sink(&self, peer_id: &PeerId, epoch: u64) -> SessionEventSink {
        SessionEventSink::new(peer_id.clone(), epoch, self.events.clone())
    }
}
