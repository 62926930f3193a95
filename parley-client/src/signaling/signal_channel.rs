use crate::error::ChannelError;
use async_trait::async_trait;
use parley_core::{Envelope, EnvelopeError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// What the relay connection delivers to the client loop.
#[derive(Debug)]
pub enum ChannelEvent {
    Envelope(Envelope),

    /// A frame that could not be decoded; the loop logs and drops it.
    Malformed(EnvelopeError),

    /// Delivered exactly once, after which the stream ends.
    Disconnected,
}

pub type ChannelEvents = mpsc::UnboundedReceiver<ChannelEvent>;

/// Outbound half of the relay connection.
#[async_trait]
pub trait SignalChannel: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> Result<(), ChannelError>;

    /// Idempotent.
    async fn close(&self);

    fn is_open(&self) -> bool;
}

#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn SignalChannel>, ChannelEvents), ChannelError>;
}

/// Inbound half shared by the reader task and `close()`; guarantees a single
/// `Disconnected` no matter who notices the end of the connection first.
#[derive(Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<ChannelEvent>,
    disconnected: Arc<AtomicBool>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, ChannelEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            disconnected: Arc::new(AtomicBool::new(false)),
        };
        (sink, rx)
    }

    pub fn deliver_text(&self, text: &str) {
        let event = match Envelope::decode(text) {
            Ok(envelope) => ChannelEvent::Envelope(envelope),
            Err(e) => ChannelEvent::Malformed(e),
        };
        self.push(event);
    }

    pub fn deliver(&self, envelope: Envelope) {
        self.push(ChannelEvent::Envelope(envelope));
    }

    /// Returns `true` only for the call that actually emitted the event.
    pub fn disconnect(&self) -> bool {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!("Signal channel disconnected");
        let _ = self.tx.send(ChannelEvent::Disconnected);
        true
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    fn push(&self, event: ChannelEvent) {
        if self.is_disconnected() {
            debug!("Dropping inbound event after disconnect");
            return;
        }
        let _ = self.tx.send(event);
    }
}
