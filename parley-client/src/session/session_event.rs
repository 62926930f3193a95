use crate::render::RemoteStream;
use parley_core::{IceCandidate, PeerId};
use tokio::sync::mpsc;
use tracing::debug;

/// Something a negotiator reported asynchronously, tagged with the session
/// epoch it belongs to.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub peer_id: PeerId,
    pub epoch: u64,
    pub kind: SessionEventKind,
}

#[derive(Debug, Clone)]
pub enum SessionEventKind {
    /// Local ICE candidate gathered; must reach the peer exactly once.
    LocalCandidate(IceCandidate),

    /// Peer's media became available.
    RemoteTrack(RemoteStream),

    /// Media path established.
    Connected,

    /// Unrecoverable transport failure.
    Failed(String),
}

/// Handle given to a negotiator for posting events into the client loop.
/// Sending never blocks, so it is safe from WebRTC callbacks.
#[derive(Clone)]
pub struct SessionEventSink {
    peer_id: PeerId,
    epoch: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionEventSink {
    pub fn new(peer_id: PeerId, epoch: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { peer_id, epoch, tx }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn local_candidate(&self, candidate: IceCandidate) {
        self.emit(SessionEventKind::LocalCandidate(candidate));
    }

    pub fn remote_track(&self, stream: RemoteStream) {
        self.emit(SessionEventKind::RemoteTrack(stream));
    }

    pub fn connected(&self) {
        self.emit(SessionEventKind::Connected);
    }

    pub fn failed(&self, reason: String) {
        self.emit(SessionEventKind::Failed(reason));
    }

    fn emit(&self, kind: SessionEventKind) {
        let event = SessionEvent {
            peer_id: self.peer_id.clone(),
            epoch: self.epoch,
            kind,
        };
        if self.tx.send(event).is_err() {
            debug!(
                "Dropping session event for {}: event loop is gone",
                self.peer_id
            );
        }
    }
}
