use crate::session::PeerSessionRecord;
use tokio::sync::oneshot;

/// Requests from the controller into the client event loop.
#[derive(Debug)]
pub enum ClientCommand {
    /// Current state of every peer session, ordered by peer id.
    Snapshot(oneshot::Sender<Vec<PeerSessionRecord>>),

    /// Announce departure, close the channel and every session, then stop.
    /// Replies with the number of sessions closed.
    Leave(oneshot::Sender<usize>),
}
