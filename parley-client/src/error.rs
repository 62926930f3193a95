use crate::session::NegotiationState;
use parley_core::{EnvelopeError, PeerId, SdpKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to connect to relay at {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("signal channel is not connected")]
    NotConnected,

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] EnvelopeError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("media permission denied: {0}")]
    PermissionDenied(String),

    #[error("media device unavailable: {0}")]
    Unavailable(String),
}

/// Failure inside one peer's media negotiation.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error("expected {expected:?} description, got {actual:?}")]
    UnexpectedDescription { expected: SdpKind, actual: SdpKind },

    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("negotiation backend failed: {0}")]
    Backend(String),
}

impl NegotiationError {
    pub fn malformed(what: &'static str, reason: impl ToString) -> Self {
        NegotiationError::Malformed {
            what,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// `initiate_call` outside of `New`.
    #[error("session with {peer_id} is already negotiating ({state:?})")]
    AlreadyNegotiating {
        peer_id: PeerId,
        state: NegotiationState,
    },

    #[error("session with {peer_id} cannot handle {event} in state {state:?}")]
    InvalidStateTransition {
        peer_id: PeerId,
        state: NegotiationState,
        event: &'static str,
    },

    /// The session has been closed as a consequence.
    #[error("negotiation with {peer_id} failed: {source}")]
    Negotiation {
        peer_id: PeerId,
        source: NegotiationError,
    },

    #[error("session with {peer_id} is closed")]
    Closed { peer_id: PeerId },
}

impl SessionError {
    /// Misuse errors leave the session untouched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Negotiation { .. } | SessionError::Closed { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("display name must not be empty")]
    EmptyName,

    #[error("already joined or joining")]
    AlreadyJoined,

    #[error("could not acquire local media: {0}")]
    Media(#[from] MediaError),

    #[error("could not open signal channel: {0}")]
    Connection(#[from] ChannelError),

    #[error("join cancelled by leave")]
    Cancelled,
}
