mod envelope;
mod identity;
mod negotiation;
mod peer;

pub use envelope::{ChatMessage, Envelope, EnvelopeError, SignalKind, SignalMessage, SystemEvent};
pub use identity::Identity;
pub use negotiation::{IceCandidate, SdpKind, SessionDescription};
pub use peer::PeerId;
