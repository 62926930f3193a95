mod peer_session;
mod session_context;
mod session_event;
mod session_registry;

pub use peer_session::*;
pub use session_context::*;
pub use session_event::*;
pub use session_registry::*;
