mod signal_channel;
mod signal_router;
mod ws_channel;

pub use signal_channel::*;
pub use signal_router::*;
pub use ws_channel::*;
