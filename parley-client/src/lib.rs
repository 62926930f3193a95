mod config;
mod error;
mod lifecycle;
mod media;
mod render;
mod session;
mod signaling;
mod transport;

pub use config::*;
pub use error::*;
pub use lifecycle::*;
pub use media::*;
pub use render::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
