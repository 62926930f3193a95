mod media_capture;
mod synthetic_media;

pub use media_capture::*;
pub use synthetic_media::*;
