mod client_command;
mod event_loop;
mod lifecycle_controller;
mod shutdown_hook;

pub use client_command::*;
pub use event_loop::*;
pub use lifecycle_controller::*;
pub use shutdown_hook::*;
