use colored::*;
use parley_client::{RemoteStream, Renderer};
use parley_core::PeerId;

/// Prints the room to the terminal. Media surfaces are shown as one line per
/// remote stream.
pub struct TerminalRenderer;

impl Renderer for TerminalRenderer {
    fn render_chat_bubble(&self, text: &str, is_own: bool, sender_name: &str) {
        if is_own {
            println!("{} {}", format!("{}:", sender_name).blue().bold(), text);
        } else {
            println!("{} {}", format!("{}:", sender_name).green().bold(), text);
        }
    }

    fn attach_remote_stream(&self, peer_id: &PeerId, display_name: &str, stream: &RemoteStream) {
        println!(
            "{}",
            format!(
                "🎥 {} ({}) is on camera [{:?} track {}]",
                display_name, peer_id, stream.kind, stream.track_id
            )
            .cyan()
        );
    }

    fn remove_peer_surface(&self, peer_id: &PeerId) {
        println!("{}", format!("👋 {} left the call", peer_id).yellow());
    }

    fn show_join_screen(&self) {
        println!("{}", "Not in a room. Restart to try again.".yellow());
    }

    fn hide_join_screen(&self) {
        println!("{}", "Connecting...".cyan());
    }

    fn show_exit_screen(&self) {
        println!("{}", "You left the video call.".bold());
    }

    fn show_system_notice(&self, text: &str) {
        println!("{}", format!("* {}", text).italic().dimmed());
    }
}
