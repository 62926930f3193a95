use crate::media::TrackKind;
use parley_core::PeerId;

/// A remote media stream that became available on a peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub stream_id: String,
    pub track_id: String,
    pub kind: TrackKind,
}

/// UI collaborator. Calls arrive from the client event loop and must not block.
pub trait Renderer: Send + Sync {
    fn render_chat_bubble(&self, text: &str, is_own: bool, sender_name: &str);

    fn attach_remote_stream(&self, peer_id: &PeerId, display_name: &str, stream: &RemoteStream);

    fn remove_peer_surface(&self, peer_id: &PeerId);

    fn show_join_screen(&self);

    fn hide_join_screen(&self);

    /// Hides the media grid and the chat, then shows the exit screen.
    fn show_exit_screen(&self);

    fn show_system_notice(&self, text: &str);
}
