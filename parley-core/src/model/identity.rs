use crate::model::peer::PeerId;

/// Who we are on the relay once the Welcome event has been received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: PeerId,
    pub display_name: String,
}

impl Identity {
    pub fn new(id: PeerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}
