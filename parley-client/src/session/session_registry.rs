use crate::error::SessionError;
use crate::session::peer_session::{PeerSession, PeerSessionRecord};
use crate::session::session_context::SessionContext;
use parley_core::PeerId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{debug, info};

/// Sole owner of peer sessions: at most one per peer, closed before it is
/// forgotten.
pub struct SessionRegistry {
    sessions: HashMap<PeerId, PeerSession>,
    context: Arc<SessionContext>,
}

impl SessionRegistry {
    pub fn new(context: SessionContext) -> Self {
        Self {
            sessions: HashMap::new(),
            context: Arc::new(context),
        }
    }

    /// Returns the live session for `peer_id`, opening one in `New` if there
    /// is none. An existing session keeps its original display name.
    pub async fn get_or_create(
        &mut self,
        peer_id: &PeerId,
        display_name: &str,
    ) -> Result<&mut PeerSession, SessionError> {
        let context = self.context.clone();
        match self.sessions.entry(peer_id.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let session = PeerSession::open(peer_id.clone(), display_name, context).await?;
                info!("Registered session for {} ({})", peer_id, display_name);
                Ok(entry.insert(session))
            }
        }
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&PeerSession> {
        self.sessions.get(peer_id)
    }

    pub fn get_mut(&mut self, peer_id: &PeerId) -> Option<&mut PeerSession> {
        self.sessions.get_mut(peer_id)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.sessions.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.sessions.keys().cloned().collect()
    }

    pub fn records(&self) -> Vec<PeerSessionRecord> {
        let mut records: Vec<_> = self.sessions.values().map(PeerSession::record).collect();
        records.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        records
    }

    /// Closes and forgets the session. Returns whether one existed.
    pub async fn remove(&mut self, peer_id: &PeerId) -> bool {
        let Some(session) = self.sessions.get_mut(peer_id) else {
            debug!("No session to remove for {}", peer_id);
            return false;
        };
        session.close().await;
        self.sessions.remove(peer_id);
        true
    }

    /// Closes and forgets every session; returns how many there were.
    pub async fn remove_all(&mut self) -> usize {
        for session in self.sessions.values_mut() {
            session.close().await;
        }
        let closed = self.sessions.len();
        self.sessions.clear();
        if closed > 0 {
            info!("Closed {} peer sessions", closed);
        }
        closed
    }
}
