//! Presence tracker — room membership bookkeeping.
//!
//! DESIGN
//! ======
//! The tracker exclusively owns the session → participant map. A membership
//! record exists only while its connection is live; there is no history.
//! Re-joining with the same participant ID replaces the prior connection
//! record without duplicating membership, so a reconnect and a display-name
//! refresh are the same operation.
//!
//! An abrupt disconnect is not a special case: the websocket loop calls
//! [`PresenceTracker::leave`] exactly as an explicit leave event would.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::info;
use uuid::Uuid;

use crate::event::ServerEvent;
use crate::state::Participant;

/// One participant's live attachment to a room.
#[derive(Clone)]
pub struct RoomMember {
    pub participant: Participant,
    /// Transport-level identity; replaced wholesale on re-join.
    pub connection_id: Uuid,
    pub tx: mpsc::Sender<ServerEvent>,
}

/// The single owner of room membership. Cheap to clone.
#[derive(Clone, Default)]
pub struct PresenceTracker {
    rooms: Arc<RwLock<HashMap<Uuid, HashMap<Uuid, RoomMember>>>>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a participant to a session's room. Idempotent per participant
    /// ID: a second join replaces the connection record and membership size
    /// is unchanged. Returns true when the join replaced an existing record.
    pub async fn join(
        &self,
        session_id: Uuid,
        participant: Participant,
        connection_id: Uuid,
        tx: mpsc::Sender<ServerEvent>,
    ) -> bool {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(session_id).or_default();
        let participant_id = participant.id;
        let replaced = room
            .insert(participant_id, RoomMember { participant, connection_id, tx })
            .is_some();
        info!(%session_id, %participant_id, members = room.len(), replaced, "participant joined");
        replaced
    }

    /// Detach a participant, but only when the caller's connection still
    /// owns the membership record. A connection superseded by a re-join
    /// cannot evict its replacement: its late leave or disconnect is a
    /// no-op. Idempotent; evicts the room map entry when the last member
    /// leaves. Returns true when a record was removed.
    pub async fn leave(&self, session_id: Uuid, participant_id: Uuid, connection_id: Uuid) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&session_id) else {
            return false;
        };
        let owns_record =
            room.get(&participant_id).is_some_and(|m| m.connection_id == connection_id);
        if !owns_record {
            return false;
        }
        room.remove(&participant_id);
        info!(%session_id, %participant_id, remaining = room.len(), "participant left");
        if room.is_empty() {
            rooms.remove(&session_id);
        }
        true
    }

    /// Snapshot of the participants currently attached to a session.
    pub async fn members_of(&self, session_id: Uuid) -> Vec<Participant> {
        let rooms = self.rooms.read().await;
        rooms
            .get(&session_id)
            .map(|room| room.values().map(|m| m.participant.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether a participant is currently attached to a session. Used to
    /// validate comment authorship and vote origin.
    pub async fn is_member(&self, session_id: Uuid, participant_id: Uuid) -> bool {
        let rooms = self.rooms.read().await;
        rooms.get(&session_id).is_some_and(|room| room.contains_key(&participant_id))
    }

    /// Outbound senders for a room, keyed by participant ID. The broadcaster
    /// fans out over this snapshot without holding the lock.
    pub async fn senders_of(&self, session_id: Uuid) -> Vec<(Uuid, mpsc::Sender<ServerEvent>)> {
        let rooms = self.rooms.read().await;
        rooms
            .get(&session_id)
            .map(|room| room.iter().map(|(id, m)| (*id, m.tx.clone())).collect())
            .unwrap_or_default()
    }

    /// Drop an entire room. Used by the sweeper after the terminal
    /// `session-expired` notification has been dispatched.
    pub async fn evict_session(&self, session_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.remove(&session_id) {
            info!(%session_id, evicted = room.len(), "room evicted");
        }
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
