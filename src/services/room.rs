//! Room broadcaster — one inbound event fans out to a room's connections.
//!
//! DESIGN
//! ======
//! Two routing policies, fixed per event kind by the dispatch layer:
//! peer-broadcast passes `exclude = Some(sender)`, room-broadcast passes
//! `None` so the sender's own UI converges on the canonical state.
//!
//! Delivery is at-most-once per currently-connected member: `try_send`, no
//! retry, no persistence. A member whose channel is full is skipped for
//! that event; a disconnected member misses it permanently and resyncs by
//! re-joining.

use uuid::Uuid;

use crate::event::ServerEvent;
use crate::services::presence::PresenceTracker;

/// Deliver an event to every member of a session's room, optionally
/// excluding one participant (the sender).
pub async fn broadcast(
    presence: &PresenceTracker,
    session_id: Uuid,
    event: &ServerEvent,
    exclude: Option<Uuid>,
) {
    for (participant_id, tx) in presence.senders_of(session_id).await {
        if exclude == Some(participant_id) {
            continue;
        }
        // Best-effort: a member that cannot currently accept data is skipped.
        let _ = tx.try_send(event.clone());
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
