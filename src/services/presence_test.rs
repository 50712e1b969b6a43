use super::*;
use crate::state::{Role, test_helpers};

fn member_channel() -> (mpsc::Sender<ServerEvent>, mpsc::Receiver<ServerEvent>) {
    mpsc::channel(8)
}

#[tokio::test]
async fn join_then_leave_round_trip() {
    let presence = PresenceTracker::new();
    let session_id = Uuid::new_v4();
    let participant = test_helpers::dummy_participant(Role::Collaborator);
    let (tx, _rx) = member_channel();

    let connection_id = Uuid::new_v4();
    let replaced = presence.join(session_id, participant.clone(), connection_id, tx).await;
    assert!(!replaced);
    assert_eq!(presence.members_of(session_id).await.len(), 1);
    assert!(presence.is_member(session_id, participant.id).await);

    assert!(presence.leave(session_id, participant.id, connection_id).await);
    assert!(presence.members_of(session_id).await.is_empty());
    assert!(!presence.is_member(session_id, participant.id).await);
}

#[tokio::test]
async fn rejoin_replaces_without_duplicating_membership() {
    let presence = PresenceTracker::new();
    let session_id = Uuid::new_v4();
    let mut participant = test_helpers::dummy_participant(Role::Collaborator);
    let (tx_first, _rx_first) = member_channel();
    let (tx_second, mut rx_second) = member_channel();

    presence.join(session_id, participant.clone(), Uuid::new_v4(), tx_first).await;

    // Same participant, new connection and refreshed display name.
    participant.display_name = "renamed".into();
    let replaced = presence.join(session_id, participant.clone(), Uuid::new_v4(), tx_second).await;
    assert!(replaced);

    let members = presence.members_of(session_id).await;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].display_name, "renamed");

    // Deliveries go to the replacement connection.
    let senders = presence.senders_of(session_id).await;
    assert_eq!(senders.len(), 1);
    senders[0].1.try_send(ServerEvent::SessionExpired { session_id }).unwrap();
    assert!(rx_second.try_recv().is_ok());
}

#[tokio::test]
async fn leave_is_idempotent_and_unknown_room_is_noop() {
    let presence = PresenceTracker::new();
    let session_id = Uuid::new_v4();
    let participant = test_helpers::dummy_participant(Role::Viewer);
    let connection_id = Uuid::new_v4();
    let (tx, _rx) = member_channel();

    assert!(!presence.leave(session_id, participant.id, connection_id).await);

    presence.join(session_id, participant.clone(), connection_id, tx).await;
    assert!(presence.leave(session_id, participant.id, connection_id).await);
    assert!(!presence.leave(session_id, participant.id, connection_id).await);
}

#[tokio::test]
async fn superseded_connection_cannot_evict_a_live_rejoin() {
    let presence = PresenceTracker::new();
    let session_id = Uuid::new_v4();
    let participant = test_helpers::dummy_participant(Role::Collaborator);
    let old_connection = Uuid::new_v4();
    let new_connection = Uuid::new_v4();
    let (tx_old, _rx_old) = member_channel();
    let (tx_new, _rx_new) = member_channel();

    presence.join(session_id, participant.clone(), old_connection, tx_old).await;
    // Same participant re-joins on a fresh connection, replacing the record.
    presence.join(session_id, participant.clone(), new_connection, tx_new).await;

    // The stale connection's late leave removes nothing.
    assert!(!presence.leave(session_id, participant.id, old_connection).await);
    assert!(presence.is_member(session_id, participant.id).await);

    // The owning connection still can.
    assert!(presence.leave(session_id, participant.id, new_connection).await);
    assert!(!presence.is_member(session_id, participant.id).await);
}

#[tokio::test]
async fn rooms_are_scoped_per_session() {
    let presence = PresenceTracker::new();
    let session_a = Uuid::new_v4();
    let session_b = Uuid::new_v4();
    let participant = test_helpers::dummy_participant(Role::Collaborator);
    let (tx, _rx) = member_channel();

    presence.join(session_a, participant.clone(), Uuid::new_v4(), tx).await;

    assert!(presence.is_member(session_a, participant.id).await);
    assert!(!presence.is_member(session_b, participant.id).await);
    assert!(presence.members_of(session_b).await.is_empty());
}

#[tokio::test]
async fn evict_session_drops_every_member() {
    let presence = PresenceTracker::new();
    let session_id = Uuid::new_v4();
    for _ in 0..3 {
        let (tx, _rx) = member_channel();
        presence
            .join(session_id, test_helpers::dummy_participant(Role::Collaborator), Uuid::new_v4(), tx)
            .await;
    }
    assert_eq!(presence.members_of(session_id).await.len(), 3);

    presence.evict_session(session_id).await;
    assert!(presence.members_of(session_id).await.is_empty());
    assert!(presence.senders_of(session_id).await.is_empty());
}
