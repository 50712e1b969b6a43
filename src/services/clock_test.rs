use super::*;
use crate::services::document;
use crate::state::{Role, test_helpers};

#[tokio::test]
async fn sync_echoes_position_and_reads_transport() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state, false).await;
    document::set_tempo(&state.store, Role::Collaborator, session_id, 174.0).await.unwrap();
    document::set_playback(&state.store, Role::Collaborator, session_id, true, 8.0).await.unwrap();

    let before = now_ms();
    let event = sync(&state.store, session_id, 12.25).await.unwrap();
    let ServerEvent::AudioSyncResponse { server_timestamp_ms, playback_position, is_playing, tempo_bpm } =
        event
    else {
        panic!("expected audio-sync-response");
    };

    assert!(server_timestamp_ms >= before);
    assert!((playback_position - 12.25).abs() < f64::EPSILON);
    assert!(is_playing);
    assert!((tempo_bpm - 174.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn sync_has_no_side_effects() {
    let state = test_helpers::test_app_state();
    let session_id = test_helpers::seed_session(&state, false).await;

    sync(&state.store, session_id, 99.0).await.unwrap();

    let transport = state.store.get(session_id).await.unwrap().document.transport;
    assert!(!transport.is_playing);
    assert!((transport.current_beat).abs() < f64::EPSILON);
}

#[tokio::test]
async fn sync_respects_session_gates() {
    let state = test_helpers::test_app_state();
    let err = sync(&state.store, Uuid::new_v4(), 0.0).await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));

    let expired = test_helpers::test_app_state_with_ttl(-1);
    let session_id = test_helpers::seed_session(&expired, true).await;
    let err = sync(&expired.store, session_id, 0.0).await.unwrap_err();
    assert!(matches!(err, SessionError::Expired(_)));
}
