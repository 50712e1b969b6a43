//! Audio clock service — stateless playback alignment.
//!
//! Clients send their requested position and get back the server timestamp
//! plus the transport snapshot at that instant, purely to compute clock
//! skew and correct local drift. No side effects, no broadcast, no room
//! membership requirement.

use uuid::Uuid;

use crate::event::{ServerEvent, SessionError};
use crate::services::store::SessionStore;
use crate::state::now_ms;

/// Answer one sync request from the session's current transport state.
///
/// # Errors
///
/// Returns the store's `NotFound`/`Expired` gates; expired sessions answer
/// no syncs.
pub async fn sync(
    store: &SessionStore,
    session_id: Uuid,
    requested_position: f64,
) -> Result<ServerEvent, SessionError> {
    let session = store.get(session_id).await?;
    Ok(ServerEvent::AudioSyncResponse {
        server_timestamp_ms: now_ms(),
        playback_position: requested_position,
        is_playing: session.document.transport.is_playing,
        tempo_bpm: session.document.transport.tempo_bpm,
    })
}

#[cfg(test)]
#[path = "clock_test.rs"]
mod tests;
