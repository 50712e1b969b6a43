//! Expiry sweeper — retires guest sessions past their time bound.
//!
//! DESIGN
//! ======
//! A background task runs one sweep, then sleeps for the configured
//! interval. Each sweep collects lapsed guest sessions, delivers a terminal
//! `session-expired` to any members still connected, evicts the room, and
//! removes the record from the store. Non-guest sessions are never touched.
//!
//! The sweeper runs independently of any connection; it is the only
//! time-driven state transition in the engine.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::event::ServerEvent;
use crate::services::room;
use crate::state::{AppState, now_ms};

/// Spawn the background sweep task. Returns a handle for shutdown.
pub fn spawn_sweeper_task(state: AppState) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.sweep_interval_secs);
    info!(interval_secs = state.config.sweep_interval_secs, "expiry sweeper configured");
    tokio::spawn(async move {
        loop {
            sweep_once(&state).await;
            tokio::time::sleep(interval).await;
        }
    })
}

/// Run one sweep pass. Split out so tests can tick deterministically.
pub async fn sweep_once(state: &AppState) {
    let expired = state.store.expired_guest_ids(now_ms()).await;
    for session_id in expired {
        // Notify still-connected members before teardown; the broadcast is
        // best-effort like any other.
        room::broadcast(&state.presence, session_id, &ServerEvent::SessionExpired { session_id }, None)
            .await;
        state.presence.evict_session(session_id).await;
        state.store.remove(session_id).await;
        info!(%session_id, "guest session swept");
    }
}

#[cfg(test)]
#[path = "sweeper_test.rs"]
mod tests;
