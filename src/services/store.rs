//! Session store — owns the session arena and its lifecycle rules.
//!
//! DESIGN
//! ======
//! Sessions live in an `Arc<RwLock<HashMap>>` of per-session `Arc<Mutex>`
//! records. The outer lock is held only long enough to clone the entry, so
//! mutations to one session serialize on its own mutex and never block
//! another session.
//!
//! A lapsed guest session stays in the map as a read-only tombstone until
//! the sweeper retires it: `get`/`mutate` return `Expired` (distinct from
//! `NotFound`) so callers can render "this session expired".

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::event::SessionError;
use crate::state::{DocumentState, Session, now_ms};

/// Creation request for a session. `mode` is required; everything else has
/// a serviceable default.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SessionSpec {
    pub title: Option<String>,
    pub mode: Option<String>,
    pub submode: Option<String>,
    pub owner_id: Uuid,
    #[serde(default)]
    pub is_guest: bool,
}

/// The single owner of session records. Cheap to clone.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>>,
    guest_ttl_ms: i64,
}

impl SessionStore {
    #[must_use]
    pub fn new(guest_ttl_ms: i64) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), guest_ttl_ms }
    }

    /// Create a session. Guest sessions get `expires_at = now + TTL`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSpec` if `mode` is missing or empty.
    pub async fn create(&self, spec: SessionSpec) -> Result<Session, SessionError> {
        let mode = match spec.mode {
            Some(mode) if !mode.trim().is_empty() => mode,
            _ => return Err(SessionError::InvalidSpec("mode is required")),
        };

        let now = now_ms();
        let session = Session {
            id: Uuid::new_v4(),
            title: spec.title.unwrap_or_else(|| "Untitled Session".into()),
            mode,
            submode: spec.submode,
            owner_id: spec.owner_id,
            created_at_ms: now,
            is_guest: spec.is_guest,
            expires_at_ms: spec.is_guest.then(|| now + self.guest_ttl_ms),
            document: DocumentState::default(),
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id, Arc::new(Mutex::new(session.clone())));
        info!(session_id = %session.id, mode = %session.mode, is_guest = session.is_guest, "session created");
        Ok(session)
    }

    /// Fetch a snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown ID and `Expired` for a lapsed
    /// guest session.
    pub async fn get(&self, id: Uuid) -> Result<Session, SessionError> {
        let entry = self.entry(id).await?;
        let session = entry.lock().await;
        if session.is_lapsed(now_ms()) {
            return Err(SessionError::Expired(id));
        }
        Ok(session.clone())
    }

    /// Apply one atomic document mutation and return the updated snapshot's
    /// result. The closure runs under the session mutex, so concurrent
    /// submissions to the same session serialize; no state change happens
    /// when the closure rejects the mutation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`/`Expired` under the same rules as [`Self::get`],
    /// or whatever the mutation closure rejects with.
    pub async fn mutate<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let entry = self.entry(id).await?;
        let mut session = entry.lock().await;
        if session.is_lapsed(now_ms()) {
            return Err(SessionError::Expired(id));
        }
        f(&mut session)
    }

    /// Milliseconds until a guest session lapses, clamped at zero.
    /// `None` for non-guest sessions.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown ID.
    pub async fn remaining_lifetime_ms(&self, id: Uuid) -> Result<Option<i64>, SessionError> {
        let entry = self.entry(id).await?;
        let session = entry.lock().await;
        Ok(session.expires_at_ms.map(|deadline| (deadline - now_ms()).max(0)))
    }

    /// Owner-initiated teardown.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown ID and `Unauthorized` when the
    /// requester does not own the session.
    pub async fn teardown(&self, id: Uuid, requester: Uuid) -> Result<(), SessionError> {
        let entry = self.entry(id).await?;
        let owner_id = entry.lock().await.owner_id;
        if owner_id != requester {
            return Err(SessionError::Unauthorized("only the owner may tear down a session"));
        }
        self.remove(id).await;
        Ok(())
    }

    /// Drop a session record. Idempotent; used by the sweeper and teardown.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "session removed");
        }
        removed
    }

    /// IDs of guest sessions whose TTL has passed as of `now`.
    pub async fn expired_guest_ids(&self, now: i64) -> Vec<Uuid> {
        let sessions = self.sessions.read().await;
        let mut expired = Vec::new();
        for (id, entry) in sessions.iter() {
            if entry.lock().await.is_lapsed(now) {
                expired.push(*id);
            }
        }
        expired
    }

    async fn entry(&self, id: Uuid) -> Result<Arc<Mutex<Session>>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions.get(&id).cloned().ok_or(SessionError::NotFound(id))
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
