//! Shared application state and domain types.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the two owning components: the session store (documents) and
//! the presence tracker (room membership). Nothing outside those two
//! components mutates their maps directly.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::presence::PresenceTracker;
use crate::services::store::SessionStore;

// =============================================================================
// TIME
// =============================================================================

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// DOMAIN TYPES
// =============================================================================

/// A participant's capability within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Collaborator,
    Viewer,
}

/// One connection's identity within a session room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub display_name: String,
    pub role: Role,
    pub joined_at_ms: i64,
}

/// A musical event inside the document. The note set is keyed, not ordered;
/// `id` is unique within a session and collisions overwrite (last writer wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub pitch: i32,
    pub start: f64,
    pub duration: f64,
    pub velocity: f64,
}

/// One entry in the session's comment log. The tally is only ever adjusted
/// by accepted vote events, never recomputed from a vote history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author_id: Uuid,
    pub content: String,
    pub created_at_ms: i64,
    pub vote_tally: i64,
}

/// Playback transport. Single record per session; last writer is
/// authoritative for all readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportState {
    pub is_playing: bool,
    pub current_beat: f64,
    pub tempo_bpm: f64,
}

impl Default for TransportState {
    fn default() -> Self {
        Self { is_playing: false, current_beat: 0.0, tempo_bpm: 120.0 }
    }
}

/// The mutable shared artifact of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentState {
    pub notes: std::collections::HashMap<String, Note>,
    pub transport: TransportState,
    pub comments: Vec<Comment>,
}

/// One collaborative workspace. `expires_at_ms` is non-null iff `is_guest`,
/// fixed at creation; once lapsed, the record is a read-only tombstone until
/// the sweeper retires it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    pub mode: String,
    pub submode: Option<String>,
    pub owner_id: Uuid,
    pub created_at_ms: i64,
    pub is_guest: bool,
    pub expires_at_ms: Option<i64>,
    pub document: DocumentState,
}

impl Session {
    /// True when a guest session's TTL has passed.
    #[must_use]
    pub fn is_lapsed(&self, now: i64) -> bool {
        matches!(self.expires_at_ms, Some(deadline) if now > deadline)
    }
}

// =============================================================================
// CONFIG
// =============================================================================

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GUEST_TTL_MINUTES: i64 = 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Runtime knobs, loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub port: u16,
    pub guest_ttl_ms: i64,
    pub sweep_interval_secs: u64,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            guest_ttl_ms: env_parse("GUEST_TTL_MINUTES", DEFAULT_GUEST_TTL_MINUTES) * 60 * 1000,
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum — all inner fields
/// are Arc-backed.
#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub presence: PresenceTracker,
    pub config: Config,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { store: SessionStore::new(config.guest_ttl_ms), presence: PresenceTracker::new(), config }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::services::store::SessionSpec;

    /// Create a test `AppState` with the default one-hour guest TTL.
    #[must_use]
    pub fn test_app_state() -> AppState {
        test_app_state_with_ttl(DEFAULT_GUEST_TTL_MINUTES * 60 * 1000)
    }

    /// Create a test `AppState` with an explicit guest TTL in milliseconds.
    #[must_use]
    pub fn test_app_state_with_ttl(guest_ttl_ms: i64) -> AppState {
        let config = Config { port: 0, guest_ttl_ms, sweep_interval_secs: 1 };
        AppState::new(config)
    }

    /// Seed a session into the store and return its ID.
    pub async fn seed_session(state: &AppState, is_guest: bool) -> Uuid {
        let spec = SessionSpec {
            title: Some("test jam".into()),
            mode: Some("producer".into()),
            submode: Some("sampler".into()),
            owner_id: Uuid::new_v4(),
            is_guest,
        };
        let session = state.store.create(spec).await.expect("seed session");
        session.id
    }

    /// Create a dummy `Note` with the given ID.
    #[must_use]
    pub fn dummy_note(id: &str) -> Note {
        Note { id: id.into(), pitch: 60, start: 0.0, duration: 1.0, velocity: 0.8 }
    }

    /// Create a dummy `Participant` with the given role.
    #[must_use]
    pub fn dummy_participant(role: Role) -> Participant {
        Participant { id: Uuid::new_v4(), display_name: "tester".into(), role, joined_at_ms: now_ms() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_defaults() {
        let t = TransportState::default();
        assert!(!t.is_playing);
        assert!(t.current_beat.abs() < f64::EPSILON);
        assert!((t.tempo_bpm - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn session_lapse_requires_guest_deadline() {
        let session = Session {
            id: Uuid::new_v4(),
            title: "jam".into(),
            mode: "producer".into(),
            submode: None,
            owner_id: Uuid::new_v4(),
            created_at_ms: 0,
            is_guest: false,
            expires_at_ms: None,
            document: DocumentState::default(),
        };
        assert!(!session.is_lapsed(i64::MAX));

        let guest = Session { is_guest: true, expires_at_ms: Some(100), ..session };
        assert!(!guest.is_lapsed(100));
        assert!(guest.is_lapsed(101));
    }

    #[test]
    fn note_serde_round_trip() {
        let note = Note { id: "n1".into(), pitch: 64, start: 2.5, duration: 0.5, velocity: 1.0 };
        let json = serde_json::to_string(&note).unwrap();
        let restored: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, "n1");
        assert_eq!(restored.pitch, 64);
        assert!((restored.start - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn role_serde_is_kebab() {
        assert_eq!(serde_json::to_string(&Role::Collaborator).unwrap(), "\"collaborator\"");
        assert_eq!(serde_json::from_str::<Role>("\"viewer\"").unwrap(), Role::Viewer);
    }
}
