//! Event taxonomy — the closed set of messages exchanged over a connection.
//!
//! DESIGN
//! ======
//! Inbound and outbound events are serde-tagged enums rather than a
//! string-keyed envelope: the websocket dispatcher routes through one
//! exhaustive match, so adding an event kind is a compile-time-checked
//! extension.
//!
//! Routing policy is fixed per outbound kind and lives in the dispatch
//! layer's `Outcome`, not here — handlers produce canonical events, the
//! dispatcher decides who receives them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{Comment, Note, Participant, Role, Session};

// =============================================================================
// INBOUND
// =============================================================================

/// Direction of a vote on a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    /// Signed tally adjustment for this vote.
    #[must_use]
    pub fn delta(self) -> i64 {
        match self {
            VoteType::Upvote => 1,
            VoteType::Downvote => -1,
        }
    }
}

/// A client-authored comment before the server stamps it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentDraft {
    pub id: String,
    pub author_id: Uuid,
    pub content: String,
}

/// Everything a client may send over the persistent connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    Join {
        session_id: Uuid,
        participant_id: Uuid,
        display_name: String,
        role: Role,
    },
    Leave {
        session_id: Uuid,
        participant_id: Uuid,
    },
    NoteAdd {
        session_id: Uuid,
        note: Note,
    },
    NoteRemove {
        session_id: Uuid,
        note_id: String,
    },
    Playback {
        session_id: Uuid,
        is_playing: bool,
        current_beat: f64,
    },
    Tempo {
        session_id: Uuid,
        bpm: f64,
    },
    CommentAdd {
        session_id: Uuid,
        comment: CommentDraft,
    },
    Vote {
        session_id: Uuid,
        comment_id: String,
        voter_participant_id: Uuid,
        vote_type: VoteType,
    },
    AudioSyncRequest {
        session_id: Uuid,
        requested_position: f64,
    },
    StreamUpdate {
        session_id: Uuid,
        participant_id: Uuid,
        stream_id: String,
        is_video_enabled: bool,
        is_audio_enabled: bool,
    },
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Everything the server may deliver to a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected {
        connection_id: Uuid,
    },
    /// Reply to a successful join: the full session snapshot plus the
    /// current member list. Reconnect-resync is a fresh join.
    JoinAck {
        session: Session,
        members: Vec<Participant>,
    },
    ParticipantJoined {
        session_id: Uuid,
        participant: Participant,
    },
    ParticipantLeft {
        session_id: Uuid,
        participant_id: Uuid,
    },
    NoteAdded {
        session_id: Uuid,
        note: Note,
    },
    NoteRemoved {
        session_id: Uuid,
        note_id: String,
    },
    PlaybackChanged {
        session_id: Uuid,
        is_playing: bool,
        current_beat: f64,
    },
    TempoChanged {
        session_id: Uuid,
        tempo_bpm: f64,
    },
    CommentAdded {
        session_id: Uuid,
        comment: Comment,
    },
    VoteRegistered {
        session_id: Uuid,
        comment_id: String,
        vote_tally: i64,
    },
    AudioSyncResponse {
        server_timestamp_ms: i64,
        playback_position: f64,
        is_playing: bool,
        tempo_bpm: f64,
    },
    StreamUpdated {
        session_id: Uuid,
        participant_id: Uuid,
        stream_id: String,
        is_video_enabled: bool,
        is_audio_enabled: bool,
    },
    /// Terminal notification the sweeper sends before evicting a lapsed
    /// guest session's room.
    SessionExpired {
        session_id: Uuid,
    },
    /// Terminal notification sent before an owner-initiated teardown
    /// evicts the room.
    SessionClosed {
        session_id: Uuid,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    /// Wire tag for this event, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::JoinAck { .. } => "join-ack",
            ServerEvent::ParticipantJoined { .. } => "participant-joined",
            ServerEvent::ParticipantLeft { .. } => "participant-left",
            ServerEvent::NoteAdded { .. } => "note-added",
            ServerEvent::NoteRemoved { .. } => "note-removed",
            ServerEvent::PlaybackChanged { .. } => "playback-changed",
            ServerEvent::TempoChanged { .. } => "tempo-changed",
            ServerEvent::CommentAdded { .. } => "comment-added",
            ServerEvent::VoteRegistered { .. } => "vote-registered",
            ServerEvent::AudioSyncResponse { .. } => "audio-sync-response",
            ServerEvent::StreamUpdated { .. } => "stream-updated",
            ServerEvent::SessionExpired { .. } => "session-expired",
            ServerEvent::SessionClosed { .. } => "session-closed",
            ServerEvent::Error { .. } => "error",
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// The complete error taxonomy of the session engine. Every variant is
/// returned to the originating connection only; none causes a broadcast or
/// affects other participants' state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(Uuid),
    #[error("comment not found: {0}")]
    CommentNotFound(String),
    #[error("guest session expired: {0}")]
    Expired(Uuid),
    #[error("invalid session spec: {0}")]
    InvalidSpec(&'static str),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
}

impl SessionError {
    /// Grepable error code, stable across message wording changes.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotFound(_) | SessionError::CommentNotFound(_) => "E_NOT_FOUND",
            SessionError::Expired(_) => "E_EXPIRED",
            SessionError::InvalidSpec(_) => "E_INVALID_SPEC",
            SessionError::InvalidValue(_) => "E_INVALID_VALUE",
            SessionError::Unauthorized(_) => "E_UNAUTHORIZED",
        }
    }

    /// Convert into the wire-level error event for the sender.
    #[must_use]
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error { code: self.code().into(), message: self.to_string() }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_event_tagged_by_kebab_name() {
        let raw = json!({
            "event": "note-add",
            "session_id": Uuid::new_v4(),
            "note": {"id": "n1", "pitch": 60, "start": 0.0, "duration": 1.0, "velocity": 0.9}
        });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        let ClientEvent::NoteAdd { note, .. } = event else {
            panic!("expected note-add");
        };
        assert_eq!(note.id, "n1");
    }

    #[test]
    fn unknown_event_kind_is_rejected() {
        let raw = json!({"event": "mystery", "session_id": Uuid::new_v4()});
        assert!(serde_json::from_value::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn server_event_kind_matches_wire_tag() {
        let event = ServerEvent::TempoChanged { session_id: Uuid::new_v4(), tempo_bpm: 140.0 };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value.get("event").and_then(|v| v.as_str()), Some(event.kind()));
    }

    #[test]
    fn vote_delta_is_signed_unit() {
        assert_eq!(VoteType::Upvote.delta(), 1);
        assert_eq!(VoteType::Downvote.delta(), -1);
    }

    #[test]
    fn vote_type_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&VoteType::Upvote).unwrap(), "\"upvote\"");
        assert_eq!(serde_json::from_str::<VoteType>("\"downvote\"").unwrap(), VoteType::Downvote);
    }

    #[test]
    fn error_codes_are_grepable() {
        assert_eq!(SessionError::NotFound(Uuid::nil()).code(), "E_NOT_FOUND");
        assert_eq!(SessionError::CommentNotFound("c1".into()).code(), "E_NOT_FOUND");
        assert_eq!(SessionError::Expired(Uuid::nil()).code(), "E_EXPIRED");
        assert_eq!(SessionError::InvalidSpec("mode is required").code(), "E_INVALID_SPEC");
        assert_eq!(SessionError::InvalidValue("bpm".into()).code(), "E_INVALID_VALUE");
        assert_eq!(SessionError::Unauthorized("viewer").code(), "E_UNAUTHORIZED");
    }

    #[test]
    fn error_event_carries_code_and_message() {
        let err = SessionError::Expired(Uuid::nil());
        let ServerEvent::Error { code, message } = err.to_event() else {
            panic!("expected error event");
        };
        assert_eq!(code, "E_EXPIRED");
        assert!(message.contains("expired"));
    }
}
