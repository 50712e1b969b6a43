//! Document synchronizer — client intent in, canonical mutation + event out.
//!
//! DESIGN
//! ======
//! Each operation validates, applies one atomic change through the store's
//! per-session lock, and returns the canonical `ServerEvent` for the
//! dispatch layer to route. Handlers never send anything themselves.
//!
//! Role policy: note and transport mutations require `Collaborator`.
//! Comments and votes are open to any current room member, so viewers can
//! take part in the discussion without being able to edit the music.
//!
//! Vote tallies are adjusted in place, never recomputed, and repeated votes
//! from the same participant are accepted as-is.

use uuid::Uuid;

use crate::event::{CommentDraft, ServerEvent, SessionError, VoteType};
use crate::services::presence::PresenceTracker;
use crate::services::store::SessionStore;
use crate::state::{Comment, Note, Role, now_ms};

fn require_collaborator(role: Role) -> Result<(), SessionError> {
    if role == Role::Collaborator {
        Ok(())
    } else {
        Err(SessionError::Unauthorized("mutation requires collaborator role"))
    }
}

async fn require_member(
    presence: &PresenceTracker,
    session_id: Uuid,
    participant_id: Uuid,
) -> Result<(), SessionError> {
    if presence.is_member(session_id, participant_id).await {
        Ok(())
    } else {
        Err(SessionError::Unauthorized("author is not a member of this session"))
    }
}

/// Insert a note keyed by its ID. A colliding ID overwrites — last writer
/// wins, no merge.
///
/// # Errors
///
/// `Unauthorized` for viewers, plus the store's `NotFound`/`Expired` gates.
pub async fn add_note(
    store: &SessionStore,
    role: Role,
    session_id: Uuid,
    note: Note,
) -> Result<ServerEvent, SessionError> {
    require_collaborator(role)?;
    store
        .mutate(session_id, |session| {
            session.document.notes.insert(note.id.clone(), note.clone());
            Ok(ServerEvent::NoteAdded { session_id, note })
        })
        .await
}

/// Delete a note by ID. Absent IDs are an accepted no-op — deletion is
/// idempotent and still emits the canonical event.
///
/// # Errors
///
/// `Unauthorized` for viewers, plus the store's `NotFound`/`Expired` gates.
pub async fn remove_note(
    store: &SessionStore,
    role: Role,
    session_id: Uuid,
    note_id: String,
) -> Result<ServerEvent, SessionError> {
    require_collaborator(role)?;
    store
        .mutate(session_id, |session| {
            session.document.notes.remove(&note_id);
            Ok(ServerEvent::NoteRemoved { session_id, note_id })
        })
        .await
}

/// Overwrite the transport's play flag and beat position.
///
/// # Errors
///
/// `Unauthorized` for viewers, plus the store's `NotFound`/`Expired` gates.
pub async fn set_playback(
    store: &SessionStore,
    role: Role,
    session_id: Uuid,
    is_playing: bool,
    current_beat: f64,
) -> Result<ServerEvent, SessionError> {
    require_collaborator(role)?;
    store
        .mutate(session_id, |session| {
            session.document.transport.is_playing = is_playing;
            session.document.transport.current_beat = current_beat;
            Ok(ServerEvent::PlaybackChanged { session_id, is_playing, current_beat })
        })
        .await
}

/// Overwrite the tempo. Rejected before any state change when `bpm` is
/// non-positive or non-finite.
///
/// # Errors
///
/// `InvalidValue` for a bad bpm, `Unauthorized` for viewers, plus the
/// store's `NotFound`/`Expired` gates.
pub async fn set_tempo(
    store: &SessionStore,
    role: Role,
    session_id: Uuid,
    bpm: f64,
) -> Result<ServerEvent, SessionError> {
    require_collaborator(role)?;
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(SessionError::InvalidValue(format!("tempo must be a positive finite bpm, got {bpm}")));
    }
    store
        .mutate(session_id, |session| {
            session.document.transport.tempo_bpm = bpm;
            Ok(ServerEvent::TempoChanged { session_id, tempo_bpm: bpm })
        })
        .await
}

/// Append a comment to the session log with a zero tally. Authorship must
/// belong to a current room member.
///
/// # Errors
///
/// `Unauthorized` for a non-member author, plus the store's gates.
pub async fn add_comment(
    store: &SessionStore,
    presence: &PresenceTracker,
    session_id: Uuid,
    draft: CommentDraft,
) -> Result<ServerEvent, SessionError> {
    require_member(presence, session_id, draft.author_id).await?;
    let comment = Comment {
        id: draft.id,
        author_id: draft.author_id,
        content: draft.content,
        created_at_ms: now_ms(),
        vote_tally: 0,
    };
    store
        .mutate(session_id, |session| {
            session.document.comments.push(comment.clone());
            Ok(ServerEvent::CommentAdded { session_id, comment })
        })
        .await
}

/// Adjust a comment's tally by ±1. No per-voter de-duplication: each
/// accepted vote event moves the tally.
///
/// # Errors
///
/// `NotFound` for an unknown comment ID, `Unauthorized` for a non-member
/// voter, plus the store's gates.
pub async fn register_vote(
    store: &SessionStore,
    presence: &PresenceTracker,
    session_id: Uuid,
    comment_id: String,
    voter_participant_id: Uuid,
    vote_type: VoteType,
) -> Result<ServerEvent, SessionError> {
    require_member(presence, session_id, voter_participant_id).await?;
    store
        .mutate(session_id, |session| {
            let Some(comment) = session.document.comments.iter_mut().find(|c| c.id == comment_id) else {
                return Err(SessionError::CommentNotFound(comment_id.clone()));
            };
            comment.vote_tally += vote_type.delta();
            Ok(ServerEvent::VoteRegistered { session_id, comment_id, vote_tally: comment.vote_tally })
        })
        .await
}

#[cfg(test)]
#[path = "document_test.rs"]
mod tests;
