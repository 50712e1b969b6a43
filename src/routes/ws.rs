//! WebSocket handler — the persistent connection and its event dispatch.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection ID and enters a `select!` loop:
//! - Incoming client events → parse + one exhaustive match over the taxonomy
//! - Broadcast events from room peers → forward to this client
//!
//! Handler arms are pure business logic — they validate, mutate state, and
//! return an `Outcome`. The dispatch layer owns all outbound concerns:
//! reply to sender, peer-broadcast, room-broadcast.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `connected` with `connection_id`
//! 2. Client sends events → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (reply / broadcast / both)
//! 4. Close → peer-broadcast `participant-left` → presence cleanup
//!    (implicit disconnect and explicit leave share one path)

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::{ClientEvent, ServerEvent, SessionError};
use crate::services::{clock, document, room};
use crate::state::{AppState, Participant, Role, now_ms};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler arms. The dispatch layer uses this to decide
/// who receives what — handlers never send events directly.
enum Outcome {
    /// Deliver to every current room member including the sender, so the
    /// sender's UI converges on the same canonical state as everyone else's.
    RoomBroadcast { session_id: Uuid, event: ServerEvent },
    /// Deliver to every other room member, never echoed to the sender.
    PeerBroadcast { session_id: Uuid, exclude: Uuid, event: ServerEvent },
    /// Acknowledge the sender with one payload, notify peers with another.
    ReplyAndPeerBroadcast {
        session_id: Uuid,
        exclude: Uuid,
        reply: ServerEvent,
        broadcast: ServerEvent,
    },
    /// Send to the sender only.
    Reply(ServerEvent),
    /// Nothing to send anywhere.
    Silent,
}

/// The session a connection is currently attached to.
#[derive(Clone, Copy)]
struct Joined {
    session_id: Uuid,
    participant_id: Uuid,
    role: Role,
}

// =============================================================================
// UPGRADE + CONNECTION
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();

    // Per-connection channel for events broadcast by room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(256);

    if send_event(&mut socket, &ServerEvent::Connected { connection_id }).await.is_err() {
        return;
    }
    info!(%connection_id, "ws: client connected");

    let mut joined: Option<Joined> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies =
                            process_client_text(&state, &mut joined, connection_id, &client_tx, &text).await;
                        for event in replies {
                            let _ = send_event(&mut socket, &event).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    // Abrupt disconnect is a first-class leave. The guarded removal keeps
    // a superseded connection's close from evicting a live re-join; peers
    // hear participant-left only when a record was actually removed.
    if let Some(j) = joined {
        if state.presence.leave(j.session_id, j.participant_id, connection_id).await {
            let left =
                ServerEvent::ParticipantLeft { session_id: j.session_id, participant_id: j.participant_id };
            room::broadcast(&state.presence, j.session_id, &left, Some(j.participant_id)).await;
        }
    }
    info!(%connection_id, "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse one inbound text message, dispatch it, apply the outcome, and
/// return the events owed to the sender.
///
/// Split from the socket loop so tests can exercise dispatch and broadcast
/// behavior end-to-end without opening a socket.
async fn process_client_text(
    state: &AppState,
    joined: &mut Option<Joined>,
    connection_id: Uuid,
    client_tx: &mpsc::Sender<ServerEvent>,
    text: &str,
) -> Vec<ServerEvent> {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%connection_id, error = %e, "ws: invalid inbound event");
            return vec![ServerEvent::Error {
                code: "E_INVALID_VALUE".into(),
                message: format!("invalid event: {e}"),
            }];
        }
    };

    match process_client_event(state, joined, connection_id, client_tx, event).await {
        Ok(Outcome::RoomBroadcast { session_id, event }) => {
            room::broadcast(&state.presence, session_id, &event, None).await;
            vec![]
        }
        Ok(Outcome::PeerBroadcast { session_id, exclude, event }) => {
            room::broadcast(&state.presence, session_id, &event, Some(exclude)).await;
            vec![]
        }
        Ok(Outcome::ReplyAndPeerBroadcast { session_id, exclude, reply, broadcast }) => {
            room::broadcast(&state.presence, session_id, &broadcast, Some(exclude)).await;
            vec![reply]
        }
        Ok(Outcome::Reply(event)) => vec![event],
        Ok(Outcome::Silent) => vec![],
        // Errors go to the originating connection only; they never cause a
        // broadcast and never affect other participants' state.
        Err(err) => vec![err.to_event()],
    }
}

/// One exhaustive match over the inbound taxonomy. Adding an event kind is
/// a compile-time-checked extension of this match.
async fn process_client_event(
    state: &AppState,
    joined: &mut Option<Joined>,
    connection_id: Uuid,
    client_tx: &mpsc::Sender<ServerEvent>,
    event: ClientEvent,
) -> Result<Outcome, SessionError> {
    match event {
        ClientEvent::Join { session_id, participant_id, display_name, role } => {
            handle_join(state, joined, connection_id, client_tx, session_id, participant_id, display_name, role)
                .await
        }
        ClientEvent::Leave { session_id, participant_id } => {
            match joined.take() {
                Some(j) if j.session_id == session_id && j.participant_id == participant_id => {
                    // A leave from a connection whose record was replaced by
                    // a re-join removes nothing and tells peers nothing.
                    if state.presence.leave(session_id, participant_id, connection_id).await {
                        Ok(Outcome::PeerBroadcast {
                            session_id,
                            exclude: participant_id,
                            event: ServerEvent::ParticipantLeft { session_id, participant_id },
                        })
                    } else {
                        Ok(Outcome::Silent)
                    }
                }
                // Leaving a room you are not in is a no-op, not an error.
                other => {
                    *joined = other;
                    Ok(Outcome::Silent)
                }
            }
        }
        ClientEvent::NoteAdd { session_id, note } => {
            let j = require_joined(joined, session_id)?;
            let event = document::add_note(&state.store, j.role, session_id, note).await?;
            Ok(Outcome::PeerBroadcast { session_id, exclude: j.participant_id, event })
        }
        ClientEvent::NoteRemove { session_id, note_id } => {
            let j = require_joined(joined, session_id)?;
            let event = document::remove_note(&state.store, j.role, session_id, note_id).await?;
            Ok(Outcome::PeerBroadcast { session_id, exclude: j.participant_id, event })
        }
        ClientEvent::Playback { session_id, is_playing, current_beat } => {
            let j = require_joined(joined, session_id)?;
            let event =
                document::set_playback(&state.store, j.role, session_id, is_playing, current_beat).await?;
            Ok(Outcome::RoomBroadcast { session_id, event })
        }
        ClientEvent::Tempo { session_id, bpm } => {
            let j = require_joined(joined, session_id)?;
            let event = document::set_tempo(&state.store, j.role, session_id, bpm).await?;
            Ok(Outcome::RoomBroadcast { session_id, event })
        }
        ClientEvent::CommentAdd { session_id, comment } => {
            require_joined(joined, session_id)?;
            let event = document::add_comment(&state.store, &state.presence, session_id, comment).await?;
            Ok(Outcome::RoomBroadcast { session_id, event })
        }
        ClientEvent::Vote { session_id, comment_id, voter_participant_id, vote_type } => {
            require_joined(joined, session_id)?;
            let event = document::register_vote(
                &state.store,
                &state.presence,
                session_id,
                comment_id,
                voter_participant_id,
                vote_type,
            )
            .await?;
            Ok(Outcome::RoomBroadcast { session_id, event })
        }
        // Stateless and not tied to room membership.
        ClientEvent::AudioSyncRequest { session_id, requested_position } => {
            let event = clock::sync(&state.store, session_id, requested_position).await?;
            Ok(Outcome::Reply(event))
        }
        ClientEvent::StreamUpdate { session_id, stream_id, is_video_enabled, is_audio_enabled, .. } => {
            let j = require_joined(joined, session_id)?;
            // The stream identity is always the sender's own.
            let event = ServerEvent::StreamUpdated {
                session_id,
                participant_id: j.participant_id,
                stream_id,
                is_video_enabled,
                is_audio_enabled,
            };
            Ok(Outcome::PeerBroadcast { session_id, exclude: j.participant_id, event })
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_join(
    state: &AppState,
    joined: &mut Option<Joined>,
    connection_id: Uuid,
    client_tx: &mpsc::Sender<ServerEvent>,
    session_id: Uuid,
    participant_id: Uuid,
    display_name: String,
    role: Role,
) -> Result<Outcome, SessionError> {
    // Gate on the store first: joining an unknown or expired session fails
    // before any membership change.
    let session = state.store.get(session_id).await?;

    // Switching rooms parts the old one; re-joining the same room only
    // replaces the membership record.
    if let Some(prev) = joined.take() {
        if prev.session_id != session_id
            && state.presence.leave(prev.session_id, prev.participant_id, connection_id).await
        {
            let left = ServerEvent::ParticipantLeft {
                session_id: prev.session_id,
                participant_id: prev.participant_id,
            };
            room::broadcast(&state.presence, prev.session_id, &left, Some(prev.participant_id)).await;
        }
    }

    let participant = Participant { id: participant_id, display_name, role, joined_at_ms: now_ms() };
    state
        .presence
        .join(session_id, participant.clone(), connection_id, client_tx.clone())
        .await;
    *joined = Some(Joined { session_id, participant_id, role });

    let members = state.presence.members_of(session_id).await;
    Ok(Outcome::ReplyAndPeerBroadcast {
        session_id,
        exclude: participant_id,
        reply: ServerEvent::JoinAck { session, members },
        broadcast: ServerEvent::ParticipantJoined { session_id, participant },
    })
}

fn require_joined(joined: &Option<Joined>, session_id: Uuid) -> Result<Joined, SessionError> {
    match joined {
        Some(j) if j.session_id == session_id => Ok(*j),
        _ => Err(SessionError::Unauthorized("join the session before sending events to it")),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    if let ServerEvent::Error { code, message } = event {
        warn!(code, message, "ws: send error event");
    } else {
        info!(kind = event.kind(), "ws: send event");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
