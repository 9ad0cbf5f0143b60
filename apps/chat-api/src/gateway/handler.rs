//! Incoming event dispatch: room joins, message sends, typing signals, and
//! read receipts.
//!
//! Every client event funnels through [`dispatch`]. A `Session` only exists
//! after a successful handshake, so reaching any handler implies the
//! connection is authenticated.

use crate::error::EventError;
use crate::gateway::events::{
    ClientEvent, MessageReadPayload, MessageSendPayload, ServerEvent,
};
use crate::gateway::fanout::BroadcastPayload;
use crate::gateway::session::Session;
use crate::models::message::ChatMessage;
use crate::AppState;

/// Most recent messages replayed on a successful join.
pub const REPLAY_LIMIT: i64 = 50;

/// Dispatch one client event. The returned event, if any, goes back to the
/// requesting connection only; replies and errors never fan out.
pub async fn dispatch(
    state: &AppState,
    session: &Session,
    event: ClientEvent,
) -> Option<ServerEvent> {
    let result = match event {
        ClientEvent::ConversationJoin(conversation_id) => {
            handle_join(state, session, conversation_id).await
        }
        ClientEvent::ConversationLeave(conversation_id) => {
            handle_leave(state, session, &conversation_id)
        }
        ClientEvent::MessageSend(payload) => handle_send(state, session, payload).await,
        ClientEvent::TypingStart(payload) => {
            handle_typing(state, session, payload.conversation_id, true)
        }
        ClientEvent::TypingStop(payload) => {
            handle_typing(state, session, payload.conversation_id, false)
        }
        ClientEvent::MessageRead(payload) => handle_read(state, session, payload).await,
    };

    match result {
        Ok(reply) => reply,
        Err(err) => {
            tracing::debug!(
                connection_id = %session.connection_id,
                user_id = %session.user_id,
                error = %err,
                "event rejected"
            );
            Some(ServerEvent::Error {
                message: err.message().to_string(),
            })
        }
    }
}

/// Subscribe the connection to a conversation room and replay history.
pub async fn handle_join(
    state: &AppState,
    session: &Session,
    conversation_id: String,
) -> Result<Option<ServerEvent>, EventError> {
    let participant = state
        .store
        .find_active_participant(&conversation_id, &session.user_id)
        .await?
        .ok_or_else(|| {
            EventError::access_denied("You are not a participant of this conversation")
        })?;

    state.rooms.join(&conversation_id, &session.connection_id);

    // Opening the room counts as reading the history about to be replayed.
    state
        .store
        .update_participant_last_read(&participant.id)
        .await?;

    let messages = state
        .store
        .list_recent_messages(&conversation_id, REPLAY_LIMIT)
        .await?;
    let participants = state
        .store
        .list_active_participants(&conversation_id)
        .await?;

    Ok(Some(ServerEvent::ConversationMessages {
        conversation_id,
        messages,
        participants,
    }))
}

/// Runtime unsubscribe. Distinct from the persisted "left conversation"
/// semantics, which this service never mutates.
pub fn handle_leave(
    state: &AppState,
    session: &Session,
    conversation_id: &str,
) -> Result<Option<ServerEvent>, EventError> {
    state.rooms.leave(conversation_id, &session.connection_id);
    Ok(None)
}

/// Validate, persist, and fan out a message.
pub async fn handle_send(
    state: &AppState,
    session: &Session,
    payload: MessageSendPayload,
) -> Result<Option<ServerEvent>, EventError> {
    // A connection may never send on behalf of another user.
    if payload.sender_id != session.user_id {
        return Err(EventError::unauthorized(
            "Sender does not match the authenticated user",
        ));
    }

    state
        .store
        .find_active_participant(&payload.conversation_id, &session.user_id)
        .await?
        .ok_or_else(|| {
            EventError::access_denied("You are not a participant of this conversation")
        })?;

    let content = payload.content.trim();
    if content.is_empty() {
        return Err(EventError::validation("Message content cannot be empty"));
    }

    // Serialize persist + fan-out per conversation so subscribers observe
    // messages in persistence order. A persistence failure returns here
    // before anything is broadcast.
    let lock = state.rooms.ordering_lock(&payload.conversation_id);
    let _ordered = lock.lock().await;

    let message = state
        .store
        .create_message(&payload.conversation_id, &session.user_id, content)
        .await?;
    state
        .store
        .touch_conversation(&payload.conversation_id)
        .await?;

    let hydrated = ChatMessage::hydrate(message, session.sender_summary());
    state.broadcast.dispatch(BroadcastPayload::to_room(
        &payload.conversation_id,
        ServerEvent::MessageReceived {
            conversation_id: payload.conversation_id.clone(),
            message: hydrated,
        },
    ));

    Ok(None)
}

/// Relay a typing signal to the other room subscribers. Ephemeral: nothing
/// persists, and join-time authorization is trusted for the lifetime of the
/// subscription.
pub fn handle_typing(
    state: &AppState,
    session: &Session,
    conversation_id: String,
    is_typing: bool,
) -> Result<Option<ServerEvent>, EventError> {
    if !state
        .rooms
        .is_subscribed(&conversation_id, &session.connection_id)
    {
        tracing::debug!(
            connection_id = %session.connection_id,
            %conversation_id,
            "dropping typing signal from non-subscriber"
        );
        return Ok(None);
    }

    state.broadcast.dispatch(BroadcastPayload::to_room_excluding(
        conversation_id.clone(),
        session.connection_id.clone(),
        ServerEvent::TypingUpdate {
            conversation_id,
            user_id: session.user_id.clone(),
            is_typing,
        },
    ));

    Ok(None)
}

/// Record a read receipt and notify the other room subscribers.
pub async fn handle_read(
    state: &AppState,
    session: &Session,
    payload: MessageReadPayload,
) -> Result<Option<ServerEvent>, EventError> {
    let participant = state
        .store
        .find_active_participant(&payload.conversation_id, &session.user_id)
        .await?
        .ok_or_else(|| {
            EventError::access_denied("You are not a participant of this conversation")
        })?;

    let message = state
        .store
        .find_message(&payload.message_id)
        .await?
        .filter(|m| m.conversation_id == payload.conversation_id)
        .ok_or_else(|| EventError::not_found("Message not found in this conversation"))?;

    // Idempotent: a second receipt reports the original timestamp.
    let read_at = state.store.mark_message_read(&message.id).await?;
    state
        .store
        .update_participant_last_read(&participant.id)
        .await?;

    state.broadcast.dispatch(BroadcastPayload::to_room_excluding(
        payload.conversation_id.clone(),
        session.connection_id.clone(),
        ServerEvent::ReadUpdate {
            conversation_id: payload.conversation_id,
            message_id: message.id,
            read_by: session.user_id.clone(),
            read_at,
        },
    ));

    Ok(None)
}
