use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::messaging::store;
use crate::models::conversation::ConversationSummary;
use crate::models::message::MessageResponse;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenConversationRequest {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

/// GET /api/messages/conversations
///
/// The notification feed polls this endpoint; the body is a bare array so
/// clients can fold over it without unwrapping an envelope.
pub async fn handle_list_conversations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let conversations = store::list_conversations(&state.db, user.id).await?;
    Ok(Json(conversations))
}

/// POST /api/messages/conversations
pub async fn handle_open_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<OpenConversationRequest>,
) -> Result<Json<ConversationSummary>, AppError> {
    let conversation = store::open_conversation(&state.db, user.id, req.user_id).await?;
    Ok(Json(conversation))
}

/// GET /api/messages/conversations/:id
///
/// Viewing resets the requester's unread counter before the messages are
/// returned.
pub async fn handle_view_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let messages = store::view_messages(&state.db, user.id, id).await?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// POST /api/messages/conversations/:id
pub async fn handle_send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let message = store::send_message(&state.db, user.id, id, &req.body).await?;
    Ok((StatusCode::CREATED, Json(message.into())))
}
