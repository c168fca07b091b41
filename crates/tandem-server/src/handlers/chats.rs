//! Handlers for the chat session coordinator and the caller's own record.

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_core::{chat::ChatSummary, store::ChatStore, user::User};
use uuid::Uuid;

use crate::{AppState, error::ApiError, session::Session};

// ─── Me ───────────────────────────────────────────────────────────────────────

/// `GET /me`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<User>, ApiError>
where
  S: ChatStore + 'static,
{
  let user = state
    .store
    .get_user(session.user_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {} not found", session.user_id)))?;
  Ok(Json(user))
}

// ─── Unread ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadResponse {
  pub count: u64,
}

/// `GET /unread`
pub async fn unread<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<UnreadResponse>, ApiError>
where
  S: ChatStore + 'static,
{
  let count = state
    .store
    .unread_count(session.user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(UnreadResponse { count }))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /chats`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Vec<ChatSummary>>, ApiError>
where
  S: ChatStore + 'static,
{
  let chats = state
    .store
    .list_chats(session.user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(chats))
}

// ─── Find or create ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
  pub receiver_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
  pub chat_id: Uuid,
}

/// `POST /chats`: body `{"receiverId":"<uuid>"}`. Returns the existing chat
/// with that user, or a new one.
pub async fn find_or_create<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<StartBody>,
) -> Result<Json<StartResponse>, ApiError>
where
  S: ChatStore + 'static,
{
  let chat_id = state
    .store
    .find_or_create_chat(session.user_id, body.receiver_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(StartResponse { chat_id }))
}

// ─── Mark read ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResponse {
  pub success:      bool,
  pub last_read_at: DateTime<Utc>,
}

/// `POST /chats/{id}/read`
pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(chat_id): Path<Uuid>,
) -> Result<Json<ReadResponse>, ApiError>
where
  S: ChatStore + 'static,
{
  let last_read_at = state
    .store
    .mark_read(session.user_id, chat_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(ReadResponse { success: true, last_read_at }))
}
