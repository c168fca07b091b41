//! Handlers for sending messages and reading paged history.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/chats/{id}/messages` | Body: `{"content":"hi"}`; 201 with the message |
//! | `GET`  | `/chats/{id}/messages` | `?cursor=<message id>&limit=<n>` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tandem_core::{
  message::{MessageContent, MessagePage},
  store::ChatStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError, session::Session};

const DEFAULT_PAGE: usize = 20;
const MAX_PAGE: usize = 100;

// ─── Send ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SendBody {
  pub content: String,
}

/// `POST /chats/{id}/messages`
pub async fn send<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(chat_id): Path<Uuid>,
  Json(body): Json<SendBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ChatStore + 'static,
{
  let content = MessageContent::parse(body.content)?;
  let message = state
    .store
    .send_message(session.user_id, chat_id, content)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(message)))
}

// ─── History ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PageParams {
  /// Id of the oldest message the client already holds.
  pub cursor: Option<Uuid>,
  pub limit:  Option<usize>,
}

/// `GET /chats/{id}/messages[?cursor=<id>&limit=<n>]`
pub async fn page<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(chat_id): Path<Uuid>,
  Query(params): Query<PageParams>,
) -> Result<Json<MessagePage>, ApiError>
where
  S: ChatStore + 'static,
{
  let is_participant = state
    .store
    .is_participant(session.user_id, chat_id)
    .await
    .map_err(ApiError::from_store)?;
  if !is_participant {
    return Err(ApiError::Forbidden);
  }

  let limit = params.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
  let page = state
    .store
    .message_page(chat_id, params.cursor, limit)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(page))
}
