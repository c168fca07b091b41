//! Handlers for likes: the match-engine toggle plus status and listing.

use axum::{
  Json,
  extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tandem_core::{store::ChatStore, user::UserSummary};
use uuid::Uuid;

use crate::{AppState, error::ApiError, session::Session};

// ─── Toggle ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
  pub success:  bool,
  pub is_liked: bool,
  pub is_match: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub chat_id:  Option<Uuid>,
  pub message:  String,
}

/// `POST /likes/{userId}/toggle`
pub async fn toggle<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(target): Path<Uuid>,
) -> Result<Json<ToggleResponse>, ApiError>
where
  S: ChatStore + 'static,
{
  let outcome = state
    .store
    .toggle_like(session.user_id, target)
    .await
    .map_err(ApiError::from_store)?;

  let message = if outcome.matched {
    tracing::info!(
      actor = %session.user_id,
      target = %target,
      chat_id = ?outcome.chat_id,
      "mutual like, chat opened"
    );
    "It's a match!"
  } else if outcome.liked {
    "Like added"
  } else {
    "Like removed"
  };

  Ok(Json(ToggleResponse {
    success:  true,
    is_liked: outcome.liked,
    is_match: outcome.matched,
    chat_id:  outcome.chat_id,
    message:  message.to_string(),
  }))
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
  pub liked: bool,
}

/// `GET /likes/{userId}`
pub async fn status<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(target): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError>
where
  S: ChatStore + 'static,
{
  let liked = state
    .store
    .has_liked(session.user_id, target)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(StatusResponse { liked }))
}

// ─── Received ─────────────────────────────────────────────────────────────────

/// `GET /likes/received`
pub async fn received<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Vec<UserSummary>>, ApiError>
where
  S: ChatStore + 'static,
{
  let users = state
    .store
    .likes_received(session.user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(users))
}
