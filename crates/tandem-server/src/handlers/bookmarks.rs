//! Handlers for bookmarks.

use axum::{
  Json,
  extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tandem_core::{store::ChatStore, user::UserSummary};
use uuid::Uuid;

use crate::{AppState, error::ApiError, session::Session};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
  pub success:       bool,
  pub is_bookmarked: bool,
  pub message:       String,
}

/// `POST /bookmarks/{userId}/toggle`
pub async fn toggle<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(target): Path<Uuid>,
) -> Result<Json<ToggleResponse>, ApiError>
where
  S: ChatStore + 'static,
{
  let is_bookmarked = state
    .store
    .toggle_bookmark(session.user_id, target)
    .await
    .map_err(ApiError::from_store)?;
  let message = if is_bookmarked { "Bookmark added" } else { "Bookmark removed" };
  Ok(Json(ToggleResponse { success: true, is_bookmarked, message: message.to_string() }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
  pub bookmarked: bool,
}

/// `GET /bookmarks/{userId}`
pub async fn status<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(target): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError>
where
  S: ChatStore + 'static,
{
  let bookmarked = state
    .store
    .has_bookmarked(session.user_id, target)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(StatusResponse { bookmarked }))
}

/// `GET /bookmarks`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Vec<UserSummary>>, ApiError>
where
  S: ChatStore + 'static,
{
  let users = state
    .store
    .list_bookmarks(session.user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(users))
}
