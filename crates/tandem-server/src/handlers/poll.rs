//! `GET /chats/{id}/messages/poll`: the long-poll message endpoint.
//!
//! The request is held open while the store is queried every
//! `poll_interval_ms` for messages newer than the cursor. It answers as soon
//! as any exist, or with an empty list once `poll_timeout_ms` has elapsed.
//! The wait is a plain async sleep, so a parked poll costs no thread.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_core::{message::Message, store::ChatStore};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{AppState, error::ApiError, session::Session};

#[derive(Debug, Deserialize)]
pub struct PollParams {
  /// Timestamp of the newest message the client holds. Absent means the
  /// client holds nothing yet.
  #[serde(alias = "lastMessageTimestamp")]
  pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
  pub messages: Vec<Message>,
}

/// `GET /chats/{id}/messages/poll[?since=<rfc3339>]`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(chat_id): Path<Uuid>,
  Query(params): Query<PollParams>,
) -> Result<Json<PollResponse>, ApiError>
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

  let budget = state.config.poll_timeout();
  let interval = state.config.poll_interval();
  let started = Instant::now();

  loop {
    let messages = state
      .store
      .messages_since(chat_id, params.since)
      .await
      .map_err(ApiError::from_store)?;

    if !messages.is_empty() || started.elapsed() >= budget {
      return Ok(Json(PollResponse { messages }));
    }
    tokio::time::sleep(interval).await;
  }
}
