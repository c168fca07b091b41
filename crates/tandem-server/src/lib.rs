//! JSON HTTP API for Tandem.
//!
//! Exposes an axum [`Router`] backed by any [`ChatStore`]: the long-poll
//! message endpoint, chat coordination, and the like/bookmark toggles. Every
//! route lives under `/api` and requires a bearer session (see [`session`]).
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/me` | Caller's user record |
//! | `GET`  | `/api/unread` | `{ count }` over all chats |
//! | `GET`  | `/api/chats` | Chat list, most recent first |
//! | `POST` | `/api/chats` | Body `{ receiverId }`, find-or-create |
//! | `POST` | `/api/chats/{id}/read` | Move the caller's watermark |
//! | `GET`  | `/api/chats/{id}/messages` | Paged history |
//! | `POST` | `/api/chats/{id}/messages` | Body `{ content }` |
//! | `GET`  | `/api/chats/{id}/messages/poll` | Long poll, `?since=` |
//! | `GET`  | `/api/likes/received` | Users who like the caller |
//! | `GET`  | `/api/likes/{userId}` | `{ liked }` |
//! | `POST` | `/api/likes/{userId}/toggle` | Match engine |
//! | `GET`  | `/api/bookmarks` | Bookmarked users |
//! | `GET`  | `/api/bookmarks/{userId}` | `{ bookmarked }` |
//! | `POST` | `/api/bookmarks/{userId}/toggle` | |

pub mod error;
pub mod handlers;
pub mod session;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tandem_core::store::ChatStore;
use tower_http::trace::TraceLayer;

use handlers::{bookmarks, chats, likes, messages, poll};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TANDEM_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// Total time a poll request may wait for new messages.
  pub poll_timeout_ms:  u64,
  /// Pause between store queries while a poll request waits.
  pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:             "127.0.0.1".to_string(),
      port:             8080,
      store_path:       PathBuf::from("tandem.db"),
      poll_timeout_ms:  25_000,
      poll_interval_ms: 2_000,
    }
  }
}

impl ServerConfig {
  pub fn poll_timeout(&self) -> Duration { Duration::from_millis(self.poll_timeout_ms) }

  pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
}

impl<S> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    Self { store: Arc::new(store), config: Arc::new(config) }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), config: Arc::clone(&self.config) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the Tandem API router, nested under `/api` and wrapped in a
/// request trace layer.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ChatStore + 'static,
{
  let api = Router::new()
    .route("/me", get(chats::me::<S>))
    .route("/unread", get(chats::unread::<S>))
    // Chats & messages
    .route("/chats", get(chats::list::<S>).post(chats::find_or_create::<S>))
    .route("/chats/{id}/read", post(chats::mark_read::<S>))
    .route("/chats/{id}/messages", get(messages::page::<S>).post(messages::send::<S>))
    .route("/chats/{id}/messages/poll", get(poll::handler::<S>))
    // Likes
    .route("/likes/received", get(likes::received::<S>))
    .route("/likes/{user_id}", get(likes::status::<S>))
    .route("/likes/{user_id}/toggle", post(likes::toggle::<S>))
    // Bookmarks
    .route("/bookmarks", get(bookmarks::list::<S>))
    .route("/bookmarks/{user_id}", get(bookmarks::status::<S>))
    .route("/bookmarks/{user_id}/toggle", post(bookmarks::toggle::<S>));

  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
