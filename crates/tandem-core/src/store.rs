//! The `ChatStore` trait: everything the core needs from persistence.
//!
//! The trait is implemented by storage backends (e.g. `tandem-store-sqlite`).
//! The server depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  chat::ChatSummary,
  edge::LikeOutcome,
  message::{Message, MessageContent, MessagePage},
  user::{User, UserSummary},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Implemented by backend error types so callers can tell a domain rejection
/// (bad input, wrong caller) from an internal storage failure.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The domain rejection this error carries, if any. `None` means the
  /// backend itself failed.
  fn rejection(&self) -> Option<&crate::Error>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Tandem store backend.
///
/// Every multi-row workflow (toggle-like with match detection, message send)
/// executes as a single store transaction. Self-targeting calls are rejected
/// with [`crate::Error::SelfTarget`] before anything is written.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ChatStore: Send + Sync {
  type Error: StoreError;

  // ── Users & sessions ──────────────────────────────────────────────────

  /// Persist a new user. Registration proper is external; this exists for
  /// seeding and tests.
  fn add_user(
    &self,
    name: Option<String>,
    image: Option<String>,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Retrieve a user by id. Returns `None` if not found.
  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Record a session for `user_id`, identified by the hex SHA-256 digest of
  /// its bearer token.
  fn add_session(
    &self,
    user_id: Uuid,
    token_digest: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Resolve a session token digest to its user.
  fn session_user(
    &self,
    token_digest: String,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  // ── Chats ─────────────────────────────────────────────────────────────

  /// Return the two-party chat between `a` and `b`, creating it if none
  /// exists. Never creates a second chat for the same pair.
  fn find_or_create_chat(
    &self,
    a: Uuid,
    b: Uuid,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  fn is_participant(
    &self,
    user_id: Uuid,
    chat_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All chats `user_id` takes part in, most recently active first.
  fn list_chats(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ChatSummary>, Self::Error>> + Send + '_;

  /// Move the caller's read watermark in `chat_id` to now and return it.
  /// Other participants' watermarks are untouched.
  fn mark_read(
    &self,
    user_id: Uuid,
    chat_id: Uuid,
  ) -> impl Future<Output = Result<DateTime<Utc>, Self::Error>> + Send + '_;

  /// Messages from others newer than the user's watermark, summed over every
  /// chat the user participates in.
  fn unread_count(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Messages in `chat_id` created strictly after `since` (all messages when
  /// `None`), oldest first, with author display fields attached.
  fn messages_since(
    &self,
    chat_id: Uuid,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  /// Up to `limit` messages older than the message `before` (the newest page
  /// when `None`), returned oldest first.
  fn message_page(
    &self,
    chat_id: Uuid,
    before: Option<Uuid>,
    limit: usize,
  ) -> impl Future<Output = Result<MessagePage, Self::Error>> + Send + '_;

  /// Insert an authored message and bump the chat's `updated_at` in one
  /// transaction. Rejects callers who are not participants.
  fn send_message(
    &self,
    author_id: Uuid,
    chat_id: Uuid,
    content: MessageContent,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  // ── Likes ─────────────────────────────────────────────────────────────

  /// Flip the `actor → target` like. When the flip creates a mutual like,
  /// the same transaction finds or creates the pair's chat and posts a
  /// system message announcing the match.
  fn toggle_like(
    &self,
    actor_id: Uuid,
    target_id: Uuid,
  ) -> impl Future<Output = Result<LikeOutcome, Self::Error>> + Send + '_;

  fn has_liked(
    &self,
    actor_id: Uuid,
    target_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Users who like `user_id`, newest like first.
  fn likes_received(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<UserSummary>, Self::Error>> + Send + '_;

  // ── Bookmarks ─────────────────────────────────────────────────────────

  /// Flip the `actor → target` bookmark; returns whether it now exists.
  fn toggle_bookmark(
    &self,
    actor_id: Uuid,
    target_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn has_bookmarked(
    &self,
    actor_id: Uuid,
    target_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Users `user_id` has bookmarked, newest first.
  fn list_bookmarks(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<UserSummary>, Self::Error>> + Send + '_;
}
