//! Domain rejections shared by every Tandem crate.

use thiserror::Error;
use uuid::Uuid;

/// A request the domain refuses, independent of how it is stored or served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("users cannot target themselves")]
  SelfTarget,

  #[error("user {user} is not a participant of chat {chat}")]
  NotParticipant { user: Uuid, chat: Uuid },

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("chat not found: {0}")]
  ChatNotFound(Uuid),

  #[error("message must not be empty")]
  EmptyContent,

  #[error("message is too long ({len} > {max} characters)")]
  ContentTooLong { len: usize, max: usize },
}

impl Error {
  /// Whether this rejection stems from malformed input rather than from who
  /// is asking.
  pub fn is_validation(&self) -> bool {
    matches!(self, Self::EmptyContent | Self::ContentTooLong { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
