//! Directed user-to-user edges: likes and bookmarks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of toggling a like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
  /// The like edge exists after the toggle.
  pub liked:   bool,
  /// The toggle created a mutual like.
  pub matched: bool,
  /// The two-party chat announcing the match; set only when `matched`.
  pub chat_id: Option<Uuid>,
}

impl LikeOutcome {
  pub fn unliked() -> Self {
    Self { liked: false, matched: false, chat_id: None }
  }

  pub fn liked() -> Self {
    Self { liked: true, matched: false, chat_id: None }
  }

  pub fn matched(chat_id: Uuid) -> Self {
    Self { liked: true, matched: true, chat_id: Some(chat_id) }
  }
}

/// Text of the system message posted into a chat when two users match.
pub fn match_announcement(liker_name: &str) -> String {
  format!("🎉 You and {liker_name} liked each other! Start a conversation.")
}
