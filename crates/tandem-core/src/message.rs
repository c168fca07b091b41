//! Messages and the validation applied before one is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, user::UserSummary};

/// Upper bound on message length, counted in characters.
pub const MAX_CONTENT_CHARS: usize = 1000;

/// A chat message as delivered to clients.
///
/// System messages (match announcements) have no author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  pub id:                Uuid,
  pub chat_id:           Uuid,
  pub content:           String,
  /// Server-assigned; strictly increasing within a chat.
  pub created_at:        DateTime<Utc>,
  pub author_id:         Option<Uuid>,
  pub author:            Option<UserSummary>,
  pub is_system_message: bool,
}

/// Message text that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent(String);

impl MessageContent {
  /// Accept `raw` if it has visible content and at most
  /// [`MAX_CONTENT_CHARS`] characters.
  pub fn parse(raw: impl Into<String>) -> Result<Self> {
    let raw = raw.into();
    if raw.trim().is_empty() {
      return Err(Error::EmptyContent);
    }
    let len = raw.chars().count();
    if len > MAX_CONTENT_CHARS {
      return Err(Error::ContentTooLong { len, max: MAX_CONTENT_CHARS });
    }
    Ok(Self(raw))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn into_inner(self) -> String { self.0 }
}

/// One page of chat history, oldest message first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
  pub messages:    Vec<Message>,
  /// Pass back as `cursor` to fetch the next older page.
  pub next_cursor: Option<Uuid>,
  pub has_more:    bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_ordinary_text() {
    let c = MessageContent::parse("hello there").unwrap();
    assert_eq!(c.as_str(), "hello there");
  }

  #[test]
  fn rejects_empty_and_blank() {
    assert_eq!(MessageContent::parse(""), Err(Error::EmptyContent));
    assert_eq!(MessageContent::parse("  \n\t"), Err(Error::EmptyContent));
  }

  #[test]
  fn length_limit_counts_characters_not_bytes() {
    let at_limit = "é".repeat(MAX_CONTENT_CHARS);
    assert!(MessageContent::parse(at_limit).is_ok());

    let over = "a".repeat(MAX_CONTENT_CHARS + 1);
    assert_eq!(
      MessageContent::parse(over),
      Err(Error::ContentTooLong { len: MAX_CONTENT_CHARS + 1, max: MAX_CONTENT_CHARS })
    );
  }

  #[test]
  fn wire_format_is_camel_case() {
    let msg = Message {
      id:                Uuid::nil(),
      chat_id:           Uuid::nil(),
      content:           "hi".into(),
      created_at:        DateTime::UNIX_EPOCH,
      author_id:         None,
      author:            None,
      is_system_message: true,
    };
    let v = serde_json::to_value(&msg).unwrap();
    assert_eq!(v["isSystemMessage"], true);
    assert!(v["authorId"].is_null());
    assert!(v["author"].is_null());
    assert!(v.get("createdAt").is_some());
    assert!(v.get("chatId").is_some());
  }
}
