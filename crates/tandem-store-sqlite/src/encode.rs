//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision so lexical order equals chronological order. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use tandem_core::{
  chat::Chat,
  message::Message,
  user::{User, UserSummary},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// The current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawUser::from_row`].
pub const USER_COLUMNS: &str = "u.user_id, u.name, u.image, u.created_at";

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:    String,
  pub name:       Option<String>,
  pub image:      Option<String>,
  pub created_at: String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      name:       row.get(1)?,
      image:      row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:         decode_uuid(&self.user_id)?,
      name:       self.name,
      image:      self.image,
      created_at: decode_dt(&self.created_at)?,
    })
  }

  pub fn into_summary(self) -> Result<UserSummary> {
    Ok(UserSummary {
      id:    decode_uuid(&self.user_id)?,
      name:  self.name,
      image: self.image,
    })
  }
}

/// Column list matching [`RawMessage::from_row`]; expects `messages m LEFT
/// JOIN users a ON a.user_id = m.author_id`.
pub const MESSAGE_COLUMNS: &str = "m.message_id, m.chat_id, m.content, m.created_at, \
   m.author_id, m.is_system, a.name, a.image";

/// Raw strings read from a `messages` row joined with its author.
pub struct RawMessage {
  pub message_id:   String,
  pub chat_id:      String,
  pub content:      String,
  pub created_at:   String,
  pub author_id:    Option<String>,
  pub is_system:    bool,
  pub author_name:  Option<String>,
  pub author_image: Option<String>,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:   row.get(0)?,
      chat_id:      row.get(1)?,
      content:      row.get(2)?,
      created_at:   row.get(3)?,
      author_id:    row.get(4)?,
      is_system:    row.get(5)?,
      author_name:  row.get(6)?,
      author_image: row.get(7)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    let author_id = self.author_id.as_deref().map(decode_uuid).transpose()?;
    let author = author_id.map(|id| UserSummary {
      id,
      name: self.author_name,
      image: self.author_image,
    });

    Ok(Message {
      id: decode_uuid(&self.message_id)?,
      chat_id: decode_uuid(&self.chat_id)?,
      content: self.content,
      created_at: decode_dt(&self.created_at)?,
      author_id,
      author,
      is_system_message: self.is_system,
    })
  }
}

/// One row of a user's chat list, before decoding.
pub struct RawChatSummary {
  pub chat_id:      String,
  pub updated_at:   String,
  pub other:        Option<RawUser>,
  pub last_message: Option<RawMessage>,
  pub unread:       i64,
}

impl RawChatSummary {
  pub fn into_summary(self) -> Result<tandem_core::chat::ChatSummary> {
    Ok(tandem_core::chat::ChatSummary {
      chat:         Chat {
        id:         decode_uuid(&self.chat_id)?,
        updated_at: decode_dt(&self.updated_at)?,
      },
      other:        self.other.map(RawUser::into_summary).transpose()?,
      last_message: self.last_message.map(RawMessage::into_message).transpose()?,
      unread:       u64::try_from(self.unread).unwrap_or(0),
    })
  }
}
