//! Chat bookkeeping shared by every write path: the two-party chat lookup,
//! chat creation, and message insertion.
//!
//! These run on the database thread against a connection or an open
//! transaction (`rusqlite::Transaction` derefs to `Connection`), so callers
//! decide the transaction boundary.

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use tandem_core::chat::UserPair;
use uuid::Uuid;

use crate::encode::{MESSAGE_COLUMNS, RawMessage, decode_dt, encode_dt, encode_uuid};

/// A chat whose participants include both users and nobody else.
const FIND_PAIR_CHAT: &str = "
  SELECT c.chat_id FROM chats c
  WHERE EXISTS (SELECT 1 FROM chat_participants p
                WHERE p.chat_id = c.chat_id AND p.user_id = ?1)
    AND EXISTS (SELECT 1 FROM chat_participants p
                WHERE p.chat_id = c.chat_id AND p.user_id = ?2)
    AND NOT EXISTS (SELECT 1 FROM chat_participants p
                    WHERE p.chat_id = c.chat_id AND p.user_id NOT IN (?1, ?2))
  LIMIT 1";

pub fn user_exists(conn: &Connection, user_id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM users WHERE user_id = ?1", params![user_id], |_| {
        Ok(true)
      })
      .optional()?
      .unwrap_or(false),
  )
}

pub fn is_participant(conn: &Connection, user_id: &str, chat_id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM chat_participants WHERE user_id = ?1 AND chat_id = ?2",
        params![user_id, chat_id],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

/// Find the two-party chat for `pair`, creating it (with both participants)
/// if none exists. Returns the hyphenated chat id.
///
/// Must run inside a write transaction so the lookup and the insert cannot
/// interleave with a concurrent caller for the same pair.
pub fn find_or_create_pair_chat(
  conn: &Connection,
  pair: UserPair,
  now: DateTime<Utc>,
) -> rusqlite::Result<String> {
  let low = encode_uuid(pair.low());
  let high = encode_uuid(pair.high());

  let existing: Option<String> = conn
    .query_row(FIND_PAIR_CHAT, params![low, high], |r| r.get(0))
    .optional()?;
  if let Some(chat_id) = existing {
    return Ok(chat_id);
  }

  let chat_id = encode_uuid(Uuid::new_v4());
  let at = encode_dt(now);
  conn.execute(
    "INSERT INTO chats (chat_id, user_low, user_high, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?4)",
    params![chat_id, low, high, at],
  )?;
  for user in [&low, &high] {
    conn.execute(
      "INSERT INTO chat_participants (user_id, chat_id, last_read_at) VALUES (?1, ?2, NULL)",
      params![user, chat_id],
    )?;
  }
  Ok(chat_id)
}

/// A creation time for the next message in `chat_id`: now, or one microsecond
/// past the chat's newest message if the clock has not moved beyond it.
pub fn next_message_time(
  conn: &Connection,
  chat_id: &str,
  now: DateTime<Utc>,
) -> rusqlite::Result<DateTime<Utc>> {
  let newest: Option<String> = conn.query_row(
    "SELECT MAX(created_at) FROM messages WHERE chat_id = ?1",
    params![chat_id],
    |r| r.get(0),
  )?;
  let newest = newest.and_then(|s| decode_dt(&s).ok());
  Ok(match newest {
    Some(t) if t >= now => t + TimeDelta::microseconds(1),
    _ => now,
  })
}

/// A message row to insert.
pub struct MessageRow<'a> {
  pub chat_id:    &'a str,
  pub author_id:  Option<&'a str>,
  pub content:    &'a str,
  pub created_at: DateTime<Utc>,
  pub is_system:  bool,
}

/// Insert a message, bump its chat's `updated_at` to the message time, and
/// read the stored row back with author fields attached.
pub fn insert_message(conn: &Connection, row: MessageRow<'_>) -> rusqlite::Result<RawMessage> {
  let message_id = encode_uuid(Uuid::new_v4());
  let at = encode_dt(row.created_at);

  conn.execute(
    "INSERT INTO messages (message_id, chat_id, author_id, content, created_at, is_system)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![message_id, row.chat_id, row.author_id, row.content, at, row.is_system],
  )?;
  conn.execute(
    "UPDATE chats SET updated_at = ?2 WHERE chat_id = ?1",
    params![row.chat_id, at],
  )?;

  conn.query_row(
    &format!(
      "SELECT {MESSAGE_COLUMNS}
       FROM messages m LEFT JOIN users a ON a.user_id = m.author_id
       WHERE m.message_id = ?1"
    ),
    params![message_id],
    RawMessage::from_row,
  )
}

/// Messages from anyone but `user_id` newer than the user's watermark in
/// `chat_id`. System messages have no author and never count.
pub fn unread_in_chat(conn: &Connection, user_id: &str, chat_id: &str) -> rusqlite::Result<i64> {
  conn.query_row(
    "SELECT COUNT(*)
     FROM chat_participants p
     JOIN messages m ON m.chat_id = p.chat_id
     WHERE p.user_id = ?1 AND p.chat_id = ?2
       AND m.author_id != ?1
       AND (p.last_read_at IS NULL OR m.created_at > p.last_read_at)",
    params![user_id, chat_id],
    |r| r.get(0),
  )
}
