//! The SQLite implementation of [`ChatStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior, params};
use tandem_core::{
  chat::{ChatSummary, UserPair},
  edge::LikeOutcome,
  message::{Message, MessageContent, MessagePage},
  store::ChatStore,
  user::{User, UserSummary},
};
use uuid::Uuid;

use crate::{
  Error, Result,
  chats::{self, MessageRow},
  encode::{
    MESSAGE_COLUMNS, RawChatSummary, RawMessage, RawUser, USER_COLUMNS, decode_dt, decode_uuid,
    encode_dt, encode_uuid,
  },
  matching,
  schema::SCHEMA,
};

/// Largest history page the store hands out.
const MAX_PAGE: usize = 100;

/// How long a writer waits for another connection's write lock before
/// giving up with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tandem store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  /// Shared body of the like/bookmark existence checks.
  async fn edge_exists(&self, sql: &'static str, from: Uuid, to: Uuid) -> Result<bool> {
    let from = encode_uuid(from);
    let to = encode_uuid(to);
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, params![from, to], |_| Ok(true))
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  /// Users at the far end of `user_id`'s edges in a listing query.
  async fn user_listing(&self, sql: &'static str, user_id: Uuid) -> Result<Vec<UserSummary>> {
    let id_str = encode_uuid(user_id);
    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(params![id_str], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_summary).collect()
  }
}

// ─── ChatStore impl ──────────────────────────────────────────────────────────

impl ChatStore for SqliteStore {
  type Error = Error;

  // ── Users & sessions ──────────────────────────────────────────────────────

  async fn add_user(&self, name: Option<String>, image: Option<String>) -> Result<User> {
    let user = User { id: Uuid::new_v4(), name, image, created_at: crate::encode::now() };

    let id_str = encode_uuid(user.id);
    let at_str = encode_dt(user.created_at);
    let name = user.name.clone();
    let image = user.image.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, name, image, created_at) VALUES (?1, ?2, ?3, ?4)",
          params![id_str, name, image, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = ?1"),
              params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn add_session(&self, user_id: Uuid, token_digest: String) -> Result<()> {
    let id_str = encode_uuid(user_id);
    let at_str = encode_dt(crate::encode::now());

    let known = self
      .conn
      .call(move |conn| {
        if !chats::user_exists(conn, &id_str)? {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO sessions (token_digest, user_id, created_at) VALUES (?1, ?2, ?3)",
          params![token_digest, id_str, at_str],
        )?;
        Ok(true)
      })
      .await?;

    if !known {
      return Err(tandem_core::Error::UserNotFound(user_id).into());
    }
    Ok(())
  }

  async fn session_user(&self, token_digest: String) -> Result<Option<Uuid>> {
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id FROM sessions WHERE token_digest = ?1",
              params![token_digest],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.as_deref().map(decode_uuid).transpose()
  }

  // ── Chats ─────────────────────────────────────────────────────────────────

  async fn find_or_create_chat(&self, a: Uuid, b: Uuid) -> Result<Uuid> {
    let pair = UserPair::new(a, b).ok_or(tandem_core::Error::SelfTarget)?;

    let chat_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for id in [a, b] {
          if !chats::user_exists(&tx, &encode_uuid(id))? {
            return Ok(Err(tandem_core::Error::UserNotFound(id)));
          }
        }
        let chat_id = chats::find_or_create_pair_chat(&tx, pair, crate::encode::now())?;
        tx.commit()?;
        Ok(Ok(chat_id))
      })
      .await??;

    decode_uuid(&chat_id)
  }

  async fn is_participant(&self, user_id: Uuid, chat_id: Uuid) -> Result<bool> {
    let user = encode_uuid(user_id);
    let chat = encode_uuid(chat_id);
    let found = self
      .conn
      .call(move |conn| Ok(chats::is_participant(conn, &user, &chat)?))
      .await?;
    Ok(found)
  }

  async fn list_chats(&self, user_id: Uuid) -> Result<Vec<ChatSummary>> {
    let user = encode_uuid(user_id);

    let raws: Vec<RawChatSummary> = self
      .conn
      .call(move |conn| {
        let mut chats_stmt = conn.prepare(
          "SELECT c.chat_id, c.updated_at
           FROM chats c
           JOIN chat_participants p ON p.chat_id = c.chat_id
           WHERE p.user_id = ?1
           ORDER BY c.updated_at DESC, c.rowid DESC",
        )?;
        let listed = chats_stmt
          .query_map(params![user], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(listed.len());
        for (chat_id, updated_at) in listed {
          let other = conn
            .query_row(
              &format!(
                "SELECT {USER_COLUMNS}
                 FROM chat_participants p JOIN users u ON u.user_id = p.user_id
                 WHERE p.chat_id = ?1 AND p.user_id != ?2"
              ),
              params![chat_id, user],
              RawUser::from_row,
            )
            .optional()?;
          let last_message = conn
            .query_row(
              &format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m LEFT JOIN users a ON a.user_id = m.author_id
                 WHERE m.chat_id = ?1
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT 1"
              ),
              params![chat_id],
              RawMessage::from_row,
            )
            .optional()?;
          let unread = chats::unread_in_chat(conn, &user, &chat_id)?;
          out.push(RawChatSummary { chat_id, updated_at, other, last_message, unread });
        }
        Ok(out)
      })
      .await?;

    raws.into_iter().map(RawChatSummary::into_summary).collect()
  }

  async fn mark_read(&self, user_id: Uuid, chat_id: Uuid) -> Result<DateTime<Utc>> {
    let user = encode_uuid(user_id);
    let chat = encode_uuid(chat_id);
    let now = encode_dt(crate::encode::now());

    let watermark: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "UPDATE chat_participants
               SET last_read_at = CASE
                 WHEN last_read_at IS NULL OR last_read_at < ?3 THEN ?3
                 ELSE last_read_at
               END
               WHERE user_id = ?1 AND chat_id = ?2
               RETURNING last_read_at",
              params![user, chat, now],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    match watermark {
      Some(at) => decode_dt(&at),
      None => Err(tandem_core::Error::NotParticipant { user: user_id, chat: chat_id }.into()),
    }
  }

  async fn unread_count(&self, user_id: Uuid) -> Result<u64> {
    let user = encode_uuid(user_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*)
           FROM chat_participants p
           JOIN messages m ON m.chat_id = p.chat_id
           WHERE p.user_id = ?1
             AND m.author_id != ?1
             AND (p.last_read_at IS NULL OR m.created_at > p.last_read_at)",
          params![user],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(u64::try_from(count).unwrap_or(0))
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn messages_since(
    &self,
    chat_id: Uuid,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<Message>> {
    let chat = encode_uuid(chat_id);
    let since = encode_dt(since.unwrap_or(DateTime::UNIX_EPOCH));

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS}
           FROM messages m LEFT JOIN users a ON a.user_id = m.author_id
           WHERE m.chat_id = ?1 AND m.created_at > ?2
           ORDER BY m.created_at ASC, m.rowid ASC"
        ))?;
        let rows = stmt
          .query_map(params![chat, since], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn message_page(
    &self,
    chat_id: Uuid,
    before: Option<Uuid>,
    limit: usize,
  ) -> Result<MessagePage> {
    let chat = encode_uuid(chat_id);
    let before = before.map(encode_uuid);
    let limit = limit.clamp(1, MAX_PAGE);
    let fetch = (limit + 1) as i64;

    let mut raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let anchor: Option<String> = match &before {
          Some(id) => {
            let at = conn
              .query_row(
                "SELECT created_at FROM messages WHERE message_id = ?1 AND chat_id = ?2",
                params![id, chat],
                |r| r.get(0),
              )
              .optional()?;
            // An unknown cursor has nothing older than it.
            if at.is_none() {
              return Ok(Vec::new());
            }
            at
          }
          None => None,
        };

        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS}
           FROM messages m LEFT JOIN users a ON a.user_id = m.author_id
           WHERE m.chat_id = ?1 AND (?2 IS NULL OR m.created_at < ?2)
           ORDER BY m.created_at DESC, m.rowid DESC
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(params![chat, anchor, fetch], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let has_more = raws.len() > limit;
    raws.truncate(limit);
    raws.reverse();

    let messages: Vec<Message> = raws
      .into_iter()
      .map(RawMessage::into_message)
      .collect::<Result<_>>()?;
    let next_cursor = if has_more { messages.first().map(|m| m.id) } else { None };

    Ok(MessagePage { messages, next_cursor, has_more })
  }

  async fn send_message(
    &self,
    author_id: Uuid,
    chat_id: Uuid,
    content: MessageContent,
  ) -> Result<Message> {
    let author = encode_uuid(author_id);
    let chat = encode_uuid(chat_id);
    let content = content.into_inner();

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !chats::is_participant(&tx, &author, &chat)? {
          return Ok(Err(tandem_core::Error::NotParticipant { user: author_id, chat: chat_id }));
        }
        let created_at = chats::next_message_time(&tx, &chat, crate::encode::now())?;
        let raw = chats::insert_message(&tx, MessageRow {
          chat_id: &chat,
          author_id: Some(&author),
          content: &content,
          created_at,
          is_system: false,
        })?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_message()
  }

  // ── Likes ─────────────────────────────────────────────────────────────────

  async fn toggle_like(&self, actor_id: Uuid, target_id: Uuid) -> Result<LikeOutcome> {
    if actor_id == target_id {
      return Err(tandem_core::Error::SelfTarget.into());
    }

    let raw = self
      .conn
      .call(move |conn| Ok(matching::toggle_like(conn, actor_id, target_id)?))
      .await??;

    Ok(LikeOutcome {
      liked:   raw.liked,
      matched: raw.matched,
      chat_id: raw.chat_id.as_deref().map(decode_uuid).transpose()?,
    })
  }

  async fn has_liked(&self, actor_id: Uuid, target_id: Uuid) -> Result<bool> {
    self
      .edge_exists(
        "SELECT 1 FROM photo_likes WHERE liker_id = ?1 AND liked_user_id = ?2",
        actor_id,
        target_id,
      )
      .await
  }

  async fn likes_received(&self, user_id: Uuid) -> Result<Vec<UserSummary>> {
    self
      .user_listing(
        "SELECT u.user_id, u.name, u.image, u.created_at
         FROM photo_likes l JOIN users u ON u.user_id = l.liker_id
         WHERE l.liked_user_id = ?1
         ORDER BY l.created_at DESC, l.rowid DESC",
        user_id,
      )
      .await
  }

  // ── Bookmarks ─────────────────────────────────────────────────────────────

  async fn toggle_bookmark(&self, actor_id: Uuid, target_id: Uuid) -> Result<bool> {
    if actor_id == target_id {
      return Err(tandem_core::Error::SelfTarget.into());
    }
    let actor = encode_uuid(actor_id);
    let target = encode_uuid(target_id);
    let now = encode_dt(crate::encode::now());

    let bookmarked = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !chats::user_exists(&tx, &target)? {
          return Ok(Err(tandem_core::Error::UserNotFound(target_id)));
        }
        let removed = tx.execute(
          "DELETE FROM bookmarks WHERE bookmarker_id = ?1 AND bookmarked_user_id = ?2",
          params![actor, target],
        )?;
        if removed == 0 {
          tx.execute(
            "INSERT INTO bookmarks (bookmarker_id, bookmarked_user_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![actor, target, now],
          )?;
        }
        tx.commit()?;
        Ok(Ok(removed == 0))
      })
      .await??;

    Ok(bookmarked)
  }

  async fn has_bookmarked(&self, actor_id: Uuid, target_id: Uuid) -> Result<bool> {
    self
      .edge_exists(
        "SELECT 1 FROM bookmarks WHERE bookmarker_id = ?1 AND bookmarked_user_id = ?2",
        actor_id,
        target_id,
      )
      .await
  }

  async fn list_bookmarks(&self, user_id: Uuid) -> Result<Vec<UserSummary>> {
    self
      .user_listing(
        "SELECT u.user_id, u.name, u.image, u.created_at
         FROM bookmarks b JOIN users u ON u.user_id = b.bookmarked_user_id
         WHERE b.bookmarker_id = ?1
         ORDER BY b.created_at DESC, b.rowid DESC",
        user_id,
      )
      .await
  }
}
