//! The match engine: toggle a like and, when it becomes mutual, open the
//! pair's chat with a system announcement. Everything below runs in one
//! immediate transaction; any failure rolls the whole toggle back.

use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params};
use tandem_core::{chat::UserPair, edge::match_announcement};
use uuid::Uuid;

use crate::{
  chats::{self, MessageRow},
  encode::{self, encode_dt, encode_uuid},
};

/// Outcome of a like toggle before the chat id is decoded.
pub struct RawLikeOutcome {
  pub liked:   bool,
  pub matched: bool,
  pub chat_id: Option<String>,
}

fn like_exists(conn: &Connection, liker: &str, liked: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM photo_likes WHERE liker_id = ?1 AND liked_user_id = ?2",
        params![liker, liked],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

/// Flip `actor → target`. Returns `Ok(Err(_))` for domain rejections, in
/// which case nothing was written.
pub fn toggle_like(
  conn: &mut Connection,
  actor: Uuid,
  target: Uuid,
) -> rusqlite::Result<Result<RawLikeOutcome, tandem_core::Error>> {
  let Some(pair) = UserPair::new(actor, target) else {
    return Ok(Err(tandem_core::Error::SelfTarget));
  };
  let actor_str = encode_uuid(actor);
  let target_str = encode_uuid(target);

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  for (id, id_str) in [(actor, &actor_str), (target, &target_str)] {
    if !chats::user_exists(&tx, id_str)? {
      return Ok(Err(tandem_core::Error::UserNotFound(id)));
    }
  }

  if like_exists(&tx, &actor_str, &target_str)? {
    tx.execute(
      "DELETE FROM photo_likes WHERE liker_id = ?1 AND liked_user_id = ?2",
      params![actor_str, target_str],
    )?;
    tx.commit()?;
    return Ok(Ok(RawLikeOutcome { liked: false, matched: false, chat_id: None }));
  }

  let now = encode::now();
  tx.execute(
    "INSERT INTO photo_likes (liker_id, liked_user_id, created_at) VALUES (?1, ?2, ?3)",
    params![actor_str, target_str, encode_dt(now)],
  )?;

  if !like_exists(&tx, &target_str, &actor_str)? {
    tx.commit()?;
    return Ok(Ok(RawLikeOutcome { liked: true, matched: false, chat_id: None }));
  }

  let chat_id = chats::find_or_create_pair_chat(&tx, pair, now)?;

  let actor_name: Option<String> = tx.query_row(
    "SELECT name FROM users WHERE user_id = ?1",
    params![actor_str],
    |r| r.get(0),
  )?;
  let content = match_announcement(actor_name.as_deref().unwrap_or("someone"));
  let created_at = chats::next_message_time(&tx, &chat_id, now)?;
  chats::insert_message(&tx, MessageRow {
    chat_id: &chat_id,
    author_id: None,
    content: &content,
    created_at,
    is_system: true,
  })?;

  tx.commit()?;
  Ok(Ok(RawLikeOutcome { liked: true, matched: true, chat_id: Some(chat_id) }))
}
