//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rusqlite::params;
use tandem_core::{
  message::MessageContent,
  store::{ChatStore, StoreError},
  user::User,
};
use uuid::Uuid;

use crate::{
  SqliteStore,
  encode::{encode_dt, encode_uuid},
};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore, name: &str) -> User {
  s.add_user(Some(name.into()), None).await.unwrap()
}

fn text(s: &str) -> MessageContent { MessageContent::parse(s).unwrap() }

fn t(secs: i64) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + TimeDelta::seconds(secs)
}

/// Insert a message with an explicit timestamp, bypassing the clock.
async fn insert_at(
  s: &SqliteStore,
  chat_id: Uuid,
  author: Option<Uuid>,
  at: DateTime<Utc>,
) -> Uuid {
  let id = Uuid::new_v4();
  let (id_s, chat_s, author_s, at_s) =
    (encode_uuid(id), encode_uuid(chat_id), author.map(encode_uuid), encode_dt(at));
  s.connection()
    .call(move |conn| {
      conn.execute(
        "INSERT INTO messages (message_id, chat_id, author_id, content, created_at, is_system)
         VALUES (?1, ?2, ?3, 'x', ?4, ?5)",
        params![id_s, chat_s, author_s, at_s, author_s.is_none()],
      )?;
      Ok(())
    })
    .await
    .unwrap();
  id
}

async fn set_watermark(s: &SqliteStore, user_id: Uuid, chat_id: Uuid, at: DateTime<Utc>) {
  let (u, c, a) = (encode_uuid(user_id), encode_uuid(chat_id), encode_dt(at));
  s.connection()
    .call(move |conn| {
      conn.execute(
        "UPDATE chat_participants SET last_read_at = ?3 WHERE user_id = ?1 AND chat_id = ?2",
        params![u, c, a],
      )?;
      Ok(())
    })
    .await
    .unwrap();
}

async fn count(s: &SqliteStore, sql: &'static str) -> i64 {
  s.connection()
    .call(move |conn| Ok(conn.query_row(sql, [], |r| r.get(0))?))
    .await
    .unwrap()
}

// ─── Users & sessions ────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_user() {
  let s = store().await;
  let alice = user(&s, "Alice").await;

  let fetched = s.get_user(alice.id).await.unwrap().unwrap();
  assert_eq!(fetched, alice);
  assert!(s.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn session_digest_resolves_to_user() {
  let s = store().await;
  let alice = user(&s, "Alice").await;

  s.add_session(alice.id, "abc123".into()).await.unwrap();

  assert_eq!(s.session_user("abc123".into()).await.unwrap(), Some(alice.id));
  assert_eq!(s.session_user("nope".into()).await.unwrap(), None);
}

#[tokio::test]
async fn session_for_unknown_user_is_rejected() {
  let s = store().await;
  let err = s.add_session(Uuid::new_v4(), "abc".into()).await.unwrap_err();
  assert!(matches!(err.rejection(), Some(tandem_core::Error::UserNotFound(_))));
}

// ─── Match engine ────────────────────────────────────────────────────────────

#[tokio::test]
async fn like_then_unlike_leaves_no_edges_and_no_chat() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);

  let first = s.toggle_like(a.id, b.id).await.unwrap();
  assert!(first.liked && !first.matched && first.chat_id.is_none());
  assert!(s.has_liked(a.id, b.id).await.unwrap());

  let second = s.toggle_like(a.id, b.id).await.unwrap();
  assert!(!second.liked && !second.matched && second.chat_id.is_none());

  assert_eq!(count(&s, "SELECT COUNT(*) FROM photo_likes").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM chats").await, 0);
}

#[tokio::test]
async fn mutual_like_creates_chat_with_one_system_message() {
  let s = store().await;
  let (a, b) = (user(&s, "Ada").await, user(&s, "Bo").await);

  let one_way = s.toggle_like(a.id, b.id).await.unwrap();
  assert!(!one_way.matched);

  let mutual = s.toggle_like(b.id, a.id).await.unwrap();
  assert!(mutual.liked && mutual.matched);
  let chat_id = mutual.chat_id.expect("chat id on match");

  assert!(s.is_participant(a.id, chat_id).await.unwrap());
  assert!(s.is_participant(b.id, chat_id).await.unwrap());
  assert_eq!(count(&s, "SELECT COUNT(*) FROM chat_participants").await, 2);

  let messages = s.messages_since(chat_id, None).await.unwrap();
  assert_eq!(messages.len(), 1);
  let announcement = &messages[0];
  assert!(announcement.is_system_message);
  assert!(announcement.author_id.is_none());
  assert!(announcement.author.is_none());
  assert!(announcement.content.contains("Bo"), "{}", announcement.content);
}

#[tokio::test]
async fn match_reuses_existing_chat() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);

  let existing = s.find_or_create_chat(a.id, b.id).await.unwrap();
  s.toggle_like(a.id, b.id).await.unwrap();
  let mutual = s.toggle_like(b.id, a.id).await.unwrap();

  assert_eq!(mutual.chat_id, Some(existing));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM chats").await, 1);
}

#[tokio::test]
async fn rematch_after_unlike_does_not_duplicate_chat() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);

  s.toggle_like(a.id, b.id).await.unwrap();
  let first = s.toggle_like(b.id, a.id).await.unwrap();
  s.toggle_like(b.id, a.id).await.unwrap(); // unlike
  let again = s.toggle_like(b.id, a.id).await.unwrap();

  assert!(again.matched);
  assert_eq!(first.chat_id, again.chat_id);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM chats").await, 1);
  let chat_id = again.chat_id.unwrap();
  assert_eq!(s.messages_since(chat_id, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_mutual_likes_create_one_chat() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);

  let (ab, ba) = tokio::join!(s.toggle_like(a.id, b.id), s.toggle_like(b.id, a.id));
  let (ab, ba) = (ab.unwrap(), ba.unwrap());

  assert!(ab.liked && ba.liked);
  assert_eq!(u8::from(ab.matched) + u8::from(ba.matched), 1);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM chats").await, 1);
}

#[tokio::test]
async fn mutual_likes_from_separate_connections_create_one_chat() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("tandem.db");
  let first = SqliteStore::open(&path).await.unwrap();
  let second = SqliteStore::open(&path).await.unwrap();

  for round in 0..8 {
    let a = user(&first, &format!("A{round}")).await;
    let b = user(&first, &format!("B{round}")).await;

    let (ab, ba) = tokio::join!(first.toggle_like(a.id, b.id), second.toggle_like(b.id, a.id));
    let (ab, ba) = (ab.unwrap(), ba.unwrap());

    assert!(ab.liked && ba.liked);
    assert_eq!(u8::from(ab.matched) + u8::from(ba.matched), 1, "round {round}");
    assert_eq!(ab.chat_id.or(ba.chat_id), first.find_or_create_chat(a.id, b.id).await.ok());
  }
  assert_eq!(count(&first, "SELECT COUNT(*) FROM chats").await, 8);
  assert_eq!(
    count(&first, "SELECT COUNT(*) FROM messages WHERE is_system = 1").await,
    8
  );
}

#[tokio::test]
async fn failed_match_rolls_back_like_and_chat() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);
  s.toggle_like(a.id, b.id).await.unwrap();

  // Make the announcement insert, the last step of a match, fail.
  s.connection()
    .call(|conn| {
      conn.execute_batch(
        "CREATE TRIGGER refuse_messages BEFORE INSERT ON messages
         BEGIN SELECT RAISE(ABORT, 'messages are read-only'); END;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let err = s.toggle_like(b.id, a.id).await.unwrap_err();
  assert!(err.rejection().is_none());

  assert_eq!(count(&s, "SELECT COUNT(*) FROM photo_likes").await, 1);
  assert!(s.has_liked(a.id, b.id).await.unwrap());
  assert!(!s.has_liked(b.id, a.id).await.unwrap());
  assert_eq!(count(&s, "SELECT COUNT(*) FROM chats").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM chat_participants").await, 0);
}

#[tokio::test]
async fn self_like_is_rejected_without_writes() {
  let s = store().await;
  let a = user(&s, "A").await;

  let err = s.toggle_like(a.id, a.id).await.unwrap_err();
  assert_eq!(err.rejection(), Some(&tandem_core::Error::SelfTarget));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM photo_likes").await, 0);
}

#[tokio::test]
async fn like_of_unknown_user_is_rejected() {
  let s = store().await;
  let a = user(&s, "A").await;
  let ghost = Uuid::new_v4();

  let err = s.toggle_like(a.id, ghost).await.unwrap_err();
  assert_eq!(err.rejection(), Some(&tandem_core::Error::UserNotFound(ghost)));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM photo_likes").await, 0);
}

#[tokio::test]
async fn likes_received_lists_likers() {
  let s = store().await;
  let (a, b, c) = (user(&s, "A").await, user(&s, "B").await, user(&s, "C").await);

  s.toggle_like(b.id, a.id).await.unwrap();
  s.toggle_like(c.id, a.id).await.unwrap();

  let likers = s.likes_received(a.id).await.unwrap();
  let ids: Vec<_> = likers.iter().map(|u| u.id).collect();
  assert_eq!(ids.len(), 2);
  assert!(ids.contains(&b.id) && ids.contains(&c.id));
  assert!(s.likes_received(b.id).await.unwrap().is_empty());
}

// ─── Bookmarks ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn bookmark_toggles() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);

  assert!(s.toggle_bookmark(a.id, b.id).await.unwrap());
  assert!(s.has_bookmarked(a.id, b.id).await.unwrap());
  assert!(!s.has_bookmarked(b.id, a.id).await.unwrap());
  assert_eq!(s.list_bookmarks(a.id).await.unwrap()[0].id, b.id);

  assert!(!s.toggle_bookmark(a.id, b.id).await.unwrap());
  assert!(s.list_bookmarks(a.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn self_bookmark_is_rejected() {
  let s = store().await;
  let a = user(&s, "A").await;

  let err = s.toggle_bookmark(a.id, a.id).await.unwrap_err();
  assert_eq!(err.rejection(), Some(&tandem_core::Error::SelfTarget));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM bookmarks").await, 0);
}

// ─── Chats ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_or_create_is_idempotent_and_order_independent() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);

  let first = s.find_or_create_chat(a.id, b.id).await.unwrap();
  let second = s.find_or_create_chat(a.id, b.id).await.unwrap();
  let reversed = s.find_or_create_chat(b.id, a.id).await.unwrap();

  assert_eq!(first, second);
  assert_eq!(first, reversed);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM chats").await, 1);
}

#[tokio::test]
async fn separate_pairs_get_separate_chats() {
  let s = store().await;
  let (a, b, c) = (user(&s, "A").await, user(&s, "B").await, user(&s, "C").await);

  let ab = s.find_or_create_chat(a.id, b.id).await.unwrap();
  let ac = s.find_or_create_chat(a.id, c.id).await.unwrap();

  assert_ne!(ab, ac);
  assert!(!s.is_participant(c.id, ab).await.unwrap());
}

#[tokio::test]
async fn chat_with_self_is_rejected() {
  let s = store().await;
  let a = user(&s, "A").await;

  let err = s.find_or_create_chat(a.id, a.id).await.unwrap_err();
  assert_eq!(err.rejection(), Some(&tandem_core::Error::SelfTarget));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM chats").await, 0);
}

#[tokio::test]
async fn list_chats_orders_by_activity() {
  let s = store().await;
  let (a, b, c) = (user(&s, "A").await, user(&s, "B").await, user(&s, "C").await);

  let ab = s.find_or_create_chat(a.id, b.id).await.unwrap();
  let ac = s.find_or_create_chat(a.id, c.id).await.unwrap();
  s.send_message(b.id, ab, text("newest")).await.unwrap();

  let listed = s.list_chats(a.id).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert_eq!(listed[0].chat.id, ab);
  assert_eq!(listed[0].other.as_ref().map(|u| u.id), Some(b.id));
  assert_eq!(listed[0].last_message.as_ref().map(|m| m.content.as_str()), Some("newest"));
  assert_eq!(listed[0].unread, 1);
  assert_eq!(listed[1].chat.id, ac);
  assert!(listed[1].last_message.is_none());
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_message_attaches_author_and_bumps_chat() {
  let s = store().await;
  let (a, b) = (user(&s, "Ada").await, user(&s, "B").await);
  let chat = s.find_or_create_chat(a.id, b.id).await.unwrap();
  let before = s.list_chats(a.id).await.unwrap()[0].chat.updated_at;

  let msg = s.send_message(a.id, chat, text("hello")).await.unwrap();

  assert_eq!(msg.author_id, Some(a.id));
  assert_eq!(msg.author.as_ref().and_then(|u| u.name.as_deref()), Some("Ada"));
  assert!(!msg.is_system_message);
  let after = s.list_chats(a.id).await.unwrap()[0].chat.updated_at;
  assert!(after >= before);
  assert_eq!(after, msg.created_at);
}

#[tokio::test]
async fn non_participant_cannot_send() {
  let s = store().await;
  let (a, b, c) = (user(&s, "A").await, user(&s, "B").await, user(&s, "C").await);
  let chat = s.find_or_create_chat(a.id, b.id).await.unwrap();

  let err = s.send_message(c.id, chat, text("let me in")).await.unwrap_err();
  assert_eq!(
    err.rejection(),
    Some(&tandem_core::Error::NotParticipant { user: c.id, chat })
  );
  assert_eq!(count(&s, "SELECT COUNT(*) FROM messages").await, 0);
}

#[tokio::test]
async fn rapid_sends_get_strictly_increasing_timestamps() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);
  let chat = s.find_or_create_chat(a.id, b.id).await.unwrap();

  let mut stamps = Vec::new();
  for i in 0..20 {
    stamps.push(s.send_message(a.id, chat, text(&format!("m{i}"))).await.unwrap().created_at);
  }
  assert!(stamps.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn messages_since_cursor_is_exclusive_and_ascending() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);
  let chat = s.find_or_create_chat(a.id, b.id).await.unwrap();

  let m1 = insert_at(&s, chat, Some(a.id), t(1)).await;
  let m3 = insert_at(&s, chat, Some(b.id), t(3)).await;
  let m2 = insert_at(&s, chat, Some(a.id), t(2)).await;

  let all: Vec<_> = s.messages_since(chat, None).await.unwrap().iter().map(|m| m.id).collect();
  assert_eq!(all, vec![m1, m2, m3]);

  let after_t1: Vec<_> =
    s.messages_since(chat, Some(t(1))).await.unwrap().iter().map(|m| m.id).collect();
  assert_eq!(after_t1, vec![m2, m3]);

  assert!(s.messages_since(chat, Some(t(3))).await.unwrap().is_empty());
}

#[tokio::test]
async fn message_page_walks_backwards() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);
  let chat = s.find_or_create_chat(a.id, b.id).await.unwrap();

  let mut ids = Vec::new();
  for i in 0..5 {
    ids.push(insert_at(&s, chat, Some(a.id), t(i)).await);
  }

  let newest = s.message_page(chat, None, 2).await.unwrap();
  assert_eq!(newest.messages.iter().map(|m| m.id).collect::<Vec<_>>(), ids[3..5]);
  assert!(newest.has_more);
  assert_eq!(newest.next_cursor, Some(ids[3]));

  let middle = s.message_page(chat, newest.next_cursor, 2).await.unwrap();
  assert_eq!(middle.messages.iter().map(|m| m.id).collect::<Vec<_>>(), ids[1..3]);

  let last = s.message_page(chat, middle.next_cursor, 2).await.unwrap();
  assert_eq!(last.messages.iter().map(|m| m.id).collect::<Vec<_>>(), ids[0..1]);
  assert!(!last.has_more);
  assert!(last.next_cursor.is_none());
}

// ─── Read watermarks ─────────────────────────────────────────────────────────

#[tokio::test]
async fn unread_counts_only_others_after_watermark() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);
  let chat = s.find_or_create_chat(a.id, b.id).await.unwrap();

  insert_at(&s, chat, Some(b.id), t(1)).await;
  insert_at(&s, chat, Some(b.id), t(2)).await;
  set_watermark(&s, a.id, chat, t(5)).await;
  insert_at(&s, chat, Some(b.id), t(6)).await;
  insert_at(&s, chat, Some(b.id), t(7)).await;
  insert_at(&s, chat, Some(b.id), t(8)).await;
  // Own messages never count.
  insert_at(&s, chat, Some(a.id), t(9)).await;

  assert_eq!(s.unread_count(a.id).await.unwrap(), 3);
}

#[tokio::test]
async fn unread_sums_across_chats_and_null_watermark_means_all() {
  let s = store().await;
  let (a, b, c) = (user(&s, "A").await, user(&s, "B").await, user(&s, "C").await);
  let ab = s.find_or_create_chat(a.id, b.id).await.unwrap();
  let ac = s.find_or_create_chat(a.id, c.id).await.unwrap();

  insert_at(&s, ab, Some(b.id), t(1)).await;
  insert_at(&s, ab, Some(b.id), t(2)).await;
  insert_at(&s, ac, Some(c.id), t(3)).await;
  // Authorless system message: never unread.
  insert_at(&s, ac, None, t(4)).await;

  assert_eq!(s.unread_count(a.id).await.unwrap(), 3);

  set_watermark(&s, a.id, ac, t(3)).await;
  assert_eq!(s.unread_count(a.id).await.unwrap(), 2);
}

#[tokio::test]
async fn fresh_match_leaves_both_sides_with_nothing_unread() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);

  s.toggle_like(a.id, b.id).await.unwrap();
  let outcome = s.toggle_like(b.id, a.id).await.unwrap();
  assert!(outcome.matched);

  assert_eq!(s.unread_count(a.id).await.unwrap(), 0);
  assert_eq!(s.unread_count(b.id).await.unwrap(), 0);
  let listed = s.list_chats(a.id).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].unread, 0);
}

#[tokio::test]
async fn mark_read_moves_only_callers_watermark() {
  let s = store().await;
  let (a, b) = (user(&s, "A").await, user(&s, "B").await);
  let chat = s.find_or_create_chat(a.id, b.id).await.unwrap();
  s.send_message(b.id, chat, text("hi a")).await.unwrap();
  s.send_message(a.id, chat, text("hi b")).await.unwrap();

  let first = s.mark_read(a.id, chat).await.unwrap();
  let second = s.mark_read(a.id, chat).await.unwrap();

  assert!(second >= first);
  assert_eq!(s.unread_count(a.id).await.unwrap(), 0);
  assert_eq!(s.unread_count(b.id).await.unwrap(), 1);
}

#[tokio::test]
async fn mark_read_by_outsider_is_rejected() {
  let s = store().await;
  let (a, b, c) = (user(&s, "A").await, user(&s, "B").await, user(&s, "C").await);
  let chat = s.find_or_create_chat(a.id, b.id).await.unwrap();

  let err = s.mark_read(c.id, chat).await.unwrap_err();
  assert!(matches!(err.rejection(), Some(tandem_core::Error::NotParticipant { .. })));
}
