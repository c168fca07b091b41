//! Client-side message log: the de-duplicated, ordered view of one chat.
//!
//! Messages reach a client along two paths: the long-poll stream, and the
//! confirmation of a message the client itself sent. Either path may deliver a
//! message the other already delivered; the log keeps exactly one copy per
//! message id and preserves arrival order.
//!
//! The poll cursor only advances along the server-ordered path (history loads
//! and poll responses). A locally-sent message can be newer than a message
//! from the other participant that has not been polled yet; advancing the
//! cursor past it would skip that message for good.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::message::Message;

#[derive(Debug, Clone, Default)]
pub struct MessageLog {
  messages: Vec<Message>,
  seen:     HashSet<Uuid>,
  cursor:   Option<DateTime<Utc>>,
}

impl MessageLog {
  pub fn new() -> Self { Self::default() }

  /// Seed a log from a server-ordered history page.
  pub fn from_history(history: Vec<Message>) -> Self {
    let mut log = Self::new();
    log.extend_delivered(history);
    log
  }

  /// Merge a batch from the server's ordered stream. Unknown messages are
  /// appended in the order given; known ids are skipped. Returns how many
  /// messages were added.
  pub fn extend_delivered(&mut self, batch: impl IntoIterator<Item = Message>) -> usize {
    let mut added = 0;
    for msg in batch {
      if self.cursor.is_none_or(|c| msg.created_at > c) {
        self.cursor = Some(msg.created_at);
      }
      if self.seen.insert(msg.id) {
        self.messages.push(msg);
        added += 1;
      }
    }
    added
  }

  /// Merge the server's confirmation of a message this client sent. Returns
  /// `false` if the poll stream already delivered it.
  pub fn insert_sent(&mut self, msg: Message) -> bool {
    if !self.seen.insert(msg.id) {
      return false;
    }
    self.messages.push(msg);
    true
  }

  /// Insert an older history page ahead of everything held. Known ids are
  /// skipped. Returns how many messages were added.
  pub fn prepend_history(&mut self, older: Vec<Message>) -> usize {
    let fresh: Vec<Message> = older
      .into_iter()
      .filter(|m| self.seen.insert(m.id))
      .collect();
    let added = fresh.len();
    self.messages.splice(0..0, fresh);
    added
  }

  /// Timestamp to poll from: the newest server-delivered message, or `None`
  /// (the epoch) when nothing has been delivered yet.
  pub fn cursor(&self) -> Option<DateTime<Utc>> { self.cursor }

  pub fn messages(&self) -> &[Message] { &self.messages }

  pub fn first(&self) -> Option<&Message> { self.messages.first() }

  pub fn len(&self) -> usize { self.messages.len() }

  pub fn is_empty(&self) -> bool { self.messages.is_empty() }
}
