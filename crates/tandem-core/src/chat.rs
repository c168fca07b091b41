//! Two-party chats and the per-user view of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{message::Message, user::UserSummary};

/// A conversation between exactly two distinct users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
  pub id:         Uuid,
  /// Bumped whenever a message lands in the chat; orders chat lists.
  pub updated_at: DateTime<Utc>,
}

/// A chat as listed for one of its participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
  pub chat:         Chat,
  /// The other participant; `None` only if their user record is gone.
  pub other:        Option<UserSummary>,
  pub last_message: Option<Message>,
  /// Messages from others newer than the viewer's watermark.
  pub unread:       u64,
}

/// The unordered pair of users a two-party chat belongs to, normalised so
/// `(a, b)` and `(b, a)` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserPair {
  low:  Uuid,
  high: Uuid,
}

impl UserPair {
  /// Returns `None` when both ids are the same user.
  pub fn new(a: Uuid, b: Uuid) -> Option<Self> {
    match a.cmp(&b) {
      std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
      std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
      std::cmp::Ordering::Equal => None,
    }
  }

  pub fn low(&self) -> Uuid { self.low }

  pub fn high(&self) -> Uuid { self.high }

  pub fn contains(&self, id: Uuid) -> bool { id == self.low || id == self.high }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pair_is_order_independent() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    assert_eq!(UserPair::new(a, b), UserPair::new(b, a));
    let pair = UserPair::new(a, b).unwrap();
    assert!(pair.contains(a) && pair.contains(b));
    assert!(pair.low() < pair.high());
  }

  #[test]
  fn pair_rejects_same_user() {
    let a = Uuid::new_v4();
    assert!(UserPair::new(a, a).is_none());
  }
}
