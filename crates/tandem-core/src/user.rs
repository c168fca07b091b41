//! Users as the core sees them: an id plus the display fields messages carry.
//!
//! Registration and profile editing happen elsewhere; nothing here mutates a
//! user after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id:         Uuid,
  pub name:       Option<String>,
  /// Avatar reference (URL or storage key); never binary data.
  pub image:      Option<String>,
  pub created_at: DateTime<Utc>,
}

impl User {
  pub fn summary(&self) -> UserSummary {
    UserSummary {
      id:    self.id,
      name:  self.name.clone(),
      image: self.image.clone(),
    }
  }
}

/// The display fields attached to messages, chat lists, and like listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
  pub id:    Uuid,
  pub name:  Option<String>,
  pub image: Option<String>,
}

impl UserSummary {
  /// The name to show for this user, falling back to a neutral placeholder.
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or("someone")
  }
}
