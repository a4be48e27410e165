//! Sessions and the identities they resolve to.
//!
//! A session maps an opaque token to a user until its expiry. Only a digest
//! of the token is ever persisted; expiry is evaluated lazily whenever a
//! token is resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  /// Hex SHA-256 of the bearer token.
  pub token_digest: String,
  pub user_id:      Uuid,
  pub created_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
}

impl Session {
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    now >= self.expires_at
  }
}

/// The identity a session resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
  pub user_id:  Uuid,
  pub username: String,
}

/// Who is looking at a read-only view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Viewer {
  #[default]
  Anonymous,
  Authenticated(UserIdentity),
}

impl Viewer {
  pub fn user_id(&self) -> Option<Uuid> {
    match self {
      Self::Anonymous => None,
      Self::Authenticated(identity) => Some(identity.user_id),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  #[test]
  fn expiry_is_inclusive() {
    let now = Utc::now();
    let session = Session {
      token_digest: String::new(),
      user_id:      Uuid::new_v4(),
      created_at:   now - Duration::hours(1),
      expires_at:   now,
    };
    assert!(session.is_expired_at(now));
    assert!(!session.is_expired_at(now - Duration::seconds(1)));
  }

  #[test]
  fn anonymous_viewer_has_no_user() {
    assert_eq!(Viewer::Anonymous.user_id(), None);
    let id = Uuid::new_v4();
    let viewer = Viewer::Authenticated(UserIdentity {
      user_id:  id,
      username: "bob".into(),
    });
    assert_eq!(viewer.user_id(), Some(id));
  }
}
