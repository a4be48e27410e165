//! Users: the authors, actors and recipients of everything else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::IntoStaticStr,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  #[default]
  User,
  Moderator,
  Admin,
}

/// A registered user. Never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:       Uuid,
  /// Unique display name.
  pub username:      String,
  pub email:         String,
  /// Argon2 PHC string; `None` for accounts created through an external
  /// identity provider.
  #[serde(skip_serializing)]
  pub password_hash: Option<String>,
  pub avatar:        Option<String>,
  pub role:          Role,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::ForumStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub email:         String,
  pub password_hash: Option<String>,
  pub avatar:        Option<String>,
  pub role:          Role,
}

impl NewUser {
  pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      username:      username.into(),
      email:         email.into(),
      password_hash: None,
      avatar:        None,
      role:          Role::default(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    validate_username(&self.username)?;
    if !self.email.contains('@') {
      return Err(Error::InvalidInput(format!(
        "not an email address: {:?}",
        self.email
      )));
    }
    Ok(())
  }
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone)]
pub struct ProfileEdit {
  pub username: String,
  pub avatar:   Option<String>,
}

impl ProfileEdit {
  pub fn validate(&self) -> Result<()> { validate_username(&self.username) }
}

fn validate_username(username: &str) -> Result<()> {
  if username.trim().is_empty() {
    return Err(Error::InvalidInput("username must not be empty".into()));
  }
  if username.chars().any(char::is_whitespace) {
    return Err(Error::InvalidInput(format!(
      "username must not contain whitespace: {username:?}"
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_user_validation() {
    assert!(NewUser::new("alice", "alice@example.com").validate().is_ok());
    assert!(NewUser::new("", "alice@example.com").validate().is_err());
    assert!(NewUser::new("al ice", "alice@example.com").validate().is_err());
    assert!(NewUser::new("alice", "alice.example.com").validate().is_err());
  }

  #[test]
  fn password_hash_is_never_serialised() {
    let user = User {
      user_id:       Uuid::new_v4(),
      username:      "alice".into(),
      email:         "alice@example.com".into(),
      password_hash: Some("$argon2id$secret".into()),
      avatar:        None,
      role:          Role::User,
      created_at:    Utc::now(),
    };
    let json = serde_json::to_string(&user).unwrap();
    assert!(!json.contains("argon2"));
  }
}
