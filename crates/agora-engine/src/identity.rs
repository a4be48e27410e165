//! Session-to-identity resolution and the account operations behind it.
//!
//! Expiry is evaluated lazily when a token is resolved; nothing sweeps
//! sessions in the background. [`IdentityResolver::purge_expired_sessions`]
//! exists for operators who want to reclaim the rows.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use agora_core::{
  session::{Session, UserIdentity, Viewer},
  store::ForumStore,
  user::{NewUser, ProfileEdit, User},
};

use crate::{
  Error, Result,
  credentials::{hash_password, mint_token, token_digest, verify_password},
};

/// What a successful login hands back to the caller. The token is shown
/// exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct SessionGrant {
  pub token:      String,
  pub user:       User,
  pub expires_at: DateTime<Utc>,
}

pub struct IdentityResolver<S> {
  store:       Arc<S>,
  session_ttl: Duration,
}

impl<S: ForumStore> IdentityResolver<S> {
  pub fn new(store: Arc<S>, session_ttl: Duration) -> Self {
    Self { store, session_ttl }
  }

  // ─── Resolution ────────────────────────────────────────────────────────────

  /// Map a token to the identity it was issued for.
  pub async fn resolve(&self, token: &str) -> Result<UserIdentity> {
    let session = self
      .store
      .get_session(token_digest(token))
      .await
      .map_err(Error::storage)?
      .ok_or(Error::SessionNotFound)?;

    if session.is_expired_at(Utc::now()) {
      return Err(Error::SessionExpired);
    }

    let user = self
      .store
      .get_user(session.user_id)
      .await
      .map_err(Error::storage)?
      .ok_or(Error::SessionNotFound)?;

    Ok(UserIdentity { user_id: user.user_id, username: user.username })
  }

  /// Identity for read-only views: no token, an unknown token and an
  /// expired token all read as anonymous.
  pub async fn viewer(&self, token: Option<&str>) -> Result<Viewer> {
    Ok(match self.user_identity_of(token).await? {
      Some(identity) => Viewer::Authenticated(identity),
      None => Viewer::Anonymous,
    })
  }

  /// Identity for mutating actions. Anything short of a live session is
  /// `Unauthenticated`.
  pub async fn require(&self, token: Option<&str>) -> Result<UserIdentity> {
    let token = token.ok_or(Error::Unauthenticated)?;
    match self.resolve(token).await {
      Err(Error::SessionNotFound | Error::SessionExpired) => {
        Err(Error::Unauthenticated)
      }
      other => other,
    }
  }

  /// Like [`Self::resolve`], but a token that does not resolve is `None`
  /// rather than an error.
  pub async fn user_identity_of(&self, token: Option<&str>) -> Result<Option<UserIdentity>> {
    let Some(token) = token else {
      return Ok(None);
    };
    match self.resolve(token).await {
      Ok(identity) => Ok(Some(identity)),
      Err(Error::SessionNotFound | Error::SessionExpired) => Ok(None),
      Err(e) => Err(e),
    }
  }

  pub async fn username_of(&self, user_id: Uuid) -> Result<String> {
    self
      .store
      .get_user(user_id)
      .await
      .map_err(Error::storage)?
      .map(|u| u.username)
      .ok_or_else(|| Error::NotFound(format!("user {user_id}")))
  }

  // ─── Accounts ──────────────────────────────────────────────────────────────

  pub async fn register(
    &self,
    username: &str,
    email: &str,
    password: &str,
  ) -> Result<User> {
    let mut input = NewUser::new(username.trim(), email.trim());
    input.validate()?;
    self.ensure_username_free(&input.username, None).await?;
    if self
      .store
      .get_user_by_email(input.email.clone())
      .await
      .map_err(Error::storage)?
      .is_some()
    {
      return Err(Error::Conflict(format!("email {} already registered", input.email)));
    }

    let password = password.to_owned();
    let phc = tokio::task::spawn_blocking(move || hash_password(&password))
      .await
      .map_err(Error::storage)??;
    input.password_hash = Some(phc);

    let user = self.store.create_user(input).await.map_err(Error::storage)?;
    tracing::info!(user_id = %user.user_id, username = %user.username, "registered user");
    Ok(user)
  }

  /// Verify a password and open a session.
  pub async fn login(&self, username: &str, password: &str) -> Result<SessionGrant> {
    let user = self
      .store
      .get_user_by_username(username.trim().to_owned())
      .await
      .map_err(Error::storage)?
      .ok_or(Error::InvalidCredentials)?;

    // Accounts created through an external provider have no password.
    let Some(phc) = user.password_hash.clone() else {
      return Err(Error::InvalidCredentials);
    };
    let password = password.to_owned();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &phc))
      .await
      .map_err(Error::storage)?;
    if !valid {
      return Err(Error::InvalidCredentials);
    }

    self.open_session(user).await
  }

  /// Open a session for an identity an external provider has already
  /// verified, creating the account on first sight. The email is the stable
  /// key; `username` is only used when creating.
  pub async fn login_verified(&self, username: &str, email: &str) -> Result<SessionGrant> {
    let existing = self
      .store
      .get_user_by_email(email.trim().to_owned())
      .await
      .map_err(Error::storage)?;

    let user = match existing {
      Some(user) => user,
      None => {
        let input = NewUser::new(username.trim(), email.trim());
        input.validate()?;
        self.ensure_username_free(&input.username, None).await?;
        let user = self.store.create_user(input).await.map_err(Error::storage)?;
        tracing::info!(user_id = %user.user_id, "created user from verified identity");
        user
      }
    };

    self.open_session(user).await
  }

  /// Returns `false` if the token had no session.
  pub async fn logout(&self, token: &str) -> Result<bool> {
    let removed = self
      .store
      .delete_session(token_digest(token))
      .await
      .map_err(Error::storage)?;
    if removed {
      tracing::info!("session closed");
    }
    Ok(removed)
  }

  /// Change the caller's own username and avatar.
  pub async fn edit_profile(
    &self,
    token: Option<&str>,
    username: &str,
    avatar: Option<String>,
  ) -> Result<User> {
    let me = self.require(token).await?;
    let edit = ProfileEdit { username: username.trim().to_owned(), avatar };
    edit.validate()?;
    self.ensure_username_free(&edit.username, Some(me.user_id)).await?;

    self
      .store
      .update_profile(me.user_id, edit)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("user {}", me.user_id)))
  }

  /// Delete every session that has expired by now.
  pub async fn purge_expired_sessions(&self) -> Result<usize> {
    let n = self
      .store
      .purge_expired_sessions(Utc::now())
      .await
      .map_err(Error::storage)?;
    tracing::info!(purged = n, "expired sessions removed");
    Ok(n)
  }

  // ─── Helpers ───────────────────────────────────────────────────────────────

  async fn open_session(&self, user: User) -> Result<SessionGrant> {
    let token = mint_token();
    let now = Utc::now();
    let session = Session {
      token_digest: token_digest(&token),
      user_id:      user.user_id,
      created_at:   now,
      expires_at:   now + self.session_ttl,
    };
    let expires_at = session.expires_at;
    self.store.insert_session(session).await.map_err(Error::storage)?;

    tracing::info!(user_id = %user.user_id, %expires_at, "session opened");
    Ok(SessionGrant { token, user, expires_at })
  }

  async fn ensure_username_free(&self, username: &str, owner: Option<Uuid>) -> Result<()> {
    let holder = self
      .store
      .get_user_by_username(username.to_owned())
      .await
      .map_err(Error::storage)?;
    match holder {
      Some(user) if Some(user.user_id) != owner => {
        Err(Error::Conflict(format!("username {username} is taken")))
      }
      _ => Ok(()),
    }
  }
}
