//! Statements over `users` and `sessions`.

use rusqlite::{Connection, OptionalExtension as _, params};

use crate::encode::{RawSession, RawUser};

/// Which unique column a user write would collide on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
  Username,
  Email,
}

/// Look a user up by one of `user_id`, `username` or `email`.
pub fn find_user(
  conn: &Connection,
  column: &'static str,
  value: &str,
) -> rusqlite::Result<Option<RawUser>> {
  let sql = format!("SELECT {} FROM users WHERE {column} = ?1", RawUser::COLUMNS);
  conn.query_row(&sql, params![value], RawUser::from_row).optional()
}

/// Check the unique columns before a write. `except` excludes the user being
/// edited; `email` is skipped when not changing.
pub fn collision(
  conn: &Connection,
  username: &str,
  email: Option<&str>,
  except: Option<&str>,
) -> rusqlite::Result<Option<Collision>> {
  let taken = |column: &str, value: &str| -> rusqlite::Result<bool> {
    let sql = format!(
      "SELECT 1 FROM users WHERE {column} = ?1 AND user_id IS NOT ?2"
    );
    Ok(
      conn
        .query_row(&sql, params![value, except], |_| Ok(()))
        .optional()?
        .is_some(),
    )
  };

  if taken("username", username)? {
    return Ok(Some(Collision::Username));
  }
  if let Some(email) = email {
    if taken("email", email)? {
      return Ok(Some(Collision::Email));
    }
  }
  Ok(None)
}

pub fn insert_user(conn: &Connection, raw: &RawUser) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO users
       (user_id, username, email, password_hash, avatar, role, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      raw.user_id,
      raw.username,
      raw.email,
      raw.password_hash,
      raw.avatar,
      raw.role,
      raw.created_at,
    ],
  )?;
  Ok(())
}

/// Returns `false` if the user does not exist.
pub fn update_profile(
  conn: &Connection,
  user_id: &str,
  username: &str,
  avatar: Option<&str>,
) -> rusqlite::Result<bool> {
  let n = conn.execute(
    "UPDATE users SET username = ?2, avatar = ?3 WHERE user_id = ?1",
    params![user_id, username, avatar],
  )?;
  Ok(n > 0)
}

// ─── Sessions ────────────────────────────────────────────────────────────────

pub fn insert_session(conn: &Connection, raw: &RawSession) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO sessions (token_digest, user_id, created_at, expires_at)
     VALUES (?1, ?2, ?3, ?4)",
    params![raw.token_digest, raw.user_id, raw.created_at, raw.expires_at],
  )?;
  Ok(())
}

pub fn find_session(
  conn: &Connection,
  token_digest: &str,
) -> rusqlite::Result<Option<RawSession>> {
  conn
    .query_row(
      "SELECT token_digest, user_id, created_at, expires_at
       FROM sessions WHERE token_digest = ?1",
      params![token_digest],
      |row| {
        Ok(RawSession {
          token_digest: row.get(0)?,
          user_id:      row.get(1)?,
          created_at:   row.get(2)?,
          expires_at:   row.get(3)?,
        })
      },
    )
    .optional()
}

pub fn delete_session(conn: &Connection, token_digest: &str) -> rusqlite::Result<bool> {
  let n = conn.execute(
    "DELETE FROM sessions WHERE token_digest = ?1",
    params![token_digest],
  )?;
  Ok(n > 0)
}

/// `now` must use the same encoding as `expires_at`.
pub fn purge_expired(conn: &Connection, now: &str) -> rusqlite::Result<usize> {
  conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
}
