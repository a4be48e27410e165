//! Statements over `post_reactions` and `comment_reactions`.
//!
//! Both tables share a shape and differ only in their key column, so every
//! statement is built from the [`Target`] variant.

use rusqlite::{Connection, OptionalExtension as _, params};

use agora_core::reaction::{ReactionKind, ReactionState, Target};

use crate::encode::{encode_kind, encode_uuid, reaction_column};

/// `(reaction table, key column, parent table)` for a target.
fn layout(target: Target) -> (&'static str, &'static str, &'static str) {
  match target {
    Target::Post(_) => ("post_reactions", "post_id", "posts"),
    Target::Comment(_) => ("comment_reactions", "comment_id", "comments"),
  }
}

pub fn target_exists(conn: &Connection, target: Target) -> rusqlite::Result<bool> {
  let (_, key, parent) = layout(target);
  let sql = format!("SELECT 1 FROM {parent} WHERE {key} = ?1");
  Ok(
    conn
      .query_row(&sql, params![encode_uuid(target.id())], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

pub fn current(
  conn: &Connection,
  target: Target,
  user_id: &str,
) -> rusqlite::Result<ReactionState> {
  let (table, key, _) = layout(target);
  let sql = format!("SELECT kind FROM {table} WHERE {key} = ?1 AND user_id = ?2");
  let kind = conn
    .query_row(&sql, params![encode_uuid(target.id()), user_id], |row| {
      reaction_column(row, 0)
    })
    .optional()?
    .flatten();
  Ok(ReactionState::from(kind))
}

/// Persist `state`: an upsert for like/dislike, a delete for none.
pub fn store(
  conn: &Connection,
  target: Target,
  user_id: &str,
  state: ReactionState,
  updated_at: &str,
) -> rusqlite::Result<()> {
  let (table, key, _) = layout(target);
  let target_id = encode_uuid(target.id());
  match state.kind() {
    Some(kind) => {
      let sql = format!(
        "INSERT INTO {table} ({key}, user_id, kind, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT({key}, user_id)
         DO UPDATE SET kind = excluded.kind, updated_at = excluded.updated_at"
      );
      conn.execute(&sql, params![target_id, user_id, encode_kind(kind), updated_at])?;
    }
    None => {
      let sql = format!("DELETE FROM {table} WHERE {key} = ?1 AND user_id = ?2");
      conn.execute(&sql, params![target_id, user_id])?;
    }
  }
  Ok(())
}

/// `(likes, dislikes)` recomputed from the stored rows.
pub fn counts(conn: &Connection, target: Target) -> rusqlite::Result<(i64, i64)> {
  let (table, key, _) = layout(target);
  let sql = format!(
    "SELECT COALESCE(SUM(kind = ?2), 0), COALESCE(SUM(kind = ?3), 0)
     FROM {table} WHERE {key} = ?1"
  );
  conn.query_row(
    &sql,
    params![
      encode_uuid(target.id()),
      encode_kind(ReactionKind::Like),
      encode_kind(ReactionKind::Dislike),
    ],
    |row| Ok((row.get(0)?, row.get(1)?)),
  )
}
