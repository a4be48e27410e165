//! Statements over the `activity` ledger.

use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use agora_core::{
  activity::{ActivityChange, ActivityKind},
  reaction::{ReactionKind, Target},
};

use crate::{
  content, reactions,
  encode::{
    Discriminant, RawActivity, RawCommentSnapshot, RawPostSnapshot, encode_kind,
  },
};

/// A ledger row resolved against live content.
pub enum RawSubject {
  Post(RawPostSnapshot),
  Comment {
    comment: RawCommentSnapshot,
    post:    RawPostSnapshot,
  },
}

fn insert(
  conn: &Connection,
  actor_id: &str,
  kind: ActivityKind,
  post_id: &str,
  comment_id: Option<&str>,
  created_at: &str,
) -> rusqlite::Result<RawActivity> {
  let raw = RawActivity {
    activity_id: Uuid::new_v4().hyphenated().to_string(),
    actor_id:    actor_id.to_owned(),
    kind:        encode_kind(kind),
    post_id:     Some(post_id.to_owned()),
    comment_id:  comment_id.map(str::to_owned),
    created_at:  created_at.to_owned(),
  };
  conn.execute(
    "INSERT INTO activity
       (activity_id, actor_id, kind, post_id, comment_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      raw.activity_id,
      raw.actor_id,
      raw.kind,
      raw.post_id,
      raw.comment_id,
      raw.created_at,
    ],
  )?;
  Ok(raw)
}

fn find(
  conn: &Connection,
  actor_id: &str,
  kind: ActivityKind,
  post_id: &str,
  comment_id: Option<&str>,
) -> rusqlite::Result<Option<RawActivity>> {
  let sql = format!(
    "SELECT {} FROM activity
     WHERE actor_id = ?1 AND kind = ?2 AND post_id IS ?3 AND comment_id IS ?4",
    RawActivity::COLUMNS
  );
  conn
    .query_row(
      &sql,
      params![actor_id, encode_kind(kind), post_id, comment_id],
      RawActivity::from_row,
    )
    .optional()
}

/// Insert the row unless one with the same dedup key exists; either way
/// return the stored row.
pub fn record_once(
  conn: &Connection,
  actor_id: &str,
  kind: ActivityKind,
  post_id: &str,
  comment_id: Option<&str>,
  created_at: &str,
) -> rusqlite::Result<RawActivity> {
  match find(conn, actor_id, kind, post_id, comment_id)? {
    Some(raw) => Ok(raw),
    None => insert(conn, actor_id, kind, post_id, comment_id, created_at),
  }
}

/// Make the like/dislike row for (actor, post, comment) mirror the actor's
/// stored reaction on `target`. Must run inside a write transaction.
pub fn mirror_reaction(
  conn: &Connection,
  actor_id: &str,
  post_id: &str,
  comment_id: Option<&str>,
  target: Target,
  at: &str,
) -> rusqlite::Result<ActivityChange> {
  let effective = reactions::current(conn, target, actor_id)?;
  let existing: Option<(String, ReactionKind)> = conn
    .query_row(
      "SELECT activity_id, kind FROM activity
       WHERE actor_id = ?1 AND post_id IS ?2 AND comment_id IS ?3
         AND kind IN ('like', 'dislike')",
      params![actor_id, post_id, comment_id],
      |row| Ok((row.get(0)?, row.get::<_, Discriminant<ReactionKind>>(1)?.0)),
    )
    .optional()?;

  let change = ActivityChange::plan(existing.as_ref().map(|(_, k)| *k), effective);
  match (change, existing) {
    (ActivityChange::Inserted(kind), _) => {
      insert(conn, actor_id, kind.into(), post_id, comment_id, at)?;
    }
    (ActivityChange::Retyped(kind), Some((activity_id, _))) => {
      conn.execute(
        "UPDATE activity SET kind = ?2, created_at = ?3 WHERE activity_id = ?1",
        params![activity_id, encode_kind(ActivityKind::from(kind)), at],
      )?;
    }
    (ActivityChange::Removed, Some((activity_id, _))) => {
      conn.execute(
        "DELETE FROM activity WHERE activity_id = ?1",
        params![activity_id],
      )?;
    }
    _ => {}
  }
  Ok(change)
}

/// Insert a `CreatedPost` row, dated like the post, for every post of
/// `user_id` lacking one. Must run inside a write transaction.
pub fn backfill_post_creation(conn: &Connection, user_id: &str) -> rusqlite::Result<usize> {
  let missing: Vec<(String, String)> = {
    let mut stmt = conn.prepare(
      "SELECT p.post_id, p.created_at FROM posts p
       WHERE p.owner_id = ?1
         AND NOT EXISTS (
           SELECT 1 FROM activity a
           WHERE a.actor_id = p.owner_id
             AND a.kind = 'CreatedPost'
             AND a.post_id = p.post_id
         )",
    )?;
    stmt
      .query_map(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };
  for (post_id, created_at) in &missing {
    insert(conn, user_id, ActivityKind::CreatedPost, post_id, None, created_at)?;
  }
  Ok(missing.len())
}

pub fn remove(
  conn: &Connection,
  actor_id: &str,
  kind: ActivityKind,
  post_id: &str,
  comment_id: Option<&str>,
) -> rusqlite::Result<bool> {
  let n = conn.execute(
    "DELETE FROM activity
     WHERE actor_id = ?1 AND kind = ?2 AND post_id IS ?3 AND comment_id IS ?4",
    params![actor_id, encode_kind(kind), post_id, comment_id],
  )?;
  Ok(n > 0)
}

/// Every row referencing the post or one of its comments.
pub fn purge_by_post(conn: &Connection, post_id: &str) -> rusqlite::Result<usize> {
  conn.execute(
    "DELETE FROM activity
     WHERE post_id = ?1
        OR comment_id IN (SELECT comment_id FROM comments WHERE post_id = ?1)",
    params![post_id],
  )
}

/// The user's rows, newest first, each resolved against live content as seen
/// by the user. Rows whose target is gone are dropped.
pub fn feed(
  conn: &Connection,
  user_id: &str,
) -> rusqlite::Result<Vec<(RawActivity, RawSubject)>> {
  let rows: Vec<RawActivity> = {
    let sql = format!(
      "SELECT {} FROM activity WHERE actor_id = ?1
       ORDER BY created_at DESC, rowid DESC",
      RawActivity::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt
      .query_map(params![user_id], RawActivity::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  let viewer = Some(user_id);
  let mut entries = Vec::with_capacity(rows.len());
  for row in rows {
    let subject = match (&row.comment_id, &row.post_id) {
      (Some(comment_id), _) => {
        let Some(comment) = content::comment_snapshot(conn, comment_id, viewer)?
        else {
          continue;
        };
        let Some(post) =
          content::post_snapshot(conn, &comment.comment.post_id, viewer)?
        else {
          continue;
        };
        RawSubject::Comment { comment, post }
      }
      (None, Some(post_id)) => {
        match content::post_snapshot(conn, post_id, viewer)? {
          Some(post) => RawSubject::Post(post),
          None => continue,
        }
      }
      (None, None) => continue,
    };
    entries.push((row, subject));
  }
  Ok(entries)
}
