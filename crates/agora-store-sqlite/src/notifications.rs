//! Statements over `notifications`.
//!
//! Reaction notifications are keyed on (recipient, actor, post, comment);
//! `IS` comparisons keep the nullable columns part of the key.

use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use agora_core::{
  notification::{NotificationKind, NotificationPlan, NotificationSync},
  reaction::{ReactionKind, Target},
};

use crate::{
  encode::{Discriminant, RawNotification, RawNotificationView, encode_kind},
  reactions,
};

/// The encoded key of one reaction notification cause.
pub struct CauseKey {
  pub recipient_id: String,
  pub actor_id:     String,
  pub post_id:      String,
  pub comment_id:   Option<String>,
}

fn existing_reaction_kinds(
  conn: &Connection,
  key: &CauseKey,
) -> rusqlite::Result<Vec<ReactionKind>> {
  let mut stmt = conn.prepare_cached(
    "SELECT kind FROM notifications
     WHERE recipient_id = ?1 AND actor_id = ?2
       AND post_id IS ?3 AND comment_id IS ?4
       AND kind IN ('like', 'dislike')",
  )?;
  let kinds = stmt
    .query_map(
      params![key.recipient_id, key.actor_id, key.post_id, key.comment_id],
      |row| row.get::<_, Discriminant<ReactionKind>>(0),
    )?
    .map(|r| r.map(|d| d.0))
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(kinds)
}

fn insert(
  conn: &Connection,
  recipient_id: &str,
  actor_id: &str,
  post_id: Option<&str>,
  comment_id: Option<&str>,
  kind: NotificationKind,
  created_at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO notifications
       (notification_id, recipient_id, actor_id, post_id, comment_id,
        kind, is_read, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
    params![
      Uuid::new_v4().hyphenated().to_string(),
      recipient_id,
      actor_id,
      post_id,
      comment_id,
      encode_kind(kind),
      created_at,
    ],
  )?;
  Ok(())
}

/// Plan against the actor's stored reaction on `target` and apply the plan.
/// Must run inside a write transaction.
pub fn sync_reaction(
  conn: &Connection,
  key: &CauseKey,
  target: Target,
  created_at: &str,
) -> rusqlite::Result<NotificationSync> {
  let effective = reactions::current(conn, target, &key.actor_id)?;
  let existing = existing_reaction_kinds(conn, key)?;
  let plan = NotificationPlan::for_reaction(&existing, effective);

  for kind in &plan.delete {
    conn.execute(
      "DELETE FROM notifications
       WHERE recipient_id = ?1 AND actor_id = ?2
         AND post_id IS ?3 AND comment_id IS ?4 AND kind = ?5",
      params![
        key.recipient_id,
        key.actor_id,
        key.post_id,
        key.comment_id,
        encode_kind(*kind),
      ],
    )?;
  }
  if let Some(kind) = plan.insert {
    insert(
      conn,
      &key.recipient_id,
      &key.actor_id,
      Some(&key.post_id),
      key.comment_id.as_deref(),
      kind.into(),
      created_at,
    )?;
  }
  Ok(plan.outcome())
}

/// Notify the post owner about `comment_id`. `None` if the comment is gone.
/// Must run inside a write transaction.
pub fn sync_comment(
  conn: &Connection,
  comment_id: &str,
  created_at: &str,
) -> rusqlite::Result<Option<NotificationSync>> {
  let parties: Option<(String, String)> = conn
    .query_row(
      "SELECT p.owner_id, c.owner_id FROM comments c
       JOIN posts p ON p.post_id = c.post_id
       WHERE c.comment_id = ?1",
      params![comment_id],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?;
  let Some((recipient_id, actor_id)) = parties else {
    return Ok(None);
  };
  if recipient_id == actor_id {
    return Ok(Some(NotificationSync::Suppressed));
  }

  let exists = conn
    .query_row(
      "SELECT 1 FROM notifications WHERE comment_id = ?1 AND kind = 'comment'",
      params![comment_id],
      |_| Ok(()),
    )
    .optional()?
    .is_some();
  if exists {
    return Ok(Some(NotificationSync::Unchanged));
  }

  insert(
    conn,
    &recipient_id,
    &actor_id,
    None,
    Some(comment_id),
    NotificationKind::Comment,
    created_at,
  )?;
  Ok(Some(NotificationSync::Created(NotificationKind::Comment)))
}

pub fn unread_exists(conn: &Connection, user_id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM notifications WHERE recipient_id = ?1 AND is_read = 0 LIMIT 1",
        params![user_id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

/// Newest first, joined with the actor name, the post title (through the
/// comment for comment notifications) and the comment body.
pub fn list_unread(
  conn: &Connection,
  user_id: &str,
) -> rusqlite::Result<Vec<RawNotificationView>> {
  let sql = format!(
    "SELECT {}, a.username, COALESCE(p.title, cp.title), c.body
     FROM notifications n
     LEFT JOIN users    a  ON a.user_id     = n.actor_id
     LEFT JOIN comments c  ON c.comment_id  = n.comment_id
     LEFT JOIN posts    p  ON p.post_id     = n.post_id
     LEFT JOIN posts    cp ON cp.post_id    = c.post_id
     WHERE n.recipient_id = ?1 AND n.is_read = 0
     ORDER BY n.created_at DESC, n.rowid DESC",
    RawNotification::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params![user_id], |row| {
      Ok(RawNotificationView {
        notification:   RawNotification::from_row(row)?,
        actor_username: row.get(8)?,
        post_title:     row.get(9)?,
        comment_body:   row.get(10)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn find(
  conn: &Connection,
  notification_id: &str,
) -> rusqlite::Result<Option<RawNotification>> {
  let sql = format!(
    "SELECT {} FROM notifications n WHERE n.notification_id = ?1",
    RawNotification::COLUMNS
  );
  conn
    .query_row(&sql, params![notification_id], RawNotification::from_row)
    .optional()
}

/// Only the recipient's own notification matches.
pub fn mark_read(
  conn: &Connection,
  user_id: &str,
  notification_id: &str,
) -> rusqlite::Result<bool> {
  let n = conn.execute(
    "UPDATE notifications SET is_read = 1
     WHERE notification_id = ?1 AND recipient_id = ?2",
    params![notification_id, user_id],
  )?;
  Ok(n > 0)
}

/// The live post a notification leads to.
pub fn target_post(
  conn: &Connection,
  notification_id: &str,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT p.post_id FROM notifications n
       LEFT JOIN comments c ON c.comment_id = n.comment_id
       JOIN posts p ON p.post_id = COALESCE(n.post_id, c.post_id)
       WHERE n.notification_id = ?1",
      params![notification_id],
      |row| row.get(0),
    )
    .optional()
}
