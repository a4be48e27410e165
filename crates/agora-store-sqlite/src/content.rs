//! Statements over posts, categories and comments, including the snapshot
//! reads that join live reaction counts.

use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::encode::{
  RawComment, RawCommentSnapshot, RawEngagement, RawPost, RawPostSnapshot,
};

/// Posts joined with author name, live counts and the reaction of `?2`.
/// A `NULL` viewer never matches a reaction row.
const POST_SNAPSHOT_SELECT: &str = "
  SELECT p.post_id, p.owner_id, p.title, p.body, p.image, p.created_at,
         u.username,
         (SELECT COUNT(*) FROM post_reactions r
           WHERE r.post_id = p.post_id AND r.kind = 'like'),
         (SELECT COUNT(*) FROM post_reactions r
           WHERE r.post_id = p.post_id AND r.kind = 'dislike'),
         (SELECT r.kind FROM post_reactions r
           WHERE r.post_id = p.post_id AND r.user_id = ?2)
  FROM posts p
  JOIN users u ON u.user_id = p.owner_id";

const COMMENT_SNAPSHOT_SELECT: &str = "
  SELECT c.comment_id, c.post_id, c.owner_id, c.body, c.created_at,
         u.username,
         (SELECT COUNT(*) FROM comment_reactions r
           WHERE r.comment_id = c.comment_id AND r.kind = 'like'),
         (SELECT COUNT(*) FROM comment_reactions r
           WHERE r.comment_id = c.comment_id AND r.kind = 'dislike'),
         (SELECT r.kind FROM comment_reactions r
           WHERE r.comment_id = c.comment_id AND r.user_id = ?2)
  FROM comments c
  JOIN users u ON u.user_id = c.owner_id";

// ─── Categories ──────────────────────────────────────────────────────────────

/// Create the category if needed and return its id.
fn ensure_category(conn: &Connection, name: &str) -> rusqlite::Result<String> {
  conn.execute(
    "INSERT INTO categories (category_id, name) VALUES (?1, ?2)
     ON CONFLICT(name) DO NOTHING",
    params![Uuid::new_v4().hyphenated().to_string(), name],
  )?;
  conn.query_row(
    "SELECT category_id FROM categories WHERE name = ?1",
    params![name],
    |row| row.get(0),
  )
}

/// Replace the category tags of a post, keeping the given order.
pub fn set_categories(
  conn: &Connection,
  post_id: &str,
  names: &[String],
) -> rusqlite::Result<()> {
  conn.execute(
    "DELETE FROM post_categories WHERE post_id = ?1",
    params![post_id],
  )?;
  for (position, name) in names.iter().enumerate() {
    let category_id = ensure_category(conn, name.trim())?;
    conn.execute(
      "INSERT INTO post_categories (post_id, category_id, position)
       VALUES (?1, ?2, ?3)",
      params![post_id, category_id, position as i64],
    )?;
  }
  Ok(())
}

fn load_categories(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(
    "SELECT c.name FROM post_categories pc
     JOIN categories c ON c.category_id = pc.category_id
     WHERE pc.post_id = ?1
     ORDER BY pc.position",
  )?;
  let names = stmt
    .query_map(params![post_id], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(names)
}

fn with_categories(conn: &Connection, mut raw: RawPost) -> rusqlite::Result<RawPost> {
  raw.categories = load_categories(conn, &raw.post_id)?;
  Ok(raw)
}

// ─── Posts ───────────────────────────────────────────────────────────────────

pub fn insert_post(conn: &Connection, raw: &RawPost) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO posts (post_id, owner_id, title, body, image, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      raw.post_id,
      raw.owner_id,
      raw.title,
      raw.body,
      raw.image,
      raw.created_at,
    ],
  )?;
  set_categories(conn, &raw.post_id, &raw.categories)
}

pub fn find_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Option<RawPost>> {
  let sql = format!("SELECT {} FROM posts p WHERE p.post_id = ?1", RawPost::COLUMNS);
  conn
    .query_row(&sql, params![post_id], RawPost::from_row)
    .optional()?
    .map(|raw| with_categories(conn, raw))
    .transpose()
}

/// Returns `false` if the post does not exist.
pub fn update_post(
  conn: &Connection,
  post_id: &str,
  title: &str,
  body: &str,
  image: Option<&str>,
  categories: &[String],
) -> rusqlite::Result<bool> {
  let n = conn.execute(
    "UPDATE posts SET title = ?2, body = ?3, image = ?4 WHERE post_id = ?1",
    params![post_id, title, body, image],
  )?;
  if n == 0 {
    return Ok(false);
  }
  set_categories(conn, post_id, categories)?;
  Ok(true)
}

/// Foreign keys cascade the delete to comments, reactions, notifications
/// and activity rows.
pub fn delete_post(conn: &Connection, post_id: &str) -> rusqlite::Result<bool> {
  let n = conn.execute("DELETE FROM posts WHERE post_id = ?1", params![post_id])?;
  Ok(n > 0)
}

fn collect_posts(
  conn: &Connection,
  sql: &str,
  key: &str,
) -> rusqlite::Result<Vec<RawPost>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(params![key], RawPost::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(|raw| with_categories(conn, raw)).collect()
}

pub fn posts_by_owner(conn: &Connection, owner_id: &str) -> rusqlite::Result<Vec<RawPost>> {
  let sql = format!(
    "SELECT {} FROM posts p WHERE p.owner_id = ?1
     ORDER BY p.created_at DESC, p.rowid DESC",
    RawPost::COLUMNS
  );
  collect_posts(conn, &sql, owner_id)
}

pub fn liked_posts(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<RawPost>> {
  let sql = format!(
    "SELECT {} FROM posts p
     JOIN post_reactions r ON r.post_id = p.post_id
     WHERE r.user_id = ?1 AND r.kind = 'like'
     ORDER BY p.created_at DESC, p.rowid DESC",
    RawPost::COLUMNS
  );
  collect_posts(conn, &sql, user_id)
}

fn post_snapshot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPostSnapshot> {
  Ok(RawPostSnapshot {
    post:       RawPost::from_row(row)?,
    engagement: RawEngagement::from_row(row, 6)?,
  })
}

fn snapshot_with_categories(
  conn: &Connection,
  mut snap: RawPostSnapshot,
) -> rusqlite::Result<RawPostSnapshot> {
  snap.post = with_categories(conn, snap.post)?;
  Ok(snap)
}

pub fn post_snapshot(
  conn: &Connection,
  post_id: &str,
  viewer: Option<&str>,
) -> rusqlite::Result<Option<RawPostSnapshot>> {
  let sql = format!("{POST_SNAPSHOT_SELECT} WHERE p.post_id = ?1");
  conn
    .query_row(&sql, params![post_id, viewer], post_snapshot_row)
    .optional()?
    .map(|snap| snapshot_with_categories(conn, snap))
    .transpose()
}

/// Runs `sql` (built on [`POST_SNAPSHOT_SELECT`]) with `key` as `?1`.
fn collect_snapshots(
  conn: &Connection,
  sql: &str,
  key: Option<&str>,
  viewer: Option<&str>,
) -> rusqlite::Result<Vec<RawPostSnapshot>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(params![key, viewer], post_snapshot_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws
    .into_iter()
    .map(|snap| snapshot_with_categories(conn, snap))
    .collect()
}

/// The home page: every post, newest first. `?1` is bound but unused.
pub fn post_snapshots(
  conn: &Connection,
  viewer: Option<&str>,
) -> rusqlite::Result<Vec<RawPostSnapshot>> {
  let sql = format!("{POST_SNAPSHOT_SELECT} ORDER BY p.created_at DESC, p.rowid DESC");
  collect_snapshots(conn, &sql, None, viewer)
}

pub fn post_snapshots_by_owner(
  conn: &Connection,
  owner_id: &str,
  viewer: Option<&str>,
) -> rusqlite::Result<Vec<RawPostSnapshot>> {
  let sql = format!(
    "{POST_SNAPSHOT_SELECT}
     WHERE p.owner_id = ?1
     ORDER BY p.created_at DESC, p.rowid DESC"
  );
  collect_snapshots(conn, &sql, Some(owner_id), viewer)
}

/// `None` if no category is called `name`.
pub fn post_snapshots_in_category(
  conn: &Connection,
  name: &str,
  viewer: Option<&str>,
) -> rusqlite::Result<Option<Vec<RawPostSnapshot>>> {
  let category_id: Option<String> = conn
    .query_row(
      "SELECT category_id FROM categories WHERE name = ?1",
      params![name],
      |row| row.get(0),
    )
    .optional()?;
  let Some(category_id) = category_id else {
    return Ok(None);
  };

  let sql = format!(
    "{POST_SNAPSHOT_SELECT}
     JOIN post_categories pc ON pc.post_id = p.post_id
     WHERE pc.category_id = ?1
     ORDER BY p.created_at DESC, p.rowid DESC"
  );
  collect_snapshots(conn, &sql, Some(&category_id), viewer).map(Some)
}

/// `(name, post count)` for every category, by name.
pub fn category_summaries(conn: &Connection) -> rusqlite::Result<Vec<(String, i64)>> {
  let mut stmt = conn.prepare(
    "SELECT c.name, COUNT(pc.post_id) FROM categories c
     LEFT JOIN post_categories pc ON pc.category_id = c.category_id
     GROUP BY c.category_id, c.name
     ORDER BY c.name",
  )?;
  let rows = stmt
    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

// ─── Comments ────────────────────────────────────────────────────────────────

pub fn insert_comment(conn: &Connection, raw: &RawComment) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO comments (comment_id, post_id, owner_id, body, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    params![raw.comment_id, raw.post_id, raw.owner_id, raw.body, raw.created_at],
  )?;
  Ok(())
}

pub fn find_comment(
  conn: &Connection,
  comment_id: &str,
) -> rusqlite::Result<Option<RawComment>> {
  let sql = format!(
    "SELECT {} FROM comments c WHERE c.comment_id = ?1",
    RawComment::COLUMNS
  );
  conn.query_row(&sql, params![comment_id], RawComment::from_row).optional()
}

pub fn update_comment(
  conn: &Connection,
  comment_id: &str,
  body: &str,
) -> rusqlite::Result<bool> {
  let n = conn.execute(
    "UPDATE comments SET body = ?2 WHERE comment_id = ?1",
    params![comment_id, body],
  )?;
  Ok(n > 0)
}

pub fn delete_comment(conn: &Connection, comment_id: &str) -> rusqlite::Result<bool> {
  let n = conn.execute(
    "DELETE FROM comments WHERE comment_id = ?1",
    params![comment_id],
  )?;
  Ok(n > 0)
}

fn comment_snapshot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCommentSnapshot> {
  Ok(RawCommentSnapshot {
    comment:    RawComment::from_row(row)?,
    engagement: RawEngagement::from_row(row, 5)?,
  })
}

pub fn comment_snapshot(
  conn: &Connection,
  comment_id: &str,
  viewer: Option<&str>,
) -> rusqlite::Result<Option<RawCommentSnapshot>> {
  let sql = format!("{COMMENT_SNAPSHOT_SELECT} WHERE c.comment_id = ?1");
  conn
    .query_row(&sql, params![comment_id, viewer], comment_snapshot_row)
    .optional()
}

/// Newest first.
pub fn comment_snapshots(
  conn: &Connection,
  post_id: &str,
  viewer: Option<&str>,
) -> rusqlite::Result<Vec<RawCommentSnapshot>> {
  let sql = format!(
    "{COMMENT_SNAPSHOT_SELECT} WHERE c.post_id = ?1
     ORDER BY c.created_at DESC, c.rowid DESC"
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params![post_id, viewer], comment_snapshot_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}
