//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision so
//! lexical order matches chronological order. UUIDs are stored as hyphenated
//! lowercase strings. Enumerated columns hold the `strum` spelling of the
//! variant.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use uuid::Uuid;

use agora_core::{
  activity::{Activity, ActivityKind},
  content::{Comment, CommentSnapshot, Post, PostSnapshot},
  notification::{Notification, NotificationKind, NotificationView},
  reaction::{ReactionCounts, ReactionKind, ReactionState},
  session::Session,
  user::{Role, User},
};

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Enumerated columns ──────────────────────────────────────────────────────

/// Decode an enumerated column outside a connection closure.
fn decode_discriminant<T: FromStr>(column: &'static str, value: String) -> Result<T> {
  value.parse().map_err(|_| {
    Error::Core(agora_core::Error::UnknownDiscriminant { column, value })
  })
}

/// Reads an enumerated column straight into its domain type inside a
/// connection closure, so transactional code can branch on it.
pub struct Discriminant<T>(pub T);

impl<T> FromSql for Discriminant<T>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
    value
      .as_str()?
      .parse()
      .map(Discriminant)
      .map_err(|e| FromSqlError::Other(Box::new(e)))
  }
}

/// Read an optional reaction kind column (`NULL` means no reaction).
pub fn reaction_column(
  row: &rusqlite::Row<'_>,
  idx: usize,
) -> rusqlite::Result<Option<ReactionKind>> {
  Ok(row.get::<_, Option<Discriminant<ReactionKind>>>(idx)?.map(|d| d.0))
}

pub fn encode_kind<K: Into<&'static str>>(kind: K) -> String {
  let s: &'static str = kind.into();
  s.to_owned()
}

pub fn count(n: i64) -> u64 { u64::try_from(n).unwrap_or_default() }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:       String,
  pub username:      String,
  pub email:         String,
  pub password_hash: Option<String>,
  pub avatar:        Option<String>,
  pub role:          String,
  pub created_at:    String,
}

impl RawUser {
  pub const COLUMNS: &'static str =
    "user_id, username, email, password_hash, avatar, role, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      username:      row.get(1)?,
      email:         row.get(2)?,
      password_hash: row.get(3)?,
      avatar:        row.get(4)?,
      role:          row.get(5)?,
      created_at:    row.get(6)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      username:      self.username,
      email:         self.email,
      password_hash: self.password_hash,
      avatar:        self.avatar,
      role:          decode_discriminant::<Role>("users.role", self.role)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawSession {
  pub token_digest: String,
  pub user_id:      String,
  pub created_at:   String,
  pub expires_at:   String,
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      token_digest: self.token_digest,
      user_id:      decode_uuid(&self.user_id)?,
      created_at:   decode_dt(&self.created_at)?,
      expires_at:   decode_dt(&self.expires_at)?,
    })
  }
}

/// A `posts` row plus its category names in tag order.
pub struct RawPost {
  pub post_id:    String,
  pub owner_id:   String,
  pub title:      String,
  pub body:       String,
  pub image:      Option<String>,
  pub created_at: String,
  pub categories: Vec<String>,
}

impl RawPost {
  pub const COLUMNS: &'static str =
    "p.post_id, p.owner_id, p.title, p.body, p.image, p.created_at";

  /// Reads the six [`Self::COLUMNS`]; categories are filled in afterwards.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      post_id:    row.get(0)?,
      owner_id:   row.get(1)?,
      title:      row.get(2)?,
      body:       row.get(3)?,
      image:      row.get(4)?,
      created_at: row.get(5)?,
      categories: Vec::new(),
    })
  }

  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      post_id:    decode_uuid(&self.post_id)?,
      owner_id:   decode_uuid(&self.owner_id)?,
      title:      self.title,
      body:       self.body,
      image:      self.image,
      categories: self.categories,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawComment {
  pub comment_id: String,
  pub post_id:    String,
  pub owner_id:   String,
  pub body:       String,
  pub created_at: String,
}

impl RawComment {
  pub const COLUMNS: &'static str =
    "c.comment_id, c.post_id, c.owner_id, c.body, c.created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id: row.get(0)?,
      post_id:    row.get(1)?,
      owner_id:   row.get(2)?,
      body:       row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id: decode_uuid(&self.comment_id)?,
      post_id:    decode_uuid(&self.post_id)?,
      owner_id:   decode_uuid(&self.owner_id)?,
      body:       self.body,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// The trailing columns shared by both snapshot queries.
pub struct RawEngagement {
  pub author_username: String,
  pub likes:           i64,
  pub dislikes:        i64,
  pub viewer_reaction: Option<ReactionKind>,
}

impl RawEngagement {
  /// Reads four columns starting at `start`.
  pub fn from_row(row: &rusqlite::Row<'_>, start: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      author_username: row.get(start)?,
      likes:           row.get(start + 1)?,
      dislikes:        row.get(start + 2)?,
      viewer_reaction: reaction_column(row, start + 3)?,
    })
  }

  fn counts(&self) -> ReactionCounts {
    ReactionCounts { likes: count(self.likes), dislikes: count(self.dislikes) }
  }
}

pub struct RawPostSnapshot {
  pub post:       RawPost,
  pub engagement: RawEngagement,
}

impl RawPostSnapshot {
  pub fn into_snapshot(self) -> Result<PostSnapshot> {
    let counts = self.engagement.counts();
    Ok(PostSnapshot {
      post: self.post.into_post()?,
      author_username: self.engagement.author_username,
      counts,
      viewer_reaction: ReactionState::from(self.engagement.viewer_reaction),
    })
  }
}

pub struct RawCommentSnapshot {
  pub comment:    RawComment,
  pub engagement: RawEngagement,
}

impl RawCommentSnapshot {
  pub fn into_snapshot(self) -> Result<CommentSnapshot> {
    let counts = self.engagement.counts();
    Ok(CommentSnapshot {
      comment: self.comment.into_comment()?,
      author_username: self.engagement.author_username,
      counts,
      viewer_reaction: ReactionState::from(self.engagement.viewer_reaction),
    })
  }
}

pub struct RawNotification {
  pub notification_id: String,
  pub recipient_id:    String,
  pub actor_id:        String,
  pub post_id:         Option<String>,
  pub comment_id:      Option<String>,
  pub kind:            String,
  pub is_read:         bool,
  pub created_at:      String,
}

impl RawNotification {
  pub const COLUMNS: &'static str = "n.notification_id, n.recipient_id, \
     n.actor_id, n.post_id, n.comment_id, n.kind, n.is_read, n.created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      recipient_id:    row.get(1)?,
      actor_id:        row.get(2)?,
      post_id:         row.get(3)?,
      comment_id:      row.get(4)?,
      kind:            row.get(5)?,
      is_read:         row.get(6)?,
      created_at:      row.get(7)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      recipient_id:    decode_uuid(&self.recipient_id)?,
      actor_id:        decode_uuid(&self.actor_id)?,
      post_id:         decode_opt_uuid(self.post_id)?,
      comment_id:      decode_opt_uuid(self.comment_id)?,
      kind:            decode_discriminant::<NotificationKind>(
        "notifications.kind",
        self.kind,
      )?,
      read:            self.is_read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawNotificationView {
  pub notification:   RawNotification,
  pub actor_username: Option<String>,
  pub post_title:     Option<String>,
  pub comment_body:   Option<String>,
}

impl RawNotificationView {
  pub fn into_view(self) -> Result<NotificationView> {
    Ok(NotificationView {
      notification:   self.notification.into_notification()?,
      actor_username: self.actor_username,
      post_title:     self.post_title,
      comment_body:   self.comment_body,
    })
  }
}

pub struct RawActivity {
  pub activity_id: String,
  pub actor_id:    String,
  pub kind:        String,
  pub post_id:     Option<String>,
  pub comment_id:  Option<String>,
  pub created_at:  String,
}

impl RawActivity {
  pub const COLUMNS: &'static str =
    "activity_id, actor_id, kind, post_id, comment_id, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      activity_id: row.get(0)?,
      actor_id:    row.get(1)?,
      kind:        row.get(2)?,
      post_id:     row.get(3)?,
      comment_id:  row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_activity(self) -> Result<Activity> {
    Ok(Activity {
      activity_id: decode_uuid(&self.activity_id)?,
      actor_id:    decode_uuid(&self.actor_id)?,
      kind:        decode_discriminant::<ActivityKind>("activity.kind", self.kind)?,
      post_id:     decode_opt_uuid(self.post_id)?,
      comment_id:  decode_opt_uuid(self.comment_id)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
