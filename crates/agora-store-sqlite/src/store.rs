//! [`SqliteStore`]: the SQLite implementation of [`ForumStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use agora_core::{
  activity::{Activity, ActivityChange, ActivityEntry, ActivityKind, ActivitySubject},
  content::{
    CategorySummary, Comment, CommentSnapshot, NewComment, NewPost, Post, PostEdit,
    PostSnapshot, validate_comment_body,
  },
  notification::{Notification, NotificationSync, NotificationView, ReactionCause},
  reaction::{
    ReactionCounts, ReactionKind, ReactionState, ReactionTransition, Target,
  },
  session::Session,
  store::ForumStore,
  user::{NewUser, ProfileEdit, User},
};

use crate::{
  Error, Result, activity,
  activity::RawSubject,
  content,
  encode::{
    RawComment, RawPost, RawPostSnapshot, RawSession, RawUser, count, decode_uuid,
    encode_dt, encode_kind, encode_uuid,
  },
  notifications::{self, CauseKey},
  reactions,
  schema::SCHEMA,
  users::{self, Collision},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Agora forum store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// How long a write waits on a locked database before failing.
  pub async fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(timeout)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    let version: i64 = self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
      })
      .await?;
    tracing::debug!(version, "sqlite schema ready");
    Ok(())
  }

  /// Run `f` on the connection thread without a transaction.
  async fn read<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&Connection) -> rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    Ok(self.conn.call(move |conn| Ok(f(conn)?)).await?)
  }

  /// Run `f` inside a `BEGIN IMMEDIATE` transaction: the write lock is taken
  /// before the first read, so the reads `f` branches on cannot go stale.
  async fn write<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&Connection) -> rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let out = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
      })
      .await?;
    Ok(out)
  }
}

fn collision_error(collision: Collision, username: String, email: String) -> Error {
  match collision {
    Collision::Username => Error::UsernameTaken(username),
    Collision::Email => Error::EmailTaken(email),
  }
}

// ─── ForumStore impl ─────────────────────────────────────────────────────────

impl ForumStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    input.validate()?;

    let user = User {
      user_id:       Uuid::new_v4(),
      username:      input.username,
      email:         input.email,
      password_hash: input.password_hash,
      avatar:        input.avatar,
      role:          input.role,
      created_at:    Utc::now(),
    };
    let raw = RawUser {
      user_id:       encode_uuid(user.user_id),
      username:      user.username.clone(),
      email:         user.email.clone(),
      password_hash: user.password_hash.clone(),
      avatar:        user.avatar.clone(),
      role:          encode_kind(user.role),
      created_at:    encode_dt(user.created_at),
    };

    let collision = self
      .write(move |conn| {
        if let Some(c) = users::collision(conn, &raw.username, Some(raw.email.as_str()), None)? {
          return Ok(Some(c));
        }
        users::insert_user(conn, &raw)?;
        Ok(None)
      })
      .await?;

    match collision {
      Some(c) => Err(collision_error(c, user.username, user.email)),
      None => Ok(user),
    }
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
    let id = encode_uuid(user_id);
    let raw = self.read(move |conn| users::find_user(conn, "user_id", &id)).await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn get_user_by_username(&self, username: String) -> Result<Option<User>> {
    let raw = self
      .read(move |conn| users::find_user(conn, "username", &username))
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn get_user_by_email(&self, email: String) -> Result<Option<User>> {
    let raw = self
      .read(move |conn| users::find_user(conn, "email", &email))
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn update_profile(
    &self,
    user_id: Uuid,
    edit: ProfileEdit,
  ) -> Result<Option<User>> {
    edit.validate()?;

    let id = encode_uuid(user_id);
    let username = edit.username.clone();
    let outcome = self
      .write(move |conn| {
        if let Some(c) = users::collision(conn, &edit.username, None, Some(id.as_str()))? {
          return Ok(Err(c));
        }
        if !users::update_profile(conn, &id, &edit.username, edit.avatar.as_deref())? {
          return Ok(Ok(None));
        }
        Ok(Ok(users::find_user(conn, "user_id", &id)?))
      })
      .await?;

    match outcome {
      Err(c) => Err(collision_error(c, username, String::new())),
      Ok(raw) => raw.map(RawUser::into_user).transpose(),
    }
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn insert_session(&self, session: Session) -> Result<()> {
    let raw = RawSession {
      token_digest: session.token_digest,
      user_id:      encode_uuid(session.user_id),
      created_at:   encode_dt(session.created_at),
      expires_at:   encode_dt(session.expires_at),
    };
    self.read(move |conn| users::insert_session(conn, &raw)).await
  }

  async fn get_session(&self, token_digest: String) -> Result<Option<Session>> {
    let raw = self
      .read(move |conn| users::find_session(conn, &token_digest))
      .await?;
    raw.map(RawSession::into_session).transpose()
  }

  async fn delete_session(&self, token_digest: String) -> Result<bool> {
    self
      .read(move |conn| users::delete_session(conn, &token_digest))
      .await
  }

  async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
    let now = encode_dt(now);
    self.read(move |conn| users::purge_expired(conn, &now)).await
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn create_post(&self, input: NewPost) -> Result<Post> {
    input.validate()?;

    let post = Post {
      post_id:    Uuid::new_v4(),
      owner_id:   input.owner_id,
      title:      input.title,
      body:       input.body,
      image:      input.image,
      categories: input.categories.iter().map(|c| c.trim().to_owned()).collect(),
      created_at: Utc::now(),
    };
    let raw = RawPost {
      post_id:    encode_uuid(post.post_id),
      owner_id:   encode_uuid(post.owner_id),
      title:      post.title.clone(),
      body:       post.body.clone(),
      image:      post.image.clone(),
      created_at: encode_dt(post.created_at),
      categories: post.categories.clone(),
    };

    self.write(move |conn| content::insert_post(conn, &raw)).await?;
    Ok(post)
  }

  async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
    let id = encode_uuid(post_id);
    let raw = self.read(move |conn| content::find_post(conn, &id)).await?;
    raw.map(RawPost::into_post).transpose()
  }

  async fn update_post(&self, post_id: Uuid, edit: PostEdit) -> Result<Option<Post>> {
    edit.validate()?;

    let id = encode_uuid(post_id);
    let categories: Vec<String> =
      edit.categories.iter().map(|c| c.trim().to_owned()).collect();
    let raw = self
      .write(move |conn| {
        let found = content::update_post(
          conn,
          &id,
          &edit.title,
          &edit.body,
          edit.image.as_deref(),
          &categories,
        )?;
        if !found {
          return Ok(None);
        }
        content::find_post(conn, &id)
      })
      .await?;
    raw.map(RawPost::into_post).transpose()
  }

  async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
    let id = encode_uuid(post_id);
    self.write(move |conn| content::delete_post(conn, &id)).await
  }

  async fn list_posts_by_user(&self, user_id: Uuid) -> Result<Vec<Post>> {
    let id = encode_uuid(user_id);
    let raws = self
      .read(move |conn| content::posts_by_owner(conn, &id))
      .await?;
    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn post_snapshot(
    &self,
    post_id: Uuid,
    viewer: Option<Uuid>,
  ) -> Result<Option<PostSnapshot>> {
    let id = encode_uuid(post_id);
    let viewer = viewer.map(encode_uuid);
    let raw = self
      .read(move |conn| content::post_snapshot(conn, &id, viewer.as_deref()))
      .await?;
    raw.map(|r| r.into_snapshot()).transpose()
  }

  async fn list_posts(&self, viewer: Option<Uuid>) -> Result<Vec<PostSnapshot>> {
    let viewer = viewer.map(encode_uuid);
    let raws = self
      .read(move |conn| content::post_snapshots(conn, viewer.as_deref()))
      .await?;
    raws.into_iter().map(RawPostSnapshot::into_snapshot).collect()
  }

  async fn list_post_snapshots_by_user(
    &self,
    owner_id: Uuid,
    viewer: Option<Uuid>,
  ) -> Result<Vec<PostSnapshot>> {
    let owner = encode_uuid(owner_id);
    let viewer = viewer.map(encode_uuid);
    let raws = self
      .read(move |conn| content::post_snapshots_by_owner(conn, &owner, viewer.as_deref()))
      .await?;
    raws.into_iter().map(RawPostSnapshot::into_snapshot).collect()
  }

  // ── Categories ────────────────────────────────────────────────────────────

  async fn list_categories(&self) -> Result<Vec<CategorySummary>> {
    let rows = self.read(content::category_summaries).await?;
    Ok(
      rows
        .into_iter()
        .map(|(name, n)| CategorySummary { name, post_count: count(n) })
        .collect(),
    )
  }

  async fn list_posts_by_category(
    &self,
    name: String,
    viewer: Option<Uuid>,
  ) -> Result<Option<Vec<PostSnapshot>>> {
    let viewer = viewer.map(encode_uuid);
    let raws = self
      .read(move |conn| {
        content::post_snapshots_in_category(conn, name.trim(), viewer.as_deref())
      })
      .await?;
    raws
      .map(|raws| {
        raws
          .into_iter()
          .map(RawPostSnapshot::into_snapshot)
          .collect::<Result<Vec<_>>>()
      })
      .transpose()
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn create_comment(&self, input: NewComment) -> Result<Comment> {
    input.validate()?;

    let comment = Comment {
      comment_id: Uuid::new_v4(),
      post_id:    input.post_id,
      owner_id:   input.owner_id,
      body:       input.body,
      created_at: Utc::now(),
    };
    let raw = RawComment {
      comment_id: encode_uuid(comment.comment_id),
      post_id:    encode_uuid(comment.post_id),
      owner_id:   encode_uuid(comment.owner_id),
      body:       comment.body.clone(),
      created_at: encode_dt(comment.created_at),
    };

    let inserted = self
      .write(move |conn| {
        if content::find_post(conn, &raw.post_id)?.is_none() {
          return Ok(false);
        }
        content::insert_comment(conn, &raw)?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::MissingReference(format!("post {}", comment.post_id)));
    }
    Ok(comment)
  }

  async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>> {
    let id = encode_uuid(comment_id);
    let raw = self.read(move |conn| content::find_comment(conn, &id)).await?;
    raw.map(RawComment::into_comment).transpose()
  }

  async fn update_comment(
    &self,
    comment_id: Uuid,
    body: String,
  ) -> Result<Option<Comment>> {
    validate_comment_body(&body)?;

    let id = encode_uuid(comment_id);
    let raw = self
      .write(move |conn| {
        if !content::update_comment(conn, &id, &body)? {
          return Ok(None);
        }
        content::find_comment(conn, &id)
      })
      .await?;
    raw.map(RawComment::into_comment).transpose()
  }

  async fn delete_comment(&self, comment_id: Uuid) -> Result<bool> {
    let id = encode_uuid(comment_id);
    self.write(move |conn| content::delete_comment(conn, &id)).await
  }

  async fn list_comments(
    &self,
    post_id: Uuid,
    viewer: Option<Uuid>,
  ) -> Result<Vec<CommentSnapshot>> {
    let id = encode_uuid(post_id);
    let viewer = viewer.map(encode_uuid);
    let raws = self
      .read(move |conn| content::comment_snapshots(conn, &id, viewer.as_deref()))
      .await?;
    raws.into_iter().map(|r| r.into_snapshot()).collect()
  }

  // ── Reactions ─────────────────────────────────────────────────────────────

  async fn get_reaction(&self, target: Target, user_id: Uuid) -> Result<ReactionState> {
    let user = encode_uuid(user_id);
    self
      .read(move |conn| reactions::current(conn, target, &user))
      .await
  }

  async fn set_reaction(
    &self,
    target: Target,
    user_id: Uuid,
    desired: ReactionKind,
  ) -> Result<Option<ReactionTransition>> {
    let user = encode_uuid(user_id);
    let at = encode_dt(Utc::now());

    self
      .write(move |conn| {
        if !reactions::target_exists(conn, target)? {
          return Ok(None);
        }
        let previous = reactions::current(conn, target, &user)?;
        let transition = ReactionTransition::new(previous, desired);
        reactions::store(conn, target, &user, transition.effective, &at)?;
        Ok(Some(transition))
      })
      .await
  }

  async fn count_reactions(&self, target: Target) -> Result<ReactionCounts> {
    let (likes, dislikes) = self
      .read(move |conn| reactions::counts(conn, target))
      .await?;
    Ok(ReactionCounts { likes: count(likes), dislikes: count(dislikes) })
  }

  async fn list_liked_posts(&self, user_id: Uuid) -> Result<Vec<Post>> {
    let id = encode_uuid(user_id);
    let raws = self.read(move |conn| content::liked_posts(conn, &id)).await?;
    raws.into_iter().map(RawPost::into_post).collect()
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn sync_reaction_notification(&self, cause: ReactionCause) -> Result<NotificationSync> {
    if cause.is_self_reaction() {
      return Ok(NotificationSync::Suppressed);
    }

    let target = cause.target();
    let key = CauseKey {
      recipient_id: encode_uuid(cause.recipient_id),
      actor_id:     encode_uuid(cause.actor_id),
      post_id:      encode_uuid(cause.post_id),
      comment_id:   cause.comment_id.map(encode_uuid),
    };
    let at = encode_dt(Utc::now());
    self
      .write(move |conn| notifications::sync_reaction(conn, &key, target, &at))
      .await
  }

  async fn sync_comment_notification(
    &self,
    comment_id: Uuid,
  ) -> Result<Option<NotificationSync>> {
    let id = encode_uuid(comment_id);
    let at = encode_dt(Utc::now());
    self
      .write(move |conn| notifications::sync_comment(conn, &id, &at))
      .await
  }

  async fn unread_exists(&self, user_id: Uuid) -> Result<bool> {
    let id = encode_uuid(user_id);
    self
      .read(move |conn| notifications::unread_exists(conn, &id))
      .await
  }

  async fn list_unread(&self, user_id: Uuid) -> Result<Vec<NotificationView>> {
    let id = encode_uuid(user_id);
    let raws = self
      .read(move |conn| notifications::list_unread(conn, &id))
      .await?;
    raws.into_iter().map(|r| r.into_view()).collect()
  }

  async fn get_notification(
    &self,
    notification_id: Uuid,
  ) -> Result<Option<Notification>> {
    let id = encode_uuid(notification_id);
    let raw = self.read(move |conn| notifications::find(conn, &id)).await?;
    raw.map(|r| r.into_notification()).transpose()
  }

  async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool> {
    let user = encode_uuid(user_id);
    let id = encode_uuid(notification_id);
    self
      .write(move |conn| notifications::mark_read(conn, &user, &id))
      .await
  }

  async fn resolve_target_post(&self, notification_id: Uuid) -> Result<Option<Uuid>> {
    let id = encode_uuid(notification_id);
    let post = self
      .read(move |conn| notifications::target_post(conn, &id))
      .await?;
    post.as_deref().map(decode_uuid).transpose()
  }

  // ── Activity ──────────────────────────────────────────────────────────────

  async fn record_like_dislike(
    &self,
    actor_id: Uuid,
    post_id: Uuid,
    comment_id: Option<Uuid>,
  ) -> Result<ActivityChange> {
    let target = Target::within(post_id, comment_id);
    let actor = encode_uuid(actor_id);
    let post = encode_uuid(post_id);
    let comment = comment_id.map(encode_uuid);
    let at = encode_dt(Utc::now());
    self
      .write(move |conn| {
        activity::mirror_reaction(conn, &actor, &post, comment.as_deref(), target, &at)
      })
      .await
  }

  async fn record_comment(
    &self,
    actor_id: Uuid,
    post_id: Uuid,
    comment_id: Uuid,
  ) -> Result<Activity> {
    let actor = encode_uuid(actor_id);
    let post = encode_uuid(post_id);
    let comment = encode_uuid(comment_id);
    let at = encode_dt(Utc::now());
    let raw = self
      .write(move |conn| {
        activity::record_once(
          conn,
          &actor,
          ActivityKind::Comment,
          &post,
          Some(comment.as_str()),
          &at,
        )
      })
      .await?;
    raw.into_activity()
  }

  async fn record_post_creation(&self, actor_id: Uuid, post_id: Uuid) -> Result<Activity> {
    let actor = encode_uuid(actor_id);
    let post = encode_uuid(post_id);
    let at = encode_dt(Utc::now());
    let raw = self
      .write(move |conn| {
        activity::record_once(conn, &actor, ActivityKind::CreatedPost, &post, None, &at)
      })
      .await?;
    raw.into_activity()
  }

  async fn ensure_post_creation_recorded(&self, user_id: Uuid) -> Result<usize> {
    let id = encode_uuid(user_id);
    self
      .write(move |conn| activity::backfill_post_creation(conn, &id))
      .await
  }

  async fn remove_activity(
    &self,
    actor_id: Uuid,
    kind: ActivityKind,
    post_id: Uuid,
    comment_id: Option<Uuid>,
  ) -> Result<bool> {
    let actor = encode_uuid(actor_id);
    let post = encode_uuid(post_id);
    let comment = comment_id.map(encode_uuid);
    self
      .write(move |conn| activity::remove(conn, &actor, kind, &post, comment.as_deref()))
      .await
  }

  async fn purge_activity_by_post(&self, post_id: Uuid) -> Result<usize> {
    let id = encode_uuid(post_id);
    self.write(move |conn| activity::purge_by_post(conn, &id)).await
  }

  async fn list_activity(&self, user_id: Uuid) -> Result<Vec<ActivityEntry>> {
    let id = encode_uuid(user_id);
    let rows = self.read(move |conn| activity::feed(conn, &id)).await?;

    rows
      .into_iter()
      .map(|(raw, subject)| {
        let subject = match subject {
          RawSubject::Post(post) => ActivitySubject::Post(post.into_snapshot()?),
          RawSubject::Comment { comment, post } => ActivitySubject::Comment {
            comment: comment.into_snapshot()?,
            post:    post.into_snapshot()?,
          },
        };
        Ok(ActivityEntry { activity: raw.into_activity()?, subject })
      })
      .collect()
  }
}
