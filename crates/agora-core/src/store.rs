//! The `ForumStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `agora-store-sqlite`).
//! Higher layers (`agora-engine`, `agora-cli`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Every read-modify-write method (reactions, notification and activity
//! synchronisation, backfill) must be atomic per key in the backend: the
//! read and the dependent writes happen under one write lock, so concurrent
//! callers never observe or produce a half-applied state.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  activity::{Activity, ActivityChange, ActivityEntry, ActivityKind},
  content::{
    CategorySummary, Comment, CommentSnapshot, NewComment, NewPost, Post, PostEdit,
    PostSnapshot,
  },
  notification::{Notification, NotificationSync, NotificationView, ReactionCause},
  reaction::{
    ReactionCounts, ReactionKind, ReactionState, ReactionTransition, Target,
  },
  session::Session,
  user::{NewUser, ProfileEdit, User},
};

/// Abstraction over an Agora forum store backend.
///
/// Methods return `Option`/`bool` for missing rows instead of errors; the
/// error type is reserved for storage failures.
pub trait ForumStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new user. Fails if the username is taken.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user_by_username(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Apply a profile edit. Returns `None` if the user does not exist.
  fn update_profile(
    &self,
    user_id: Uuid,
    edit: ProfileEdit,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  fn insert_session(
    &self,
    session: Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Look a session up by token digest. Expired sessions are returned as
  /// is; the caller decides what expiry means.
  fn get_session(
    &self,
    token_digest: String,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Returns `true` if a session was removed.
  fn delete_session(
    &self,
    token_digest: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove every session that expired at or before `now`. Returns the
  /// number of rows removed.
  fn purge_expired_sessions(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Posts ─────────────────────────────────────────────────────────────

  /// Persist a post; categories that do not exist yet are created.
  fn create_post(
    &self,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  fn get_post(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// Replace a post's editable fields. Returns `None` if it does not exist.
  fn update_post(
    &self,
    post_id: Uuid,
    edit: PostEdit,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// Delete a post together with its comments, reactions, notifications
  /// and activity rows. Returns `false` if it did not exist.
  fn delete_post(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All posts owned by `user_id`, newest first.
  fn list_posts_by_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  /// A post with live counts and the viewer's own reaction.
  fn post_snapshot(
    &self,
    post_id: Uuid,
    viewer: Option<Uuid>,
  ) -> impl Future<Output = Result<Option<PostSnapshot>, Self::Error>> + Send + '_;

  /// Every post as seen by `viewer`, newest first.
  fn list_posts(
    &self,
    viewer: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<PostSnapshot>, Self::Error>> + Send + '_;

  /// Snapshots of the posts owned by `owner_id`, newest first.
  fn list_post_snapshots_by_user(
    &self,
    owner_id: Uuid,
    viewer: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<PostSnapshot>, Self::Error>> + Send + '_;

  // ── Categories ────────────────────────────────────────────────────────

  /// Every category by name, with its post count.
  fn list_categories(
    &self,
  ) -> impl Future<Output = Result<Vec<CategorySummary>, Self::Error>> + Send + '_;

  /// Posts tagged with the category `name`, newest first. `None` if no
  /// such category exists.
  fn list_posts_by_category(
    &self,
    name: String,
    viewer: Option<Uuid>,
  ) -> impl Future<Output = Result<Option<Vec<PostSnapshot>>, Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  fn create_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    comment_id: Uuid,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  fn update_comment(
    &self,
    comment_id: Uuid,
    body: String,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// Delete a comment together with its own reactions, notifications and
  /// activity rows. Returns `false` if it did not exist.
  fn delete_comment(
    &self,
    comment_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Comments on a post, newest first, as seen by `viewer`.
  fn list_comments(
    &self,
    post_id: Uuid,
    viewer: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<CommentSnapshot>, Self::Error>> + Send + '_;

  // ── Reactions ─────────────────────────────────────────────────────────

  fn get_reaction(
    &self,
    target: Target,
    user_id: Uuid,
  ) -> impl Future<Output = Result<ReactionState, Self::Error>> + Send + '_;

  /// Toggle `desired` on `target` for `user_id` and return the transition.
  /// Requesting the current state clears it; a cleared state leaves no row.
  /// `None` if the target does not exist.
  fn set_reaction(
    &self,
    target: Target,
    user_id: Uuid,
    desired: ReactionKind,
  ) -> impl Future<Output = Result<Option<ReactionTransition>, Self::Error>> + Send + '_;

  fn count_reactions(
    &self,
    target: Target,
  ) -> impl Future<Output = Result<ReactionCounts, Self::Error>> + Send + '_;

  /// Posts `user_id` currently likes, newest first.
  fn list_liked_posts(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Bring the like/dislike notifications for `cause` in line with the
  /// actor's reaction as stored when the sync runs, so the last sync to
  /// commit always matches the reaction row. Self-reactions are never
  /// notified.
  fn sync_reaction_notification(
    &self,
    cause: ReactionCause,
  ) -> impl Future<Output = Result<NotificationSync, Self::Error>> + Send + '_;

  /// Notify the post owner about a new comment, at most once per comment.
  /// Returns `None` if the comment does not exist.
  fn sync_comment_notification(
    &self,
    comment_id: Uuid,
  ) -> impl Future<Output = Result<Option<NotificationSync>, Self::Error>> + Send + '_;

  fn unread_exists(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Unread notifications for `user_id`, newest first.
  fn list_unread(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<NotificationView>, Self::Error>> + Send + '_;

  fn get_notification(
    &self,
    notification_id: Uuid,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;

  /// Mark a notification read. Only the recipient's own notifications are
  /// affected; returns `false` if nothing matched.
  fn mark_read(
    &self,
    user_id: Uuid,
    notification_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The post a notification leads to. Comment notifications resolve
  /// through the comment's parent post.
  fn resolve_target_post(
    &self,
    notification_id: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  // ── Activity ──────────────────────────────────────────────────────────

  /// Make the actor's like/dislike row for (post, comment) mirror the
  /// actor's reaction on the comment (or the post when `comment_id` is
  /// `None`) as stored when the call runs.
  fn record_like_dislike(
    &self,
    actor_id: Uuid,
    post_id: Uuid,
    comment_id: Option<Uuid>,
  ) -> impl Future<Output = Result<ActivityChange, Self::Error>> + Send + '_;

  /// Idempotent on (actor, comment).
  fn record_comment(
    &self,
    actor_id: Uuid,
    post_id: Uuid,
    comment_id: Uuid,
  ) -> impl Future<Output = Result<Activity, Self::Error>> + Send + '_;

  /// Idempotent on (actor, post).
  fn record_post_creation(
    &self,
    actor_id: Uuid,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Activity, Self::Error>> + Send + '_;

  /// Insert a `CreatedPost` row for every post of `user_id` lacking one.
  /// Returns the number of rows inserted.
  fn ensure_post_creation_recorded(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Returns `true` if a row was removed.
  fn remove_activity(
    &self,
    actor_id: Uuid,
    kind: ActivityKind,
    post_id: Uuid,
    comment_id: Option<Uuid>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove every row referencing `post_id`. Returns the number removed.
  fn purge_activity_by_post(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// The user's feed, newest first. Rows whose target no longer exists are
  /// skipped.
  fn list_activity(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ActivityEntry>, Self::Error>> + Send + '_;
}
