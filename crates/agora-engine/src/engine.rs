//! The engagement orchestrator.
//!
//! Every reaction request walks the same stages in a fixed order: resolve
//! the identity, apply the reaction, synchronise the owner's notifications,
//! then mirror the reaction into the actor's activity feed. Failures before
//! the reaction is applied abort with nothing written. Failures after it do
//! not undo the reaction; the stage is reported as degraded and can be
//! repaired with [`Engine::reconcile`].

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use uuid::Uuid;

use agora_core::{
  activity::{ActivityChange, ActivityEntry, ActivityKind},
  content::{
    CategorySummary, Comment, NewComment, NewPost, Post, PostEdit, PostSnapshot, PostView,
    validate_comment_body,
  },
  notification::{NotificationSync, NotificationView, ReactionCause},
  reaction::{ReactionCounts, ReactionKind, ReactionState, Target},
  session::UserIdentity,
  store::ForumStore,
};

use crate::{Error, Result, identity::IdentityResolver};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Lifetime of a session opened by login.
  pub session_ttl: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self { Self { session_ttl: Duration::hours(24) } }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// A follow-up stage of a reaction request.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
  Notification,
  Activity,
}

/// The result of a reaction request. The reaction itself is always applied
/// when this is returned; `degraded` lists the follow-up stages that failed.
#[derive(Debug, Clone, Serialize)]
pub struct Engagement {
  pub target:       Target,
  pub effective:    ReactionState,
  pub notification: Option<NotificationSync>,
  pub activity:     Option<ActivityChange>,
  pub degraded:     Vec<Stage>,
}

impl Engagement {
  pub fn is_complete(&self) -> bool { self.degraded.is_empty() }
}

/// Where a reaction lands once its target is resolved.
struct Resolved {
  owner_id:   Uuid,
  post_id:    Uuid,
  comment_id: Option<Uuid>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct Engine<S> {
  store:    Arc<S>,
  identity: IdentityResolver<S>,
}

impl<S: ForumStore> Engine<S> {
  pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
    let identity = IdentityResolver::new(store.clone(), config.session_ttl);
    Self { store, identity }
  }

  pub fn identity(&self) -> &IdentityResolver<S> { &self.identity }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ─── Reactions ─────────────────────────────────────────────────────────────

  /// Toggle `action` (`"like"` or `"dislike"`) on `target` for the session
  /// holder.
  pub async fn react(
    &self,
    token: Option<&str>,
    target: Target,
    action: &str,
  ) -> Result<Engagement> {
    let me = self.identity.require(token).await?;
    let desired: ReactionKind = action.parse()?;
    let resolved = self.resolve_target(target).await?;

    let transition = self
      .store
      .set_reaction(target, me.user_id, desired)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(target.to_string()))?;
    tracing::debug!(
      user_id = %me.user_id,
      %target,
      previous = %transition.previous,
      effective = %transition.effective,
      "reaction applied"
    );

    Ok(self.follow_up(&me, target, &resolved, transition.effective).await)
  }

  /// Re-run the follow-up stages for `actor_id` on `target`. Safe to call
  /// any number of times.
  pub async fn reconcile(&self, actor_id: Uuid, target: Target) -> Result<Engagement> {
    let resolved = self.resolve_target(target).await?;
    let current = self
      .store
      .get_reaction(target, actor_id)
      .await
      .map_err(Error::storage)?;
    let me = UserIdentity {
      user_id:  actor_id,
      username: self.identity.username_of(actor_id).await?,
    };
    Ok(self.follow_up(&me, target, &resolved, current).await)
  }

  pub async fn counts(&self, target: Target) -> Result<ReactionCounts> {
    self.store.count_reactions(target).await.map_err(Error::storage)
  }

  /// Each stage reads the stored reaction inside its own write
  /// transaction, so the stage that commits last always matches it.
  /// `effective` is only reported back.
  async fn follow_up(
    &self,
    me: &UserIdentity,
    target: Target,
    resolved: &Resolved,
    effective: ReactionState,
  ) -> Engagement {
    let mut degraded = Vec::new();

    let cause = ReactionCause {
      recipient_id: resolved.owner_id,
      actor_id:     me.user_id,
      post_id:      resolved.post_id,
      comment_id:   resolved.comment_id,
    };
    let notification = match self.store.sync_reaction_notification(cause).await {
      Ok(sync) => {
        tracing::debug!(%target, ?sync, "notification synced");
        Some(sync)
      }
      Err(e) => {
        tracing::warn!(%target, error = %e, "notification sync failed");
        degraded.push(Stage::Notification);
        None
      }
    };

    let activity = match self
      .store
      .record_like_dislike(me.user_id, resolved.post_id, resolved.comment_id)
      .await
    {
      Ok(change) => {
        tracing::debug!(%target, ?change, "activity recorded");
        Some(change)
      }
      Err(e) => {
        tracing::warn!(%target, error = %e, "activity update failed");
        degraded.push(Stage::Activity);
        None
      }
    };

    Engagement { target, effective, notification, activity, degraded }
  }

  /// The owner and post a reaction on `target` concerns. A comment reaction
  /// notifies the comment's author and is filed under its parent post.
  async fn resolve_target(&self, target: Target) -> Result<Resolved> {
    match target {
      Target::Post(post_id) => {
        let post = self.require_post(post_id).await?;
        Ok(Resolved { owner_id: post.owner_id, post_id, comment_id: None })
      }
      Target::Comment(comment_id) => {
        let comment = self.require_comment(comment_id).await?;
        Ok(Resolved {
          owner_id:   comment.owner_id,
          post_id:    comment.post_id,
          comment_id: Some(comment_id),
        })
      }
    }
  }

  // ─── Comments ──────────────────────────────────────────────────────────────

  pub async fn comment(
    &self,
    token: Option<&str>,
    post_id: Uuid,
    body: &str,
  ) -> Result<Comment> {
    let me = self.identity.require(token).await?;
    validate_comment_body(body)?;
    self.require_post(post_id).await?;

    let comment = self
      .store
      .create_comment(NewComment { post_id, owner_id: me.user_id, body: body.to_owned() })
      .await
      .map_err(Error::storage)?;
    tracing::info!(comment_id = %comment.comment_id, %post_id, "comment created");

    match self.store.sync_comment_notification(comment.comment_id).await {
      Ok(sync) => tracing::debug!(comment_id = %comment.comment_id, ?sync, "comment notification synced"),
      Err(e) => tracing::warn!(comment_id = %comment.comment_id, error = %e, "comment notification failed"),
    }
    if let Err(e) = self
      .store
      .record_comment(me.user_id, post_id, comment.comment_id)
      .await
    {
      tracing::warn!(comment_id = %comment.comment_id, error = %e, "comment activity failed");
    }

    Ok(comment)
  }

  pub async fn edit_comment(
    &self,
    token: Option<&str>,
    comment_id: Uuid,
    body: &str,
  ) -> Result<Comment> {
    let me = self.identity.require(token).await?;
    let comment = self.require_comment(comment_id).await?;
    if comment.owner_id != me.user_id {
      return Err(Error::Unauthorized);
    }
    validate_comment_body(body)?;

    self
      .store
      .update_comment(comment_id, body.to_owned())
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("comment {comment_id}")))
  }

  /// Owner only. The comment's activity row goes first, then the comment
  /// with everything hanging off it.
  pub async fn delete_comment(&self, token: Option<&str>, comment_id: Uuid) -> Result<()> {
    let me = self.identity.require(token).await?;
    let comment = self.require_comment(comment_id).await?;
    if comment.owner_id != me.user_id {
      return Err(Error::Unauthorized);
    }

    self
      .store
      .remove_activity(me.user_id, ActivityKind::Comment, comment.post_id, Some(comment_id))
      .await
      .map_err(Error::storage)?;
    self
      .store
      .delete_comment(comment_id)
      .await
      .map_err(Error::storage)?;
    tracing::info!(%comment_id, "comment deleted");
    Ok(())
  }

  // ─── Posts ─────────────────────────────────────────────────────────────────

  pub async fn create_post(&self, token: Option<&str>, draft: PostEdit) -> Result<Post> {
    let me = self.identity.require(token).await?;
    let input = NewPost {
      owner_id:   me.user_id,
      title:      draft.title,
      body:       draft.body,
      image:      draft.image,
      categories: draft.categories,
    };
    input.validate()?;

    let post = self.store.create_post(input).await.map_err(Error::storage)?;
    tracing::info!(post_id = %post.post_id, owner = %me.username, "post created");

    if let Err(e) = self.store.record_post_creation(me.user_id, post.post_id).await {
      tracing::warn!(post_id = %post.post_id, error = %e, "post activity failed");
    }
    Ok(post)
  }

  pub async fn edit_post(
    &self,
    token: Option<&str>,
    post_id: Uuid,
    edit: PostEdit,
  ) -> Result<Post> {
    let me = self.identity.require(token).await?;
    let post = self.require_post(post_id).await?;
    if post.owner_id != me.user_id {
      return Err(Error::Unauthorized);
    }
    edit.validate()?;

    self
      .store
      .update_post(post_id, edit)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("post {post_id}")))
  }

  /// Owner only. Activity referencing the post goes first, then the post
  /// with its comments, reactions and notifications.
  pub async fn delete_post(&self, token: Option<&str>, post_id: Uuid) -> Result<()> {
    let me = self.identity.require(token).await?;
    let post = self.require_post(post_id).await?;
    if post.owner_id != me.user_id {
      return Err(Error::Unauthorized);
    }

    let purged = self
      .store
      .purge_activity_by_post(post_id)
      .await
      .map_err(Error::storage)?;
    self.store.delete_post(post_id).await.map_err(Error::storage)?;
    tracing::info!(%post_id, purged, "post deleted");
    Ok(())
  }

  /// A post page: works for anonymous viewers.
  pub async fn post_view(&self, token: Option<&str>, post_id: Uuid) -> Result<PostView> {
    let viewer = self.identity.viewer(token).await?.user_id();
    let post = self
      .store
      .post_snapshot(post_id, viewer)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("post {post_id}")))?;
    let comments = self
      .store
      .list_comments(post_id, viewer)
      .await
      .map_err(Error::storage)?;
    Ok(PostView { post, comments })
  }

  pub async fn liked_posts(&self, token: Option<&str>) -> Result<Vec<Post>> {
    let me = self.identity.require(token).await?;
    self
      .store
      .list_liked_posts(me.user_id)
      .await
      .map_err(Error::storage)
  }

  // ─── Views ─────────────────────────────────────────────────────────────────
  //
  // All of these work for anonymous viewers; a signed-in viewer additionally
  // sees their own reaction on each post.

  /// Every post, newest first.
  pub async fn home(&self, token: Option<&str>) -> Result<Vec<PostSnapshot>> {
    let viewer = self.identity.viewer(token).await?.user_id();
    self.store.list_posts(viewer).await.map_err(Error::storage)
  }

  pub async fn categories(&self) -> Result<Vec<CategorySummary>> {
    self.store.list_categories().await.map_err(Error::storage)
  }

  /// Posts tagged with `name`, newest first.
  pub async fn category_view(
    &self,
    token: Option<&str>,
    name: &str,
  ) -> Result<Vec<PostSnapshot>> {
    let viewer = self.identity.viewer(token).await?.user_id();
    self
      .store
      .list_posts_by_category(name.to_owned(), viewer)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("category {name}")))
  }

  /// The posts `username` wrote, newest first.
  pub async fn profile_posts(
    &self,
    token: Option<&str>,
    username: &str,
  ) -> Result<Vec<PostSnapshot>> {
    let viewer = self.identity.viewer(token).await?.user_id();
    let owner = self
      .store
      .get_user_by_username(username.to_owned())
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("user {username}")))?;
    self
      .store
      .list_post_snapshots_by_user(owner.user_id, viewer)
      .await
      .map_err(Error::storage)
  }

  // ─── Notifications ─────────────────────────────────────────────────────────

  pub async fn inbox(&self, token: Option<&str>) -> Result<Vec<NotificationView>> {
    let me = self.identity.require(token).await?;
    self.store.list_unread(me.user_id).await.map_err(Error::storage)
  }

  pub async fn has_unread(&self, token: Option<&str>) -> Result<bool> {
    let me = self.identity.require(token).await?;
    self.store.unread_exists(me.user_id).await.map_err(Error::storage)
  }

  /// Mark a notification read and return the post it leads to.
  pub async fn open_notification(
    &self,
    token: Option<&str>,
    notification_id: Uuid,
  ) -> Result<Uuid> {
    let me = self.identity.require(token).await?;
    let not_found = || Error::NotFound(format!("notification {notification_id}"));

    if !self
      .store
      .mark_read(me.user_id, notification_id)
      .await
      .map_err(Error::storage)?
    {
      return Err(not_found());
    }
    self
      .store
      .resolve_target_post(notification_id)
      .await
      .map_err(Error::storage)?
      .ok_or_else(not_found)
  }

  // ─── Activity ──────────────────────────────────────────────────────────────

  /// The caller's feed, after making sure every post they wrote has its
  /// creation entry.
  pub async fn activity_page(&self, token: Option<&str>) -> Result<Vec<ActivityEntry>> {
    let me = self.identity.require(token).await?;
    let backfilled = self
      .store
      .ensure_post_creation_recorded(me.user_id)
      .await
      .map_err(Error::storage)?;
    if backfilled > 0 {
      tracing::debug!(user_id = %me.user_id, backfilled, "post creation activity backfilled");
    }
    self.store.list_activity(me.user_id).await.map_err(Error::storage)
  }

  // ─── Lookups ───────────────────────────────────────────────────────────────

  async fn require_post(&self, post_id: Uuid) -> Result<Post> {
    self
      .store
      .get_post(post_id)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("post {post_id}")))
  }

  async fn require_comment(&self, comment_id: Uuid) -> Result<Comment> {
    self
      .store
      .get_comment(comment_id)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("comment {comment_id}")))
  }
}
