//! Orchestrator tests against an in-memory SQLite store.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use agora_core::{
  activity::{ActivityChange, ActivityKind, ActivitySubject},
  content::{Post, PostEdit},
  notification::{NotificationKind, NotificationSync},
  reaction::{ReactionCounts, ReactionKind, ReactionState, Target},
  store::ForumStore,
  user::User,
};
use agora_store_sqlite::SqliteStore;

use crate::{Engine, EngineConfig, Error, Stage};


use flaky::FlakyStore;

async fn engine() -> Engine<SqliteStore> {
  engine_with(EngineConfig::default()).await
}

async fn engine_with(config: EngineConfig) -> Engine<SqliteStore> {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  Engine::new(Arc::new(store), config)
}

/// A signed-in user, created through the verified-identity path so tests
/// skip password hashing.
async fn member<S: ForumStore>(e: &Engine<S>, name: &str) -> (User, String) {
  let grant = e
    .identity()
    .login_verified(name, &format!("{name}@example.com"))
    .await
    .unwrap();
  (grant.user, grant.token)
}

fn draft(title: &str) -> PostEdit {
  PostEdit {
    title:      title.into(),
    body:       "body".into(),
    image:      None,
    categories: vec!["general".into()],
  }
}

async fn publish<S: ForumStore>(e: &Engine<S>, token: &str, title: &str) -> Post {
  e.create_post(Some(token), draft(title)).await.unwrap()
}

async fn inbox_kinds<S: ForumStore>(e: &Engine<S>, token: &str) -> Vec<NotificationKind> {
  e.inbox(Some(token))
    .await
    .unwrap()
    .into_iter()
    .map(|n| n.notification.kind)
    .collect()
}

async fn reaction_kinds<S: ForumStore>(e: &Engine<S>, token: &str) -> Vec<ActivityKind> {
  e.activity_page(Some(token))
    .await
    .unwrap()
    .into_iter()
    .map(|entry| entry.activity.kind)
    .filter(|k| matches!(k, ActivityKind::Like | ActivityKind::Dislike))
    .collect()
}

// ─── Reaction scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn like_like_dislike_keeps_everything_in_step() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;
  let target = Target::Post(post.post_id);

  let first = e.react(Some(bob.as_str()), target, "like").await.unwrap();
  assert_eq!(first.effective, ReactionState::Like);
  assert!(first.is_complete());
  assert_eq!(first.notification, Some(NotificationSync::Created(NotificationKind::Like)));
  assert_eq!(e.counts(target).await.unwrap(), ReactionCounts { likes: 1, dislikes: 0 });
  assert_eq!(inbox_kinds(&e, &alice).await, vec![NotificationKind::Like]);
  assert_eq!(reaction_kinds(&e, &bob).await, vec![ActivityKind::Like]);

  let second = e.react(Some(bob.as_str()), target, "like").await.unwrap();
  assert_eq!(second.effective, ReactionState::None);
  assert_eq!(e.counts(target).await.unwrap(), ReactionCounts::default());
  assert!(inbox_kinds(&e, &alice).await.is_empty());
  assert!(reaction_kinds(&e, &bob).await.is_empty());

  let third = e.react(Some(bob.as_str()), target, "dislike").await.unwrap();
  assert_eq!(third.effective, ReactionState::Dislike);
  assert_eq!(e.counts(target).await.unwrap(), ReactionCounts { likes: 0, dislikes: 1 });
  assert_eq!(inbox_kinds(&e, &alice).await, vec![NotificationKind::Dislike]);
  assert_eq!(reaction_kinds(&e, &bob).await, vec![ActivityKind::Dislike]);
}

#[tokio::test]
async fn like_then_dislike_leaves_one_dislike_notification() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;
  let target = Target::Post(post.post_id);

  e.react(Some(bob.as_str()), target, "like").await.unwrap();
  let out = e.react(Some(bob.as_str()), target, "dislike").await.unwrap();
  assert_eq!(out.effective, ReactionState::Dislike);

  assert_eq!(inbox_kinds(&e, &alice).await, vec![NotificationKind::Dislike]);
  assert_eq!(reaction_kinds(&e, &bob).await, vec![ActivityKind::Dislike]);
}

#[tokio::test]
async fn reacting_to_own_post_is_recorded_but_not_notified() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let post = publish(&e, &alice, "Hello").await;

  let out = e.react(Some(alice.as_str()), Target::Post(post.post_id), "like").await.unwrap();
  assert_eq!(out.notification, Some(NotificationSync::Suppressed));
  assert!(!e.has_unread(Some(alice.as_str())).await.unwrap());
  assert_eq!(reaction_kinds(&e, &alice).await, vec![ActivityKind::Like]);
}

#[tokio::test]
async fn comment_reaction_notifies_the_comment_author() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let (_, carol) = member(&e, "carol").await;
  let post = publish(&e, &alice, "Hello").await;
  let comment = e.comment(Some(bob.as_str()), post.post_id, "nice").await.unwrap();

  // Clear alice's comment notification so only reaction effects remain.
  let n = e.inbox(Some(alice.as_str())).await.unwrap();
  e.open_notification(Some(alice.as_str()), n[0].notification.notification_id)
    .await
    .unwrap();

  e.react(Some(carol.as_str()), Target::Comment(comment.comment_id), "like")
    .await
    .unwrap();

  assert!(!e.has_unread(Some(alice.as_str())).await.unwrap());
  let bob_inbox = e.inbox(Some(bob.as_str())).await.unwrap();
  assert_eq!(bob_inbox.len(), 1);
  assert_eq!(bob_inbox[0].notification.kind, NotificationKind::Like);
  assert_eq!(bob_inbox[0].notification.comment_id, Some(comment.comment_id));
  assert_eq!(bob_inbox[0].notification.post_id, Some(post.post_id));

  let id = bob_inbox[0].notification.notification_id;
  assert_eq!(e.open_notification(Some(bob.as_str()), id).await.unwrap(), post.post_id);
}

#[tokio::test]
async fn none_is_not_an_action() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (bob_user, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;
  let target = Target::Post(post.post_id);

  for action in ["none", "LIKE", ""] {
    let err = e.react(Some(bob.as_str()), target, action).await.unwrap_err();
    assert!(matches!(err, Error::InvalidAction(_)), "{action:?}: {err}");
  }
  assert_eq!(
    e.store().get_reaction(target, bob_user.user_id).await.unwrap(),
    ReactionState::None
  );
  assert!(!e.has_unread(Some(alice.as_str())).await.unwrap());
}

#[tokio::test]
async fn reacting_to_a_missing_target_is_not_found() {
  let e = engine().await;
  let (_, bob) = member(&e, "bob").await;
  let err = e
    .react(Some(bob.as_str()), Target::Post(Uuid::new_v4()), "like")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn concurrent_toggles_converge_after_reconcile() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (bob_user, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;
  let target = Target::Post(post.post_id);

  let (a, b) = tokio::join!(
    e.react(Some(bob.as_str()), target, "like"),
    e.react(Some(bob.as_str()), target, "like"),
  );
  a.unwrap();
  b.unwrap();

  // Two toggles of the same action cancel out, and whichever follow-up
  // commits last sees the final state, so nothing is left behind.
  assert_eq!(e.counts(target).await.unwrap(), ReactionCounts::default());
  assert!(e.inbox(Some(alice.as_str())).await.unwrap().is_empty());
  assert!(reaction_kinds(&e, &bob).await.is_empty());

  let repaired = e.reconcile(bob_user.user_id, target).await.unwrap();
  assert_eq!(repaired.effective, ReactionState::None);
  assert_eq!(repaired.notification, Some(NotificationSync::Unchanged));
  assert_eq!(repaired.activity, Some(ActivityChange::Unchanged));
  assert!(e.inbox(Some(alice.as_str())).await.unwrap().is_empty());
  assert!(reaction_kinds(&e, &bob).await.is_empty());
}

// ─── Degraded follow-ups ─────────────────────────────────────────────────────

async fn flaky_engine() -> Engine<FlakyStore> {
  Engine::new(Arc::new(FlakyStore::open().await), EngineConfig::default())
}

#[tokio::test]
async fn failed_follow_ups_leave_the_reaction_standing() {
  let e = flaky_engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (bob_user, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;
  let target = Target::Post(post.post_id);

  e.store().break_notifications();
  e.store().break_activity();
  let out = e.react(Some(bob.as_str()), target, "like").await.unwrap();
  assert_eq!(out.effective, ReactionState::Like);
  assert_eq!(out.degraded, vec![Stage::Notification, Stage::Activity]);
  assert!(!out.is_complete());
  assert_eq!(out.notification, None);
  assert_eq!(out.activity, None);

  assert_eq!(
    e.store().get_reaction(target, bob_user.user_id).await.unwrap(),
    ReactionState::Like
  );
  assert_eq!(e.counts(target).await.unwrap(), ReactionCounts { likes: 1, dislikes: 0 });
  assert!(inbox_kinds(&e, &alice).await.is_empty());
  assert!(reaction_kinds(&e, &bob).await.is_empty());

  e.store().heal();
  let repaired = e.reconcile(bob_user.user_id, target).await.unwrap();
  assert!(repaired.is_complete());
  assert_eq!(repaired.effective, ReactionState::Like);
  assert_eq!(
    repaired.notification,
    Some(NotificationSync::Created(NotificationKind::Like))
  );
  assert_eq!(repaired.activity, Some(ActivityChange::Inserted(ReactionKind::Like)));
  assert_eq!(inbox_kinds(&e, &alice).await, vec![NotificationKind::Like]);
  assert_eq!(reaction_kinds(&e, &bob).await, vec![ActivityKind::Like]);
}

#[tokio::test]
async fn one_failed_stage_does_not_block_the_other() {
  let e = flaky_engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (bob_user, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;
  let target = Target::Post(post.post_id);

  e.react(Some(bob.as_str()), target, "like").await.unwrap();

  // The un-like reaches the notifications but not the feed.
  e.store().break_activity();
  let out = e.react(Some(bob.as_str()), target, "like").await.unwrap();
  assert_eq!(out.effective, ReactionState::None);
  assert_eq!(out.degraded, vec![Stage::Activity]);
  assert_eq!(out.notification, Some(NotificationSync::Cancelled));
  assert!(inbox_kinds(&e, &alice).await.is_empty());
  assert_eq!(reaction_kinds(&e, &bob).await, vec![ActivityKind::Like]);

  e.store().heal();
  let repaired = e.reconcile(bob_user.user_id, target).await.unwrap();
  assert!(repaired.is_complete());
  assert_eq!(repaired.activity, Some(ActivityChange::Removed));
  assert_eq!(repaired.notification, Some(NotificationSync::Unchanged));
  assert!(reaction_kinds(&e, &bob).await.is_empty());
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn comment_by_another_user_notifies_and_records() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;

  let comment = e.comment(Some(bob.as_str()), post.post_id, "great post").await.unwrap();

  let inbox = e.inbox(Some(alice.as_str())).await.unwrap();
  assert_eq!(inbox.len(), 1);
  assert_eq!(inbox[0].notification.kind, NotificationKind::Comment);
  assert_eq!(inbox[0].actor_username.as_deref(), Some("bob"));
  assert_eq!(inbox[0].comment_body.as_deref(), Some("great post"));

  let feed = e.activity_page(Some(bob.as_str())).await.unwrap();
  assert_eq!(feed.len(), 1);
  assert_eq!(feed[0].activity.kind, ActivityKind::Comment);
  assert!(matches!(
    &feed[0].subject,
    ActivitySubject::Comment { comment: c, .. } if c.comment.comment_id == comment.comment_id
  ));

  let id = inbox[0].notification.notification_id;
  assert_eq!(e.open_notification(Some(alice.as_str()), id).await.unwrap(), post.post_id);
  assert!(!e.has_unread(Some(alice.as_str())).await.unwrap());
}

#[tokio::test]
async fn comment_on_own_post_is_recorded_but_not_notified() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let post = publish(&e, &alice, "Hello").await;

  e.comment(Some(alice.as_str()), post.post_id, "bump").await.unwrap();

  assert!(!e.has_unread(Some(alice.as_str())).await.unwrap());
  let kinds: Vec<_> = e
    .activity_page(Some(alice.as_str()))
    .await
    .unwrap()
    .into_iter()
    .map(|entry| entry.activity.kind)
    .collect();
  assert!(kinds.contains(&ActivityKind::Comment));
  assert!(kinds.contains(&ActivityKind::CreatedPost));
}

#[tokio::test]
async fn blank_comment_rejected_before_any_write() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let post = publish(&e, &alice, "Hello").await;

  let err = e.comment(Some(alice.as_str()), post.post_id, "   ").await.unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));
  let view = e.post_view(None, post.post_id).await.unwrap();
  assert!(view.comments.is_empty());
}

#[tokio::test]
async fn only_the_owner_edits_or_deletes_a_comment() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;
  let comment = e.comment(Some(bob.as_str()), post.post_id, "typo").await.unwrap();

  let err = e
    .edit_comment(Some(alice.as_str()), comment.comment_id, "hijack")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Unauthorized));
  let err = e.delete_comment(Some(alice.as_str()), comment.comment_id).await.unwrap_err();
  assert!(matches!(err, Error::Unauthorized));

  let edited = e
    .edit_comment(Some(bob.as_str()), comment.comment_id, "fixed")
    .await
    .unwrap();
  assert_eq!(edited.body, "fixed");
}

#[tokio::test]
async fn deleting_a_comment_removes_only_its_own_rows() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let (_, carol) = member(&e, "carol").await;
  let post = publish(&e, &alice, "Hello").await;
  let comment = e.comment(Some(bob.as_str()), post.post_id, "hi").await.unwrap();
  e.react(Some(carol.as_str()), Target::Comment(comment.comment_id), "like")
    .await
    .unwrap();
  e.react(Some(carol.as_str()), Target::Post(post.post_id), "like")
    .await
    .unwrap();

  e.delete_comment(Some(bob.as_str()), comment.comment_id).await.unwrap();

  // Bob's comment activity and carol's comment like are gone; carol's post
  // like and its notification survive.
  assert!(e.activity_page(Some(bob.as_str())).await.unwrap().is_empty());
  assert!(e.inbox(Some(bob.as_str())).await.unwrap().is_empty());
  assert_eq!(reaction_kinds(&e, &carol).await, vec![ActivityKind::Like]);
  assert_eq!(inbox_kinds(&e, &alice).await, vec![NotificationKind::Like]);
  assert_eq!(
    e.counts(Target::Post(post.post_id)).await.unwrap(),
    ReactionCounts { likes: 1, dislikes: 0 }
  );
}

// ─── Posts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn post_drafts_are_validated() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;

  let mut bad = draft("Hello");
  bad.categories = vec![];
  assert!(matches!(
    e.create_post(Some(alice.as_str()), bad).await,
    Err(Error::InvalidInput(_))
  ));

  let mut bad = draft("Hello");
  bad.categories = vec!["a".into(), "b".into(), "c".into()];
  assert!(matches!(
    e.create_post(Some(alice.as_str()), bad).await,
    Err(Error::InvalidInput(_))
  ));

  assert!(matches!(
    e.create_post(None, draft("Hello")).await,
    Err(Error::Unauthenticated)
  ));
}

#[tokio::test]
async fn only_the_owner_edits_a_post() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;

  let err = e
    .edit_post(Some(bob.as_str()), post.post_id, draft("Mine now"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Unauthorized));

  let edited = e
    .edit_post(Some(alice.as_str()), post.post_id, draft("Hello, again"))
    .await
    .unwrap();
  assert_eq!(edited.title, "Hello, again");
}

#[tokio::test]
async fn deleting_a_post_cascades_everywhere() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;
  let comment = e.comment(Some(bob.as_str()), post.post_id, "hi").await.unwrap();
  e.react(Some(bob.as_str()), Target::Post(post.post_id), "like").await.unwrap();
  e.react(Some(alice.as_str()), Target::Comment(comment.comment_id), "dislike")
    .await
    .unwrap();

  let err = e.delete_post(Some(bob.as_str()), post.post_id).await.unwrap_err();
  assert!(matches!(err, Error::Unauthorized));

  e.delete_post(Some(alice.as_str()), post.post_id).await.unwrap();

  assert!(matches!(
    e.post_view(None, post.post_id).await,
    Err(Error::NotFound(_))
  ));
  assert!(e.inbox(Some(alice.as_str())).await.unwrap().is_empty());
  assert!(e.inbox(Some(bob.as_str())).await.unwrap().is_empty());
  assert!(e.activity_page(Some(alice.as_str())).await.unwrap().is_empty());
  assert!(e.activity_page(Some(bob.as_str())).await.unwrap().is_empty());
  assert_eq!(
    e.counts(Target::Post(post.post_id)).await.unwrap(),
    ReactionCounts::default()
  );
}

#[tokio::test]
async fn post_view_shows_viewer_reactions() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;
  let comment = e.comment(Some(alice.as_str()), post.post_id, "first").await.unwrap();
  e.react(Some(bob.as_str()), Target::Post(post.post_id), "dislike").await.unwrap();
  e.react(Some(bob.as_str()), Target::Comment(comment.comment_id), "like")
    .await
    .unwrap();

  let anonymous = e.post_view(None, post.post_id).await.unwrap();
  assert_eq!(anonymous.post.viewer_reaction, ReactionState::None);
  assert_eq!(anonymous.post.counts, ReactionCounts { likes: 0, dislikes: 1 });
  assert_eq!(anonymous.comments.len(), 1);

  let as_bob = e.post_view(Some(bob.as_str()), post.post_id).await.unwrap();
  assert_eq!(as_bob.post.viewer_reaction, ReactionState::Dislike);
  assert_eq!(as_bob.comments[0].viewer_reaction, ReactionState::Like);

  // An unknown token reads as anonymous.
  let stranger = e.post_view(Some("not-a-token"), post.post_id).await.unwrap();
  assert_eq!(stranger.post.viewer_reaction, ReactionState::None);
}

#[tokio::test]
async fn liked_posts_follow_reactions() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let post = publish(&e, &alice, "Hello").await;

  e.react(Some(bob.as_str()), Target::Post(post.post_id), "like").await.unwrap();
  let liked = e.liked_posts(Some(bob.as_str())).await.unwrap();
  assert_eq!(liked.len(), 1);

  e.react(Some(bob.as_str()), Target::Post(post.post_id), "like").await.unwrap();
  assert!(e.liked_posts(Some(bob.as_str())).await.unwrap().is_empty());
}

// ─── Views ───────────────────────────────────────────────────────────────────

fn tagged(title: &str, categories: &[&str]) -> PostEdit {
  PostEdit {
    categories: categories.iter().map(|c| c.to_string()).collect(),
    ..draft(title)
  }
}

#[tokio::test]
async fn home_is_open_to_anonymous_viewers() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let first = publish(&e, &alice, "First").await;
  let second = publish(&e, &bob, "Second").await;
  e.react(Some(bob.as_str()), Target::Post(first.post_id), "like").await.unwrap();

  let anonymous = e.home(None).await.unwrap();
  let ids: Vec<_> = anonymous.iter().map(|p| p.post.post_id).collect();
  assert_eq!(ids, vec![second.post_id, first.post_id]);
  assert_eq!(anonymous[1].counts, ReactionCounts { likes: 1, dislikes: 0 });
  assert!(anonymous.iter().all(|p| p.viewer_reaction == ReactionState::None));

  let as_bob = e.home(Some(bob.as_str())).await.unwrap();
  assert_eq!(as_bob[1].viewer_reaction, ReactionState::Like);
  assert_eq!(as_bob[0].viewer_reaction, ReactionState::None);

  // A stale token still gets the page.
  assert_eq!(e.home(Some("not-a-token")).await.unwrap().len(), 2);
}

#[tokio::test]
async fn category_pages_list_tagged_posts() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let rust = e
    .create_post(Some(alice.as_str()), tagged("Rust", &["tech", "lang"]))
    .await
    .unwrap();
  e.create_post(Some(alice.as_str()), tagged("Cake", &["food"]))
    .await
    .unwrap();
  e.react(Some(bob.as_str()), Target::Post(rust.post_id), "dislike")
    .await
    .unwrap();

  let names: Vec<_> = e
    .categories()
    .await
    .unwrap()
    .into_iter()
    .map(|c| (c.name, c.post_count))
    .collect();
  assert_eq!(
    names,
    vec![("food".to_string(), 1), ("lang".to_string(), 1), ("tech".to_string(), 1)]
  );

  let anonymous = e.category_view(None, "tech").await.unwrap();
  assert_eq!(anonymous.len(), 1);
  assert_eq!(anonymous[0].post.post_id, rust.post_id);
  assert_eq!(anonymous[0].viewer_reaction, ReactionState::None);

  let as_bob = e.category_view(Some(bob.as_str()), "lang").await.unwrap();
  assert_eq!(as_bob[0].viewer_reaction, ReactionState::Dislike);
  assert_eq!(as_bob[0].counts, ReactionCounts { likes: 0, dislikes: 1 });

  assert!(matches!(
    e.category_view(None, "music").await,
    Err(Error::NotFound(_))
  ));
}

#[tokio::test]
async fn profile_posts_show_one_author() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let (_, bob) = member(&e, "bob").await;
  let hers = publish(&e, &alice, "Hers").await;
  publish(&e, &bob, "His").await;
  e.react(Some(bob.as_str()), Target::Post(hers.post_id), "like").await.unwrap();

  let anonymous = e.profile_posts(None, "alice").await.unwrap();
  assert_eq!(anonymous.len(), 1);
  assert_eq!(anonymous[0].post.post_id, hers.post_id);
  assert_eq!(anonymous[0].author_username, "alice");
  assert_eq!(anonymous[0].viewer_reaction, ReactionState::None);

  let as_bob = e.profile_posts(Some(bob.as_str()), "alice").await.unwrap();
  assert_eq!(as_bob[0].viewer_reaction, ReactionState::Like);

  assert!(matches!(
    e.profile_posts(None, "nobody").await,
    Err(Error::NotFound(_))
  ));
}

// ─── Activity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn activity_page_backfills_post_creation() {
  let e = engine().await;
  let (alice_user, alice) = member(&e, "alice").await;

  // Written straight to the store, bypassing the orchestrator.
  e.store()
    .create_post(agora_core::content::NewPost {
      owner_id:   alice_user.user_id,
      title:      "Imported".into(),
      body:       "body".into(),
      image:      None,
      categories: vec!["archive".into()],
    })
    .await
    .unwrap();

  let feed = e.activity_page(Some(alice.as_str())).await.unwrap();
  assert_eq!(feed.len(), 1);
  assert_eq!(feed[0].activity.kind, ActivityKind::CreatedPost);
  assert!(matches!(&feed[0].subject, ActivitySubject::Post(p) if p.post.title == "Imported"));

  // A second visit adds nothing.
  assert_eq!(e.activity_page(Some(alice.as_str())).await.unwrap().len(), 1);
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymous_can_read_but_not_mutate() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  let post = publish(&e, &alice, "Hello").await;

  assert!(e.post_view(None, post.post_id).await.is_ok());
  assert!(matches!(
    e.react(None, Target::Post(post.post_id), "like").await,
    Err(Error::Unauthenticated)
  ));
  assert!(matches!(
    e.react(Some("forged"), Target::Post(post.post_id), "like").await,
    Err(Error::Unauthenticated)
  ));
  assert!(matches!(
    e.comment(None, post.post_id, "hi").await,
    Err(Error::Unauthenticated)
  ));
  assert!(matches!(e.inbox(None).await, Err(Error::Unauthenticated)));
}

#[tokio::test]
async fn expired_sessions_fail_resolution() {
  let e = engine_with(EngineConfig { session_ttl: Duration::seconds(-1) }).await;
  let (_, token) = member(&e, "alice").await;

  assert!(matches!(
    e.identity().resolve(&token).await,
    Err(Error::SessionExpired)
  ));
  assert!(matches!(
    e.identity().require(Some(token.as_str())).await,
    Err(Error::Unauthenticated)
  ));
  assert_eq!(e.identity().user_identity_of(Some(token.as_str())).await.unwrap(), None);
  assert!(matches!(
    e.identity().resolve("unknown").await,
    Err(Error::SessionNotFound)
  ));
  assert_eq!(e.identity().purge_expired_sessions().await.unwrap(), 1);
}

#[tokio::test]
async fn register_login_logout() {
  let e = engine().await;
  let user = e
    .identity()
    .register("dana", "dana@example.com", "hunter2hunter2")
    .await
    .unwrap();
  assert!(user.password_hash.is_some());

  let err = e
    .identity()
    .register("dana", "other@example.com", "hunter2hunter2")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));
  let err = e
    .identity()
    .register("erin", "erin@example.com", "short")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));

  let err = e.identity().login("dana", "wrong password").await.unwrap_err();
  assert!(matches!(err, Error::InvalidCredentials));

  let grant = e.identity().login("dana", "hunter2hunter2").await.unwrap();
  let me = e.identity().resolve(&grant.token).await.unwrap();
  assert_eq!(me.user_id, user.user_id);
  assert_eq!(e.identity().username_of(user.user_id).await.unwrap(), "dana");

  assert!(e.identity().logout(&grant.token).await.unwrap());
  assert!(matches!(
    e.identity().resolve(&grant.token).await,
    Err(Error::SessionNotFound)
  ));
}

#[tokio::test]
async fn verified_login_reuses_the_account() {
  let e = engine().await;
  let first = e
    .identity()
    .login_verified("frank", "frank@example.com")
    .await
    .unwrap();
  let second = e
    .identity()
    .login_verified("ignored", "frank@example.com")
    .await
    .unwrap();
  assert_eq!(first.user.user_id, second.user.user_id);
  assert_ne!(first.token, second.token);

  // No password was ever set.
  let err = e.identity().login("frank", "anything-at-all").await.unwrap_err();
  assert!(matches!(err, Error::InvalidCredentials));
}

#[tokio::test]
async fn profile_edit_rejects_taken_username() {
  let e = engine().await;
  let (_, alice) = member(&e, "alice").await;
  member(&e, "bob").await;

  let err = e
    .identity()
    .edit_profile(Some(alice.as_str()), "bob", None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));

  let user = e
    .identity()
    .edit_profile(Some(alice.as_str()), "alicia", Some("a.png".into()))
    .await
    .unwrap();
  assert_eq!(user.username, "alicia");
  let me = e.identity().resolve(&alice).await.unwrap();
  assert_eq!(me.username, "alicia");
}
