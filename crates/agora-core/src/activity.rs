//! The activity ledger: a per-user feed of things they did.
//!
//! Rows are only ever inserted, re-typed (like ⇄ dislike) or removed. A
//! like/dislike row mirrors the actor's effective reaction on the target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  content::{CommentSnapshot, PostSnapshot},
  reaction::{ReactionKind, ReactionState},
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::IntoStaticStr,
  strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
  #[strum(serialize = "CreatedPost")]
  #[serde(rename = "CreatedPost")]
  CreatedPost,
  Comment,
  Like,
  Dislike,
}

impl From<ReactionKind> for ActivityKind {
  fn from(kind: ReactionKind) -> Self {
    match kind {
      ReactionKind::Like => Self::Like,
      ReactionKind::Dislike => Self::Dislike,
    }
  }
}

impl ActivityKind {
  pub fn reaction(self) -> Option<ReactionKind> {
    match self {
      Self::Like => Some(ReactionKind::Like),
      Self::Dislike => Some(ReactionKind::Dislike),
      Self::CreatedPost | Self::Comment => None,
    }
  }
}

/// A stored ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
  pub activity_id: Uuid,
  pub actor_id:    Uuid,
  pub kind:        ActivityKind,
  pub post_id:     Option<Uuid>,
  pub comment_id:  Option<Uuid>,
  pub created_at:  DateTime<Utc>,
}

// ─── Reaction mirroring ──────────────────────────────────────────────────────

/// The single write that makes the like/dislike row for (actor, post,
/// comment) match an effective reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", content = "kind", rename_all = "snake_case")]
pub enum ActivityChange {
  Inserted(ReactionKind),
  Retyped(ReactionKind),
  Removed,
  Unchanged,
}

impl ActivityChange {
  /// `existing` is the like/dislike row currently stored for the key.
  pub fn plan(existing: Option<ReactionKind>, effective: ReactionState) -> Self {
    match (existing, effective.kind()) {
      (None, None) => Self::Unchanged,
      (Some(_), None) => Self::Removed,
      (None, Some(kind)) => Self::Inserted(kind),
      (Some(old), Some(new)) if old == new => Self::Unchanged,
      (Some(_), Some(new)) => Self::Retyped(new),
    }
  }
}

// ─── Feed ────────────────────────────────────────────────────────────────────

/// What a ledger row points at, resolved against live data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivitySubject {
  Post(PostSnapshot),
  Comment {
    comment: CommentSnapshot,
    post:    PostSnapshot,
  },
}

/// One resolved feed entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
  pub activity: Activity,
  pub subject:  ActivitySubject,
}
