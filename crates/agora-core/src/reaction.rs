//! The three-state reaction model.
//!
//! A user holds at most one reaction per target. The stored value is a
//! [`ReactionKind`]; the absence of a stored value is [`ReactionState::None`].
//! There is no way to express "liked and disliked" at the same time.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Actions ─────────────────────────────────────────────────────────────────

/// What a user can ask for: a like or a dislike. There is no "none" action;
/// retracting is done by repeating the current action.
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
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReactionKind {
  Like,
  Dislike,
}

impl ReactionKind {
  pub fn opposite(self) -> Self {
    match self {
      Self::Like => Self::Dislike,
      Self::Dislike => Self::Like,
    }
  }
}

/// Parses a raw request value. Only `like` and `dislike` are accepted;
/// `none` is rejected like any other string.
impl FromStr for ReactionKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "like" => Ok(Self::Like),
      "dislike" => Ok(Self::Dislike),
      other => Err(Error::InvalidAction(other.to_owned())),
    }
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// The effective reaction a user holds on a target.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReactionState {
  #[default]
  None,
  Like,
  Dislike,
}

impl ReactionState {
  /// Apply a requested action: repeating the current action clears it,
  /// anything else switches to the requested action.
  pub fn toggled(self, desired: ReactionKind) -> Self {
    if self == Self::from(desired) {
      Self::None
    } else {
      Self::from(desired)
    }
  }

  /// The stored value, or `None` when no row should exist.
  pub fn kind(self) -> Option<ReactionKind> {
    match self {
      Self::None => None,
      Self::Like => Some(ReactionKind::Like),
      Self::Dislike => Some(ReactionKind::Dislike),
    }
  }

  pub fn is_none(self) -> bool { matches!(self, Self::None) }
}

impl From<ReactionKind> for ReactionState {
  fn from(kind: ReactionKind) -> Self {
    match kind {
      ReactionKind::Like => Self::Like,
      ReactionKind::Dislike => Self::Dislike,
    }
  }
}

impl From<Option<ReactionKind>> for ReactionState {
  fn from(kind: Option<ReactionKind>) -> Self {
    kind.map(Self::from).unwrap_or_default()
  }
}

impl fmt::Display for ReactionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::None => "none",
      Self::Like => "like",
      Self::Dislike => "dislike",
    })
  }
}

// ─── Targets ─────────────────────────────────────────────────────────────────

/// The subject of a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Target {
  Post(Uuid),
  Comment(Uuid),
}

impl Target {
  pub fn id(self) -> Uuid {
    match self {
      Self::Post(id) | Self::Comment(id) => id,
    }
  }

  /// The comment when there is one, otherwise the post.
  pub fn within(post_id: Uuid, comment_id: Option<Uuid>) -> Self {
    comment_id.map_or(Self::Post(post_id), Self::Comment)
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Post(id) => write!(f, "post {id}"),
      Self::Comment(id) => write!(f, "comment {id}"),
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A stored reaction row. Only non-`none` states are ever persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
  pub target:     Target,
  pub user_id:    Uuid,
  pub kind:       ReactionKind,
  pub updated_at: DateTime<Utc>,
}

/// The result of [`crate::store::ForumStore::set_reaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTransition {
  pub previous:  ReactionState,
  pub effective: ReactionState,
}

impl ReactionTransition {
  pub fn new(previous: ReactionState, desired: ReactionKind) -> Self {
    Self { previous, effective: previous.toggled(desired) }
  }
}

/// Aggregate counts, always recomputed from stored rows.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct ReactionCounts {
  pub likes:    u64,
  pub dislikes: u64,
}
