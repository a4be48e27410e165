//! Notifications and the rules that keep them in step with reactions.
//!
//! A notification exists for a reaction exactly while the reaction that
//! caused it is in effect. The rules are expressed as a pure plan
//! ([`NotificationPlan`]) so a backend can evaluate and apply them inside a
//! single transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reaction::{ReactionKind, ReactionState, Target};

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
  Like,
  Dislike,
  Comment,
}

impl From<ReactionKind> for NotificationKind {
  fn from(kind: ReactionKind) -> Self {
    match kind {
      ReactionKind::Like => Self::Like,
      ReactionKind::Dislike => Self::Dislike,
    }
  }
}

impl NotificationKind {
  pub fn reaction(self) -> Option<ReactionKind> {
    match self {
      Self::Like => Some(ReactionKind::Like),
      Self::Dislike => Some(ReactionKind::Dislike),
      Self::Comment => None,
    }
  }
}

/// A stored notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  /// The owner of the target; the user whose inbox this lands in.
  pub recipient_id:    Uuid,
  /// The user whose action triggered it.
  pub actor_id:        Uuid,
  pub post_id:         Option<Uuid>,
  pub comment_id:      Option<Uuid>,
  pub kind:            NotificationKind,
  pub read:            bool,
  pub created_at:      DateTime<Utc>,
}

/// A notification joined with what an inbox needs to render it. The joined
/// fields are `None` when the referenced row has since disappeared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationView {
  pub notification:   Notification,
  pub actor_username: Option<String>,
  pub post_title:     Option<String>,
  pub comment_body:   Option<String>,
}

// ─── Reaction synchronisation ────────────────────────────────────────────────

/// Identifies the (recipient, actor, target) a reaction notification belongs
/// to. For comment reactions `post_id` is the comment's parent post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCause {
  pub recipient_id: Uuid,
  pub actor_id:     Uuid,
  pub post_id:      Uuid,
  pub comment_id:   Option<Uuid>,
}

impl ReactionCause {
  pub fn is_self_reaction(&self) -> bool { self.recipient_id == self.actor_id }

  /// The reaction this cause mirrors.
  pub fn target(&self) -> Target { Target::within(self.post_id, self.comment_id) }
}

/// The writes needed to bring the notifications for one cause in line with
/// an effective reaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationPlan {
  pub delete: Vec<ReactionKind>,
  pub insert: Option<ReactionKind>,
}

impl NotificationPlan {
  /// `existing` lists the like/dislike notifications currently stored for
  /// the cause.
  pub fn for_reaction(existing: &[ReactionKind], effective: ReactionState) -> Self {
    match effective.kind() {
      None => Self { delete: existing.to_vec(), insert: None },
      Some(kind) => Self {
        delete: existing
          .iter()
          .copied()
          .filter(|k| *k == kind.opposite())
          .collect(),
        insert: (!existing.contains(&kind)).then_some(kind),
      },
    }
  }

  pub fn is_empty(&self) -> bool { self.delete.is_empty() && self.insert.is_none() }

  /// Summarise what applying this plan does.
  pub fn outcome(&self) -> NotificationSync {
    match (self.insert, self.delete.is_empty()) {
      (Some(kind), _) => NotificationSync::Created(kind.into()),
      (None, false) => NotificationSync::Cancelled,
      (None, true) => NotificationSync::Unchanged,
    }
  }
}

/// What a synchronisation did to the recipient's inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "kind", rename_all = "snake_case")]
pub enum NotificationSync {
  /// Actor and recipient are the same user; nothing was touched.
  Suppressed,
  /// A notification of this kind now exists where it did not before.
  Created(NotificationKind),
  /// Existing notifications were removed and nothing replaced them.
  Cancelled,
  Unchanged,
}
