//! Posts and comments, plus the read models built around them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  reaction::{ReactionCounts, ReactionState},
};

/// A post carries at least one and at most this many category tags.
pub const MAX_CATEGORIES: usize = 2;

// ─── Posts ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
  pub post_id:    Uuid,
  pub owner_id:   Uuid,
  pub title:      String,
  pub body:       String,
  /// Reference to an uploaded image; storage of the file itself is external.
  pub image:      Option<String>,
  pub categories: Vec<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::ForumStore::create_post`].
#[derive(Debug, Clone)]
pub struct NewPost {
  pub owner_id:   Uuid,
  pub title:      String,
  pub body:       String,
  pub image:      Option<String>,
  pub categories: Vec<String>,
}

impl NewPost {
  pub fn validate(&self) -> Result<()> {
    validate_post_fields(&self.title, &self.body, &self.categories)
  }
}

/// Owner-initiated replacement of a post's editable fields.
#[derive(Debug, Clone)]
pub struct PostEdit {
  pub title:      String,
  pub body:       String,
  pub image:      Option<String>,
  pub categories: Vec<String>,
}

impl PostEdit {
  pub fn validate(&self) -> Result<()> {
    validate_post_fields(&self.title, &self.body, &self.categories)
  }
}

fn validate_post_fields(
  title: &str,
  body: &str,
  categories: &[String],
) -> Result<()> {
  if title.trim().is_empty() {
    return Err(Error::InvalidInput("post title must not be empty".into()));
  }
  if body.trim().is_empty() {
    return Err(Error::InvalidInput("post body must not be empty".into()));
  }
  if categories.is_empty() || categories.len() > MAX_CATEGORIES {
    return Err(Error::InvalidInput(format!(
      "a post needs 1 to {MAX_CATEGORIES} categories, got {}",
      categories.len()
    )));
  }
  if categories.iter().any(|c| c.trim().is_empty()) {
    return Err(Error::InvalidInput("category names must not be empty".into()));
  }
  if categories.len() == 2 && categories[0].trim() == categories[1].trim() {
    return Err(Error::InvalidInput(format!(
      "duplicate category {:?}",
      categories[0]
    )));
  }
  Ok(())
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id: Uuid,
  pub post_id:    Uuid,
  pub owner_id:   Uuid,
  pub body:       String,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::ForumStore::create_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
  pub post_id:  Uuid,
  pub owner_id: Uuid,
  pub body:     String,
}

impl NewComment {
  pub fn validate(&self) -> Result<()> { validate_comment_body(&self.body) }
}

pub fn validate_comment_body(body: &str) -> Result<()> {
  if body.trim().is_empty() {
    return Err(Error::InvalidInput("comment must not be empty".into()));
  }
  Ok(())
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// A post as seen by a particular viewer, with live counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSnapshot {
  pub post:            Post,
  pub author_username: String,
  pub counts:          ReactionCounts,
  /// The viewer's own reaction; `None` for anonymous viewers.
  pub viewer_reaction: ReactionState,
}

/// A comment as seen by a particular viewer, with live counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentSnapshot {
  pub comment:         Comment,
  pub author_username: String,
  pub counts:          ReactionCounts,
  pub viewer_reaction: ReactionState,
}

/// A category with the number of posts tagged with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
  pub name:       String,
  pub post_count: u64,
}

/// A post page: the post plus its comments, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
  pub post:     PostSnapshot,
  pub comments: Vec<CommentSnapshot>,
}
