//! SQL schema for the Agora SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema version; future migrations will be gated on it.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT,                 -- argon2 PHC string; NULL for external logins
    avatar        TEXT,
    role          TEXT NOT NULL DEFAULT 'user'
                  CHECK (role IN ('user', 'moderator', 'admin')),
    created_at    TEXT NOT NULL
);

-- Only the SHA-256 digest of a session token is stored.
CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    created_at   TEXT NOT NULL,
    expires_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS posts (
    post_id    TEXT PRIMARY KEY,
    owner_id   TEXT NOT NULL REFERENCES users(user_id),
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    image      TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    category_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS post_categories (
    post_id     TEXT    NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
    category_id TEXT    NOT NULL REFERENCES categories(category_id),
    position    INTEGER NOT NULL,
    PRIMARY KEY (post_id, category_id)
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id TEXT PRIMARY KEY,
    post_id    TEXT NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
    owner_id   TEXT NOT NULL REFERENCES users(user_id),
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- One row per (target, user). A cleared reaction is the absence of a row.
CREATE TABLE IF NOT EXISTS post_reactions (
    post_id    TEXT NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    kind       TEXT NOT NULL CHECK (kind IN ('like', 'dislike')),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (post_id, user_id)
);

CREATE TABLE IF NOT EXISTS comment_reactions (
    comment_id TEXT NOT NULL REFERENCES comments(comment_id) ON DELETE CASCADE,
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    kind       TEXT NOT NULL CHECK (kind IN ('like', 'dislike')),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (comment_id, user_id)
);

-- Comment notifications carry no post_id; they reach the post through
-- the comment.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    recipient_id    TEXT NOT NULL REFERENCES users(user_id),
    actor_id        TEXT NOT NULL REFERENCES users(user_id),
    post_id         TEXT REFERENCES posts(post_id) ON DELETE CASCADE,
    comment_id      TEXT REFERENCES comments(comment_id) ON DELETE CASCADE,
    kind            TEXT NOT NULL CHECK (kind IN ('like', 'dislike', 'comment')),
    is_read         INTEGER NOT NULL DEFAULT 0 CHECK (is_read IN (0, 1)),
    created_at      TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS notifications_unread_cause_idx
    ON notifications (recipient_id, actor_id, COALESCE(post_id, ''),
                      COALESCE(comment_id, ''), kind)
    WHERE is_read = 0;

CREATE TABLE IF NOT EXISTS activity (
    activity_id TEXT PRIMARY KEY,
    actor_id    TEXT NOT NULL REFERENCES users(user_id),
    kind        TEXT NOT NULL
                CHECK (kind IN ('CreatedPost', 'comment', 'like', 'dislike')),
    post_id     TEXT REFERENCES posts(post_id) ON DELETE CASCADE,
    comment_id  TEXT REFERENCES comments(comment_id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS activity_cause_idx
    ON activity (actor_id, kind, COALESCE(post_id, ''), COALESCE(comment_id, ''));

-- At most one like/dislike row per (actor, target), whatever its type.
CREATE UNIQUE INDEX IF NOT EXISTS activity_reaction_idx
    ON activity (actor_id, COALESCE(post_id, ''), COALESCE(comment_id, ''))
    WHERE kind IN ('like', 'dislike');

CREATE INDEX IF NOT EXISTS posts_owner_idx              ON posts(owner_id);
CREATE INDEX IF NOT EXISTS comments_post_idx            ON comments(post_id);
CREATE INDEX IF NOT EXISTS notifications_recipient_idx  ON notifications(recipient_id, is_read);
CREATE INDEX IF NOT EXISTS activity_actor_idx           ON activity(actor_id, created_at);
CREATE INDEX IF NOT EXISTS activity_post_idx            ON activity(post_id);

PRAGMA user_version = 1;
";
