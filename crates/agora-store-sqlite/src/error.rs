//! Error type for `agora-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] agora_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("username already taken: {0}")]
  UsernameTaken(String),

  #[error("email already registered: {0}")]
  EmailTaken(String),

  /// A write referenced a row that does not exist (or was deleted
  /// concurrently).
  #[error("referenced row missing: {0}")]
  MissingReference(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
