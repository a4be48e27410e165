//! Error types for `agora-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A reaction request carried something other than `like` or `dislike`.
  #[error("invalid reaction action: {0:?}")]
  InvalidAction(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("unknown {column} discriminant: {value:?}")]
  UnknownDiscriminant {
    column: &'static str,
    value:  String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
