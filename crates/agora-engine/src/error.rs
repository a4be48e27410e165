//! Error taxonomy surfaced to request handlers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A mutating action arrived without a usable session.
  #[error("authentication required")]
  Unauthenticated,

  #[error("session not found")]
  SessionNotFound,

  #[error("session expired")]
  SessionExpired,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid reaction action: {0:?}")]
  InvalidAction(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("invalid username or password")]
  InvalidCredentials,

  #[error("conflict: {0}")]
  Conflict(String),

  /// The caller is authenticated but does not own the resource.
  #[error("not allowed")]
  Unauthorized,

  /// The password hasher rejected its input. Not the caller's fault.
  #[error("password hashing failed: {0}")]
  Hashing(String),

  /// The backend failed. The message stays generic; the backend error is
  /// available through `source()`.
  #[error("storage failure")]
  StorageFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn storage<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::StorageFailure(Box::new(err))
  }
}

impl From<agora_core::Error> for Error {
  fn from(err: agora_core::Error) -> Self {
    match err {
      agora_core::Error::InvalidAction(action) => Self::InvalidAction(action),
      agora_core::Error::InvalidInput(msg) => Self::InvalidInput(msg),
      other @ agora_core::Error::UnknownDiscriminant { .. } => Self::storage(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use std::error::Error as _;

  use super::*;

  #[test]
  fn storage_failure_hides_backend_detail() {
    let inner = std::io::Error::other("disk on fire");
    let err = Error::storage(inner);
    assert_eq!(err.to_string(), "storage failure");
    assert_eq!(err.source().unwrap().to_string(), "disk on fire");
  }

  #[test]
  fn core_errors_map_onto_the_taxonomy() {
    let err: Error = agora_core::Error::InvalidAction("none".into()).into();
    assert!(matches!(err, Error::InvalidAction(a) if a == "none"));
    let err: Error = agora_core::Error::InvalidInput("x".into()).into();
    assert!(matches!(err, Error::InvalidInput(_)));
  }
}
