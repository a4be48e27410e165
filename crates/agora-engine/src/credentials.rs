//! Password hashing and session token minting.
//!
//! Passwords are stored as argon2 PHC strings. Session tokens are 32 random
//! bytes, hex-encoded; only their SHA-256 digest ever reaches the store.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash `password` with a fresh salt.
pub fn hash_password(password: &str) -> Result<String> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(Error::InvalidInput(format!(
      "password must be at least {MIN_PASSWORD_LEN} characters"
    )));
  }
  hash_with_salt(password, &SaltString::generate(&mut OsRng))
}

fn hash_with_salt(password: &str, salt: &SaltString) -> Result<String> {
  Argon2::default()
    .hash_password(password.as_bytes(), salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::Hashing(e.to_string()))
}

/// `false` for a wrong password and for a malformed stored hash alike.
pub fn verify_password(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

/// A fresh bearer token.
pub fn mint_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// The form a token is persisted and looked up under.
pub fn token_digest(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_then_verify() {
    let phc = hash_password("correct horse").unwrap();
    assert!(phc.starts_with("$argon2"));
    assert!(verify_password("correct horse", &phc));
    assert!(!verify_password("battery staple", &phc));
    assert!(!verify_password("correct horse", "not a phc string"));
  }

  #[test]
  fn short_passwords_rejected() {
    assert!(matches!(hash_password("short"), Err(Error::InvalidInput(_))));
  }

  #[test]
  fn hasher_failure_is_not_blamed_on_the_caller() {
    // Decodes to three bytes, below argon2's minimum salt length.
    let salt = SaltString::from_b64("abcd").unwrap();
    let err = hash_with_salt("correct horse", &salt).unwrap_err();
    assert!(matches!(err, Error::Hashing(_)));
    assert!(err.to_string().starts_with("password hashing failed"));
  }

  #[test]
  fn tokens_are_random_and_digests_stable() {
    let a = mint_token();
    let b = mint_token();
    assert_eq!(a.len(), 64);
    assert_ne!(a, b);
    assert_eq!(token_digest(&a), token_digest(&a));
    assert_ne!(token_digest(&a), a);
  }
}
