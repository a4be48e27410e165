//! The Agora engagement engine.
//!
//! [`IdentityResolver`] turns session tokens into identities; [`Engine`]
//! sequences every user action against a [`agora_core::store::ForumStore`]
//! so reactions, notifications and activity stay consistent.

pub mod credentials;
pub mod engine;
pub mod error;
pub mod identity;

pub use engine::{Engagement, Engine, EngineConfig, Stage};
pub use error::{Error, Result};
pub use identity::{IdentityResolver, SessionGrant};

#[cfg(test)]
mod tests;
