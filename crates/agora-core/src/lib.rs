//! Core types and trait definitions for the Agora forum engine.
//!
//! This crate is deliberately free of database and I/O dependencies. It holds
//! the domain records, the pure transition rules that keep reactions,
//! notifications and activity consistent, and the [`store::ForumStore`]
//! abstraction every backend implements.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod activity;
pub mod content;
pub mod error;
pub mod notification;
pub mod reaction;
pub mod session;
pub mod store;
pub mod user;

pub use error::{Error, Result};
