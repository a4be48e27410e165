//! SQLite backend for the Agora forum store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every read-modify-write runs inside a
//! `BEGIN IMMEDIATE` transaction, and the uniqueness rules of the data model
//! are backed by unique indexes.

mod activity;
mod content;
mod encode;
mod notifications;
mod reactions;
mod schema;
mod store;
mod users;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
