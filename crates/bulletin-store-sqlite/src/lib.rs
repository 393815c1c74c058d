//! SQLite backend for the Bulletin subscriber store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Uniqueness of emails and tokens is left
//! to the schema's `UNIQUE` constraints; a violation surfaces as
//! [`Error::Conflict`].

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
