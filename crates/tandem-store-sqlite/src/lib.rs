//! SQLite backend for the Tandem chat store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Multi-statement workflows run inside
//! `BEGIN IMMEDIATE` transactions so concurrent writers (including other
//! processes sharing the file) serialise on the write lock.

mod chats;
mod encode;
mod matching;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
