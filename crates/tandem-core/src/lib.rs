//! Core types and trait definitions for Tandem messaging and matching.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The store backend, the server, and the terminal client all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod chat;
pub mod edge;
pub mod error;
pub mod message;
pub mod store;
pub mod timeline;
pub mod user;

pub use error::{Error, Result};
