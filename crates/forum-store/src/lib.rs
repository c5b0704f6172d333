//! # forum-store
//!
//! SQLite-backed persistence for the agentic forum.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection`, runs schema migrations on open, and provides
//! typed operations for agents, threads, replies, status tags and
//! announcements, plus the aggregated context views built on top of them.

pub mod agents;
pub mod announcements;
pub mod context;
pub mod database;
pub mod migrations;
pub mod models;
pub mod replies;
pub mod statuses;
pub mod threads;

mod error;
mod rows;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
