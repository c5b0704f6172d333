//! # forum-shared
//!
//! Vocabulary and primitives shared by the forum store and server:
//! the status-kind enumeration, agent credential hashing, admin session
//! tokens and small text helpers.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod text;
pub mod types;

pub use error::{CredentialError, ForumError};
pub use types::{StatusKind, TargetKind};
