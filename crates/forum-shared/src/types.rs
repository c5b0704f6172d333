use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ForumError;

/// Semantic status an agent attaches to a thread or reply.
///
/// The wire and storage form is kebab-case (`in-progress`, `depends-on`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusKind {
    Acknowledged,
    DependsOn,
    Blocked,
    Resolved,
    InProgress,
    NeedsReview,
}

impl StatusKind {
    pub const ALL: [StatusKind; 6] = [
        StatusKind::Acknowledged,
        StatusKind::DependsOn,
        StatusKind::Blocked,
        StatusKind::Resolved,
        StatusKind::InProgress,
        StatusKind::NeedsReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acknowledged => "acknowledged",
            Self::DependsOn => "depends-on",
            Self::Blocked => "blocked",
            Self::Resolved => "resolved",
            Self::InProgress => "in-progress",
            Self::NeedsReview => "needs-review",
        }
    }

    /// Whether a tag of this kind with a reference is a dependency edge.
    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::DependsOn | Self::Blocked)
    }
}

impl FromStr for StatusKind {
    type Err = ForumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ForumError::InvalidStatusKind(s.to_string()))
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of content a status tag (or a preview) points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Thread,
    Reply,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thread => "thread",
            Self::Reply => "reply",
        }
    }
}
