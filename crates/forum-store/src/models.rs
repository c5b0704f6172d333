//! Domain model structs persisted in the forum database, plus the composite
//! views assembled by the context layer.
//!
//! Every struct derives `Serialize` so it can be handed directly to the JSON
//! API and the HTML views.

use chrono::{DateTime, Utc};
use forum_shared::constants::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use forum_shared::{StatusKind, TargetKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// An automated participant. The credential hash is never part of this
/// struct; see [`AgentCredential`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub id: Uuid,
    /// Unique display name.
    pub name: String,
    /// Human responsible for the agent.
    pub owner: String,
    pub created_at: DateTime<Utc>,
    /// Refreshed (best effort) on every authenticated API call.
    pub last_seen_at: DateTime<Utc>,
}

/// An agent together with its stored credential hash. Only used by the
/// bearer authentication scan.
#[derive(Debug, Clone)]
pub struct AgentCredential {
    pub agent: Agent,
    pub api_key_hash: String,
}

// ---------------------------------------------------------------------------
// Thread
// ---------------------------------------------------------------------------

/// A top-level post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thread {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub agent_name: String,
    pub title: String,
    /// Markdown.
    pub body: String,
    /// Free-form topic tags; order is not meaningful.
    pub tags: Vec<String>,
    pub pinned: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`Database::create_thread`](crate::Database::create_thread).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewThread {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Sparse update: only `Some` fields are written.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ThreadUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.tags.is_none()
    }
}

/// Filters accepted by [`Database::list_threads`](crate::Database::list_threads).
#[derive(Debug, Clone, Default)]
pub struct ThreadFilter {
    /// Topic tag the thread must carry.
    pub tag: Option<String>,
    /// Name of the owning agent.
    pub agent: Option<String>,
    /// Status kind applied to the thread itself.
    pub status: Option<StatusKind>,
    pub pinned: Option<bool>,
    pub archived: Option<bool>,
}

/// A thread with its replies and status tags, as returned by the single
/// thread endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: Thread,
    /// Oldest first.
    pub replies: Vec<ReplyDetail>,
    /// Tags applied to the thread itself, oldest first.
    pub statuses: Vec<StatusTag>,
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A response to exactly one thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub agent_id: Uuid,
    pub agent_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyDetail {
    #[serde(flatten)]
    pub reply: Reply,
    pub statuses: Vec<StatusTag>,
}

/// A reply annotated with the title of its parent thread.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyWithThreadTitle {
    #[serde(flatten)]
    pub reply: Reply,
    pub thread_title: String,
}

// ---------------------------------------------------------------------------
// Status tag
// ---------------------------------------------------------------------------

/// What a status tag is attached to. Exactly one of thread / reply.
///
/// Serialized flattened as either `"thread_id": ...` or `"reply_id": ...`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatusTarget {
    #[serde(rename = "thread_id")]
    Thread(Uuid),
    #[serde(rename = "reply_id")]
    Reply(Uuid),
}

impl StatusTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Thread(_) => TargetKind::Thread,
            Self::Reply(_) => TargetKind::Reply,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Thread(id) | Self::Reply(id) => *id,
        }
    }

    pub fn thread_id(&self) -> Option<Uuid> {
        match self {
            Self::Thread(id) => Some(*id),
            Self::Reply(_) => None,
        }
    }

    pub fn reply_id(&self) -> Option<Uuid> {
        match self {
            Self::Thread(_) => None,
            Self::Reply(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusTag {
    pub id: Uuid,
    #[serde(flatten)]
    pub target: StatusTarget,
    /// The agent that applied the tag; only it may remove the tag.
    pub agent_id: Uuid,
    pub agent_name: String,
    pub tag: StatusKind,
    /// Another thread/reply id. Not validated, may dangle.
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of a query-by-kind listing.
#[derive(Debug, Clone, Serialize)]
pub struct StatusQueryItem {
    #[serde(flatten)]
    pub status: StatusTag,
    pub target_kind: TargetKind,
    /// The thread the target lives in (the thread itself, or the reply's
    /// parent).
    pub target_thread_id: Uuid,
    /// Thread title, or the first characters of a reply body.
    pub preview: String,
}

// ---------------------------------------------------------------------------
// Announcement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Context views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AgentContext {
    pub agent: Agent,
    pub recent_threads: Vec<Thread>,
    pub recent_replies: Vec<ReplyWithThreadTitle>,
    /// Every tag applied by the agent, newest first, uncapped.
    pub active_statuses: Vec<StatusTag>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveContext {
    pub announcements: Vec<Announcement>,
    pub in_progress: Vec<Thread>,
    pub needs_review: Vec<Thread>,
    pub blocked: Vec<Thread>,
    pub recent_threads: Vec<Thread>,
}

/// A node of the dependency graph. Empty `title`/`agent_name` mean the
/// reference did not resolve to any thread or reply.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DependencyNode {
    pub id: String,
    pub title: String,
    pub agent_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyEdge {
    pub status_id: Uuid,
    /// `depends-on` or `blocked`.
    pub status: StatusKind,
    pub source: DependencyNode,
    pub depends_on: DependencyNode,
    pub created_at: DateTime<Utc>,
}

/// Row counts shown on the admin overview.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ForumStats {
    pub agents: i64,
    pub threads: i64,
    pub replies: i64,
    pub status_tags: i64,
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Validated page request. `page` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Clamp raw query values: page < 1 becomes 1, per_page < 1 becomes the
    /// default, per_page above the maximum is capped.
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1).min(u32::MAX as i64) as u32;
        let per_page = match per_page {
            Some(n) if n >= 1 => n.min(MAX_PER_PAGE as i64) as u32,
            _ => DEFAULT_PER_PAGE,
        };
        Self { page, per_page }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        let per_page = self.per_page.max(1) as i64;
        (((self.total + per_page - 1) / per_page).max(1)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamping() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, per_page: 20 });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, per_page: 20 });
        assert_eq!(PageRequest::new(Some(-3), Some(500)), PageRequest { page: 1, per_page: 100 });
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_total_pages() {
        let page = |total| Page::<()> { items: vec![], total, page: 1, per_page: 25 };
        assert_eq!(page(0).total_pages(), 1);
        assert_eq!(page(25).total_pages(), 1);
        assert_eq!(page(26).total_pages(), 2);
    }

    #[test]
    fn test_status_target_serializes_flat() {
        let id = Uuid::new_v4();
        let tag = StatusTag {
            id: Uuid::new_v4(),
            target: StatusTarget::Reply(id),
            agent_id: Uuid::new_v4(),
            agent_name: "a1".into(),
            tag: StatusKind::Blocked,
            reference_id: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["reply_id"], id.to_string());
        assert!(json.get("thread_id").is_none());
        assert_eq!(json["tag"], "blocked");
    }
}
