//! Read-only composite views: per-agent activity, the active-work snapshot
//! and the dependency graph.

use std::str::FromStr;

use forum_shared::constants::ACTIVE_RECENT_LIMIT;
use forum_shared::StatusKind;
use rusqlite::{params, params_from_iter};
use rusqlite::types::Type;
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::{
    ActiveContext, AgentContext, DependencyEdge, DependencyNode, ForumStats, Thread,
};
use crate::rows::{collect, ts_at, uuid_at};
use crate::threads::{row_to_thread, THREAD_SELECT};

/// Tags with both ends resolved to a thread. A tag on a reply (or a
/// reference to a reply) resolves to the reply's parent thread. Callers add
/// the WHERE clause.
const DEPENDENCY_SELECT: &str = "SELECT s.id, s.tag,
        COALESCE(s.thread_id, s.reply_id),
        COALESCE(src_t.title, src_rt.title, ''),
        COALESCE(src_ta.name, src_rta.name, ''),
        s.reference_id,
        COALESCE(ref_t.title, ref_rt.title, ''),
        COALESCE(ref_ta.name, ref_rta.name, ''),
        s.created_at
     FROM status_tags s
     LEFT JOIN threads src_t   ON src_t.id = s.thread_id
     LEFT JOIN agents  src_ta  ON src_ta.id = src_t.agent_id
     LEFT JOIN replies src_r   ON src_r.id = s.reply_id
     LEFT JOIN threads src_rt  ON src_rt.id = src_r.thread_id
     LEFT JOIN agents  src_rta ON src_rta.id = src_rt.agent_id
     LEFT JOIN threads ref_t   ON ref_t.id = s.reference_id
     LEFT JOIN agents  ref_ta  ON ref_ta.id = ref_t.agent_id
     LEFT JOIN replies ref_r   ON ref_r.id = s.reference_id
     LEFT JOIN threads ref_rt  ON ref_rt.id = ref_r.thread_id
     LEFT JOIN agents  ref_rta ON ref_rta.id = ref_rt.agent_id";

impl Database {
    /// What one agent has been doing. Threads and replies are capped at
    /// `limit`; the status list is not.
    pub fn agent_context(&self, agent_id: Uuid, limit: u32) -> Result<AgentContext> {
        let agent = self.get_agent(agent_id)?;
        Ok(AgentContext {
            recent_threads: self.threads_by_agent(agent_id, limit)?,
            recent_replies: self.replies_by_agent(agent_id, limit)?,
            active_statuses: self.statuses_by_agent(agent_id)?,
            agent,
        })
    }

    /// Snapshot of ongoing work. The three tagged lists are computed
    /// independently, so a thread can appear in more than one.
    pub fn active_context(&self) -> Result<ActiveContext> {
        Ok(ActiveContext {
            announcements: self.active_announcements()?,
            in_progress: self.threads_with_status(StatusKind::InProgress)?,
            needs_review: self.threads_with_status(StatusKind::NeedsReview)?,
            blocked: self.threads_with_status(StatusKind::Blocked)?,
            recent_threads: self.recent_threads(ACTIVE_RECENT_LIMIT)?,
        })
    }

    /// Threads carrying at least one tag of `kind` directly, newest first.
    pub fn threads_with_status(&self, kind: StatusKind) -> Result<Vec<Thread>> {
        let mut stmt = self.conn().prepare(&format!(
            "{THREAD_SELECT}
             WHERE EXISTS (
                 SELECT 1 FROM status_tags s WHERE s.thread_id = t.id AND s.tag = ?1
             )
             ORDER BY t.created_at DESC, t.rowid DESC"
        ))?;
        let rows = stmt.query_map(params![kind.as_str()], row_to_thread)?;
        Ok(collect(rows)?)
    }

    /// One edge per depends-on/blocked tag with a reference, newest first.
    /// References that resolve to nothing keep their raw id and get empty
    /// labels.
    pub fn dependency_graph(&self) -> Result<Vec<DependencyEdge>> {
        let kinds: Vec<&str> = StatusKind::ALL
            .into_iter()
            .filter(StatusKind::is_dependency)
            .map(|kind| kind.as_str())
            .collect();
        let placeholders = vec!["?"; kinds.len()].join(", ");

        let mut stmt = self.conn().prepare(&format!(
            "{DEPENDENCY_SELECT}
             WHERE s.tag IN ({placeholders}) AND s.reference_id IS NOT NULL
             ORDER BY s.created_at DESC, s.rowid DESC"
        ))?;
        let rows = stmt.query_map(params_from_iter(kinds.iter()), |row| {
            let tag: String = row.get(1)?;
            let status = StatusKind::from_str(&tag)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
            Ok(DependencyEdge {
                status_id: uuid_at(row, 0)?,
                status,
                source: DependencyNode {
                    id: row.get(2)?,
                    title: row.get(3)?,
                    agent_name: row.get(4)?,
                },
                depends_on: DependencyNode {
                    id: row.get(5)?,
                    title: row.get(6)?,
                    agent_name: row.get(7)?,
                },
                created_at: ts_at(row, 8)?,
            })
        })?;
        Ok(collect(rows)?)
    }

    /// Row counts for the admin overview.
    pub fn forum_stats(&self) -> Result<ForumStats> {
        let count = |table: &str| -> Result<i64> {
            Ok(self
                .conn()
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
        };
        Ok(ForumStats {
            agents: count("agents")?,
            threads: count("threads")?,
            replies: count("replies")?,
            status_tags: count("status_tags")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewThread, StatusTarget};

    fn thread(db: &Database, agent: Uuid, title: &str) -> Uuid {
        db.create_thread(
            agent,
            NewThread {
                title: title.into(),
                body: "hello".into(),
                tags: vec!["x".into()],
            },
        )
        .unwrap()
        .id
    }

    fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let a = db.create_agent("a1", "alice", "h1").unwrap().id;
        let b = db.create_agent("b1", "bob", "h2").unwrap().id;
        (db, a, b)
    }

    #[test]
    fn test_agent_context_lists_and_caps() {
        let (db, a, b) = setup();
        let mut threads = Vec::new();
        for i in 0..3 {
            threads.push(thread(&db, a, &format!("T{i}")));
        }
        thread(&db, b, "other");
        for t in &threads {
            db.create_reply(*t, a, "note").unwrap();
        }
        for t in &threads {
            db.apply_status(StatusTarget::Thread(*t), a, StatusKind::Acknowledged, None)
                .unwrap();
        }

        let ctx = db.agent_context(a, 2).unwrap();
        assert_eq!(ctx.agent.name, "a1");
        assert_eq!(ctx.recent_threads.len(), 2);
        assert_eq!(ctx.recent_threads[0].id, threads[2]);
        assert_eq!(ctx.recent_replies.len(), 2);
        assert_eq!(ctx.recent_replies[0].thread_title, "T2");
        assert_eq!(ctx.active_statuses.len(), 3);
    }

    #[test]
    fn test_agent_context_unknown_agent() {
        let (db, _, _) = setup();
        assert!(db.agent_context(Uuid::new_v4(), 10).is_err());
    }

    #[test]
    fn test_active_context_lists_are_independent() {
        let (db, a, b) = setup();
        let t1 = thread(&db, a, "T1");
        let t2 = thread(&db, b, "T2");
        thread(&db, b, "T3");

        db.apply_status(StatusTarget::Thread(t1), a, StatusKind::Blocked, None)
            .unwrap();
        db.apply_status(StatusTarget::Thread(t1), b, StatusKind::Blocked, None)
            .unwrap();
        db.apply_status(StatusTarget::Thread(t1), a, StatusKind::InProgress, None)
            .unwrap();
        db.apply_status(StatusTarget::Thread(t2), b, StatusKind::NeedsReview, None)
            .unwrap();
        let ann = db.create_announcement("hi", "all").unwrap();
        let hidden = db.create_announcement("old", "news").unwrap();
        db.toggle_announcement(hidden.id).unwrap();

        let ctx = db.active_context().unwrap();
        assert_eq!(ctx.blocked.iter().map(|t| t.id).collect::<Vec<_>>(), vec![t1]);
        assert_eq!(ctx.in_progress.iter().map(|t| t.id).collect::<Vec<_>>(), vec![t1]);
        assert_eq!(ctx.needs_review.iter().map(|t| t.id).collect::<Vec<_>>(), vec![t2]);
        assert_eq!(ctx.recent_threads.len(), 3);
        assert_eq!(ctx.announcements.len(), 1);
        assert_eq!(ctx.announcements[0].id, ann.id);
    }

    #[test]
    fn test_dangling_reference_gives_empty_target() {
        let (db, a, _) = setup();
        let t1 = thread(&db, a, "T1");
        let status = db
            .apply_status(StatusTarget::Thread(t1), a, StatusKind::Blocked, Some("zzz".into()))
            .unwrap();

        let graph = db.dependency_graph().unwrap();
        assert_eq!(graph.len(), 1);
        let edge = &graph[0];
        assert_eq!(edge.status_id, status.id);
        assert_eq!(edge.status, StatusKind::Blocked);
        assert_eq!(edge.source.id, t1.to_string());
        assert_eq!(edge.source.title, "T1");
        assert_eq!(edge.source.agent_name, "a1");
        assert_eq!(edge.depends_on.id, "zzz");
        assert_eq!(edge.depends_on.title, "");
        assert_eq!(edge.depends_on.agent_name, "");
    }

    #[test]
    fn test_edges_resolve_through_replies() {
        let (db, a, b) = setup();
        let t1 = thread(&db, a, "T1");
        let t2 = thread(&db, b, "T2");
        let reply = db.create_reply(t2, a, "waiting").unwrap();

        db.apply_status(
            StatusTarget::Reply(reply.id),
            a,
            StatusKind::DependsOn,
            Some(t1.to_string()),
        )
        .unwrap();
        db.apply_status(
            StatusTarget::Thread(t1),
            a,
            StatusKind::Blocked,
            Some(reply.id.to_string()),
        )
        .unwrap();

        let graph = db.dependency_graph().unwrap();
        assert_eq!(graph.len(), 2);

        // Newest first: t1 blocked on the reply in T2.
        assert_eq!(graph[0].depends_on.id, reply.id.to_string());
        assert_eq!(graph[0].depends_on.title, "T2");
        assert_eq!(graph[0].depends_on.agent_name, "b1");

        assert_eq!(graph[1].source.id, reply.id.to_string());
        assert_eq!(graph[1].source.title, "T2");
        assert_eq!(graph[1].source.agent_name, "b1");
        assert_eq!(graph[1].depends_on.title, "T1");
    }

    #[test]
    fn test_edge_count_matches_dependency_tags() {
        let (db, a, _) = setup();
        let t1 = thread(&db, a, "T1");
        let t2 = thread(&db, a, "T2");
        let target = StatusTarget::Thread(t1);

        db.apply_status(target, a, StatusKind::DependsOn, Some(t2.to_string()))
            .unwrap();
        db.apply_status(target, a, StatusKind::Blocked, Some("gone".into()))
            .unwrap();
        // Not edges: no reference, or a non-dependency kind.
        db.apply_status(target, a, StatusKind::Blocked, None).unwrap();
        db.apply_status(target, a, StatusKind::Resolved, Some(t2.to_string()))
            .unwrap();

        let expected: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM status_tags
                 WHERE tag IN ('depends-on', 'blocked') AND reference_id IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(expected, 2);
        assert_eq!(db.dependency_graph().unwrap().len(), expected as usize);
    }

    #[test]
    fn test_only_dependency_kinds_become_edges() {
        let (db, a, _) = setup();
        let t1 = thread(&db, a, "T1");
        let t2 = thread(&db, a, "T2");
        for kind in StatusKind::ALL {
            db.apply_status(StatusTarget::Thread(t1), a, kind, Some(t2.to_string()))
                .unwrap();
        }

        let mut kinds: Vec<StatusKind> =
            db.dependency_graph().unwrap().into_iter().map(|e| e.status).collect();
        kinds.sort_by_key(|k| k.as_str());
        assert_eq!(kinds, vec![StatusKind::Blocked, StatusKind::DependsOn]);
        assert!(kinds.iter().all(StatusKind::is_dependency));
    }

    #[test]
    fn test_forum_stats() {
        let (db, a, b) = setup();
        let t1 = thread(&db, a, "T1");
        db.create_reply(t1, b, "r").unwrap();
        db.apply_status(StatusTarget::Thread(t1), b, StatusKind::Acknowledged, None)
            .unwrap();

        assert_eq!(
            db.forum_stats().unwrap(),
            ForumStats {
                agents: 2,
                threads: 1,
                replies: 1,
                status_tags: 1,
            }
        );
    }
}
