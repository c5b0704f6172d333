//! CRUD and listing operations for [`Thread`] records.

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Transaction};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{
    NewThread, Page, PageRequest, ReplyDetail, StatusTarget, Thread, ThreadDetail, ThreadFilter,
    ThreadUpdate,
};
use crate::rows::{bool_at, collect, ts, ts_at, uuid_at};

/// Thread columns joined with the owning agent's name, in the order
/// [`row_to_thread`] expects.
pub(crate) const THREAD_SELECT: &str = "SELECT t.id, t.agent_id, a.name, t.title, t.body, t.tags,
        t.pinned, t.archived, t.created_at, t.updated_at
     FROM threads t
     JOIN agents a ON a.id = t.agent_id";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_thread(&self, agent_id: Uuid, input: NewThread) -> Result<Thread> {
        if input.title.trim().is_empty() || input.body.trim().is_empty() {
            return Err(StoreError::Validation("title and body are required".into()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let tags_json = serde_json::to_string(&input.tags)?;

        self.conn().execute(
            "INSERT INTO threads (id, agent_id, title, body, tags, pinned, archived, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?6)",
            params![
                id.to_string(),
                agent_id.to_string(),
                input.title,
                input.body,
                tags_json,
                ts(now),
            ],
        )?;

        tracing::debug!(thread_id = %id, agent_id = %agent_id, "thread created");
        self.get_thread(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_thread(&self, id: Uuid) -> Result<Thread> {
        self.conn()
            .query_row(
                &format!("{THREAD_SELECT} WHERE t.id = ?1"),
                params![id.to_string()],
                row_to_thread,
            )
            .map_err(not_found("thread"))
    }

    /// A thread with its replies (oldest first) and every status tag on the
    /// thread or one of its replies.
    pub fn get_thread_detail(&self, id: Uuid) -> Result<ThreadDetail> {
        let thread = self.get_thread(id)?;
        let replies = self.replies_for_thread(id)?;
        let statuses = self.statuses_in_thread(id)?;

        let mut thread_statuses = Vec::new();
        let mut replies: Vec<ReplyDetail> = replies
            .into_iter()
            .map(|reply| ReplyDetail {
                reply,
                statuses: Vec::new(),
            })
            .collect();

        for status in statuses {
            match status.target {
                StatusTarget::Thread(_) => thread_statuses.push(status),
                StatusTarget::Reply(reply_id) => {
                    if let Some(detail) = replies.iter_mut().find(|r| r.reply.id == reply_id) {
                        detail.statuses.push(status);
                    }
                }
            }
        }

        Ok(ThreadDetail {
            thread,
            replies,
            statuses: thread_statuses,
        })
    }

    /// Filtered, paginated listing, newest first.
    pub fn list_threads(&self, filter: &ThreadFilter, page: PageRequest) -> Result<Page<Thread>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(tag) = &filter.tag {
            conditions.push("EXISTS (SELECT 1 FROM json_each(t.tags) WHERE json_each.value = ?)");
            args.push(Value::Text(tag.clone()));
        }
        if let Some(agent) = &filter.agent {
            conditions.push("a.name = ?");
            args.push(Value::Text(agent.clone()));
        }
        if let Some(status) = filter.status {
            conditions.push(
                "EXISTS (SELECT 1 FROM status_tags st WHERE st.thread_id = t.id AND st.tag = ?)",
            );
            args.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(pinned) = filter.pinned {
            conditions.push("t.pinned = ?");
            args.push(Value::Integer(pinned as i64));
        }
        if let Some(archived) = filter.archived {
            conditions.push("t.archived = ?");
            args.push(Value::Integer(archived as i64));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let total: i64 = self.conn().query_row(
            &format!(
                "SELECT COUNT(*) FROM threads t JOIN agents a ON a.id = t.agent_id {where_clause}"
            ),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        args.push(Value::Integer(page.per_page as i64));
        args.push(Value::Integer(page.offset()));

        let mut stmt = self.conn().prepare(&format!(
            "{THREAD_SELECT} {where_clause}
             ORDER BY t.created_at DESC, t.rowid DESC
             LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(params_from_iter(args.iter()), row_to_thread)?;

        Ok(Page {
            items: collect(rows)?,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    /// Dashboard feed: pinned threads first, then newest.
    pub fn feed_threads(&self, limit: u32) -> Result<Vec<Thread>> {
        let mut stmt = self.conn().prepare(&format!(
            "{THREAD_SELECT}
             ORDER BY t.pinned DESC, t.created_at DESC, t.rowid DESC
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], row_to_thread)?;
        Ok(collect(rows)?)
    }

    pub fn recent_threads(&self, limit: u32) -> Result<Vec<Thread>> {
        let mut stmt = self.conn().prepare(&format!(
            "{THREAD_SELECT} ORDER BY t.created_at DESC, t.rowid DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], row_to_thread)?;
        Ok(collect(rows)?)
    }

    pub fn threads_by_agent(&self, agent_id: Uuid, limit: u32) -> Result<Vec<Thread>> {
        let mut stmt = self.conn().prepare(&format!(
            "{THREAD_SELECT} WHERE t.agent_id = ?1
             ORDER BY t.created_at DESC, t.rowid DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![agent_id.to_string(), limit], row_to_thread)?;
        Ok(collect(rows)?)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a sparse update on behalf of `caller`. Refreshes `updated_at`.
    pub fn update_thread(&self, id: Uuid, caller: Uuid, update: ThreadUpdate) -> Result<Thread> {
        self.ensure_thread_owner(id, caller, "update")?;

        if update.is_empty() {
            return Err(StoreError::Validation("no fields to update".into()));
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(StoreError::Validation("title cannot be empty".into()));
            }
            sets.push("title = ?");
            args.push(Value::Text(title));
        }
        if let Some(body) = update.body {
            if body.trim().is_empty() {
                return Err(StoreError::Validation("body cannot be empty".into()));
            }
            sets.push("body = ?");
            args.push(Value::Text(body));
        }
        if let Some(tags) = update.tags {
            sets.push("tags = ?");
            args.push(Value::Text(serde_json::to_string(&tags)?));
        }

        sets.push("updated_at = ?");
        args.push(Value::Text(ts(Utc::now())));
        args.push(Value::Text(id.to_string()));

        self.conn().execute(
            &format!("UPDATE threads SET {} WHERE id = ?", sets.join(", ")),
            params_from_iter(args.iter()),
        )?;

        self.get_thread(id)
    }

    /// Flip the pinned flag (moderation). Returns the new value.
    pub fn toggle_thread_pinned(&self, id: Uuid) -> Result<bool> {
        self.toggle_thread_flag(id, "pinned")
    }

    /// Flip the archived flag (moderation). Returns the new value.
    pub fn toggle_thread_archived(&self, id: Uuid) -> Result<bool> {
        self.toggle_thread_flag(id, "archived")
    }

    fn toggle_thread_flag(&self, id: Uuid, column: &'static str) -> Result<bool> {
        self.conn()
            .query_row(
                &format!(
                    "UPDATE threads SET {column} = NOT {column}, updated_at = ?1
                     WHERE id = ?2 RETURNING {column}"
                ),
                params![ts(Utc::now()), id.to_string()],
                |row| bool_at(row, 0),
            )
            .map_err(not_found("thread"))
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a thread owned by `caller`, together with its replies and every
    /// status tag on the thread or its replies, in one transaction.
    pub fn delete_thread(&mut self, id: Uuid, caller: Uuid) -> Result<()> {
        self.ensure_thread_owner(id, caller, "delete")?;
        let tx = self.conn_mut().transaction()?;
        cascade_delete_thread(&tx, id)?;
        tx.commit()?;
        tracing::info!(thread_id = %id, agent_id = %caller, "thread deleted");
        Ok(())
    }

    /// Delete a thread regardless of owner (admin moderation).
    pub fn moderator_delete_thread(&mut self, id: Uuid) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        if cascade_delete_thread(&tx, id)? == 0 {
            return Err(StoreError::NotFound("thread"));
        }
        tx.commit()?;
        tracing::info!(thread_id = %id, "thread deleted by moderator");
        Ok(())
    }

    fn ensure_thread_owner(&self, id: Uuid, caller: Uuid, action: &str) -> Result<()> {
        let owner = self
            .conn()
            .query_row(
                "SELECT agent_id FROM threads WHERE id = ?1",
                params![id.to_string()],
                |row| uuid_at(row, 0),
            )
            .map_err(not_found("thread"))?;

        if owner != caller {
            return Err(StoreError::Forbidden(format!(
                "you can only {action} your own threads"
            )));
        }
        Ok(())
    }
}

/// Remove a thread and everything hanging off it. Returns the number of
/// thread rows deleted (0 or 1).
fn cascade_delete_thread(tx: &Transaction<'_>, id: Uuid) -> Result<usize> {
    let id = id.to_string();
    tx.execute(
        "DELETE FROM status_tags
         WHERE thread_id = ?1
            OR reply_id IN (SELECT id FROM replies WHERE thread_id = ?1)",
        params![id],
    )?;
    tx.execute("DELETE FROM replies WHERE thread_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM threads WHERE id = ?1", params![id])?;
    Ok(deleted)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a row selected with [`THREAD_SELECT`] to a [`Thread`].
pub(crate) fn row_to_thread(row: &rusqlite::Row<'_>) -> rusqlite::Result<Thread> {
    let tags_json: String = row.get(5)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Thread {
        id: uuid_at(row, 0)?,
        agent_id: uuid_at(row, 1)?,
        agent_name: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        tags,
        pinned: bool_at(row, 6)?,
        archived: bool_at(row, 7)?,
        created_at: ts_at(row, 8)?,
        updated_at: ts_at(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatusTarget;
    use forum_shared::StatusKind;
    use std::collections::HashSet;

    fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let a = db.create_agent("a1", "alice", "h1").unwrap().id;
        let b = db.create_agent("b1", "bob", "h2").unwrap().id;
        (db, a, b)
    }

    fn new_thread(title: &str, tags: &[&str]) -> NewThread {
        NewThread {
            title: title.into(),
            body: "hello".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_create_round_trips_owner_and_tags() {
        let (db, a, _) = setup();
        let created = db.create_thread(a, new_thread("T1", &["x", "y"])).unwrap();

        let fetched = db.get_thread(created.id).unwrap();
        assert_eq!(fetched.agent_id, a);
        assert_eq!(fetched.agent_name, "a1");
        assert!(!fetched.pinned);
        assert!(!fetched.archived);
        let tags: HashSet<_> = fetched.tags.into_iter().collect();
        assert_eq!(tags, HashSet::from(["x".to_string(), "y".to_string()]));
    }

    #[test]
    fn test_create_requires_title_and_body() {
        let (db, a, _) = setup();
        let err = db.create_thread(a, new_thread("", &[])).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(db.recent_threads(10).unwrap().len(), 0);
    }

    #[test]
    fn test_get_missing_thread() {
        let (db, _, _) = setup();
        assert!(matches!(
            db.get_thread(Uuid::new_v4()).unwrap_err(),
            StoreError::NotFound("thread")
        ));
    }

    #[test]
    fn test_sparse_update_by_owner() {
        let (db, a, _) = setup();
        let t = db.create_thread(a, new_thread("T1", &["x"])).unwrap();

        let updated = db
            .update_thread(
                t.id,
                a,
                ThreadUpdate {
                    title: Some("T1 revised".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "T1 revised");
        assert_eq!(updated.body, "hello");
        assert_eq!(updated.tags, vec!["x"]);
        assert!(updated.updated_at >= t.updated_at);
    }

    #[test]
    fn test_update_validation() {
        let (db, a, _) = setup();
        let t = db.create_thread(a, new_thread("T1", &[])).unwrap();

        assert!(matches!(
            db.update_thread(t.id, a, ThreadUpdate::default()).unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            db.update_thread(
                t.id,
                a,
                ThreadUpdate {
                    body: Some(" ".into()),
                    ..Default::default()
                }
            )
            .unwrap_err(),
            StoreError::Validation(_)
        ));
    }

    #[test]
    fn test_non_owner_cannot_mutate() {
        let (mut db, a, b) = setup();
        let t = db.create_thread(a, new_thread("T1", &[])).unwrap();

        let err = db
            .update_thread(
                t.id,
                b,
                ThreadUpdate {
                    title: Some("mine now".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        let err = db.delete_thread(t.id, b).unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        assert_eq!(db.get_thread(t.id).unwrap().title, "T1");
    }

    #[test]
    fn test_delete_cascades_to_replies_and_statuses() {
        let (mut db, a, b) = setup();
        let t = db.create_thread(a, new_thread("T1", &[])).unwrap();
        let other = db.create_thread(b, new_thread("T2", &[])).unwrap();
        let r = db.create_reply(t.id, b, "on it").unwrap();
        let kept_reply = db.create_reply(other.id, a, "unrelated").unwrap();

        db.apply_status(StatusTarget::Thread(t.id), a, StatusKind::InProgress, None)
            .unwrap();
        db.apply_status(StatusTarget::Reply(r.id), b, StatusKind::Acknowledged, None)
            .unwrap();
        let kept = db
            .apply_status(
                StatusTarget::Thread(other.id),
                b,
                StatusKind::DependsOn,
                Some(t.id.to_string()),
            )
            .unwrap();

        db.delete_thread(t.id, a).unwrap();

        assert!(db.get_thread(t.id).is_err());
        assert!(db.get_reply(r.id).is_err());
        let remaining: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM status_tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 1);
        assert!(db.get_status(kept.id).is_ok());
        assert!(db.get_reply(kept_reply.id).is_ok());
    }

    #[test]
    fn test_list_filters_and_pagination() {
        let (db, a, b) = setup();
        let t1 = db.create_thread(a, new_thread("T1", &["x"])).unwrap();
        let t2 = db.create_thread(b, new_thread("T2", &["y"])).unwrap();
        let t3 = db.create_thread(a, new_thread("T3", &["x", "y"])).unwrap();
        db.toggle_thread_pinned(t2.id).unwrap();
        db.apply_status(StatusTarget::Thread(t1.id), b, StatusKind::Blocked, None)
            .unwrap();

        let all = db
            .list_threads(&ThreadFilter::default(), PageRequest::default())
            .unwrap();
        assert_eq!(all.total, 3);
        let ids: Vec<_> = all.items.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![t3.id, t2.id, t1.id]);

        let by_tag = db
            .list_threads(
                &ThreadFilter {
                    tag: Some("x".into()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .unwrap();
        assert_eq!(by_tag.total, 2);

        let by_agent = db
            .list_threads(
                &ThreadFilter {
                    agent: Some("b1".into()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .unwrap();
        assert_eq!(by_agent.items.len(), 1);
        assert_eq!(by_agent.items[0].id, t2.id);

        let by_status = db
            .list_threads(
                &ThreadFilter {
                    status: Some(StatusKind::Blocked),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .unwrap();
        assert_eq!(by_status.items.len(), 1);
        assert_eq!(by_status.items[0].id, t1.id);

        let pinned = db
            .list_threads(
                &ThreadFilter {
                    pinned: Some(true),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .unwrap();
        assert_eq!(pinned.total, 1);

        let page2 = db
            .list_threads(&ThreadFilter::default(), PageRequest::new(Some(2), Some(2)))
            .unwrap();
        assert_eq!(page2.total, 3);
        assert_eq!(page2.items.len(), 1);
        assert_eq!(page2.items[0].id, t1.id);
    }

    #[test]
    fn test_feed_puts_pinned_first() {
        let (db, a, _) = setup();
        let old = db.create_thread(a, new_thread("old", &[])).unwrap();
        let new = db.create_thread(a, new_thread("new", &[])).unwrap();
        assert!(db.toggle_thread_pinned(old.id).unwrap());

        let feed = db.feed_threads(50).unwrap();
        assert_eq!(feed[0].id, old.id);
        assert_eq!(feed[1].id, new.id);
    }

    #[test]
    fn test_moderation_toggles_and_delete() {
        let (mut db, a, _) = setup();
        let t = db.create_thread(a, new_thread("T1", &[])).unwrap();

        assert!(db.toggle_thread_archived(t.id).unwrap());
        assert!(!db.toggle_thread_archived(t.id).unwrap());
        assert!(matches!(
            db.toggle_thread_pinned(Uuid::new_v4()).unwrap_err(),
            StoreError::NotFound("thread")
        ));

        db.moderator_delete_thread(t.id).unwrap();
        assert!(matches!(
            db.moderator_delete_thread(t.id).unwrap_err(),
            StoreError::NotFound("thread")
        ));
    }
}
