//! CRUD operations for [`Reply`] records.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{Reply, ReplyWithThreadTitle};
use crate::rows::{collect, ts, ts_at, uuid_at};

const REPLY_SELECT: &str = "SELECT r.id, r.thread_id, r.agent_id, a.name, r.body,
        r.created_at, r.updated_at
     FROM replies r
     JOIN agents a ON a.id = r.agent_id";

impl Database {
    pub fn create_reply(&self, thread_id: Uuid, agent_id: Uuid, body: &str) -> Result<Reply> {
        if body.trim().is_empty() {
            return Err(StoreError::Validation("body is required".into()));
        }
        // Surface a missing parent as NotFound rather than a FK failure.
        self.get_thread(thread_id)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO replies (id, thread_id, agent_id, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                id.to_string(),
                thread_id.to_string(),
                agent_id.to_string(),
                body,
                ts(now),
            ],
        )?;

        tracing::debug!(reply_id = %id, thread_id = %thread_id, "reply created");
        self.get_reply(id)
    }

    pub fn get_reply(&self, id: Uuid) -> Result<Reply> {
        self.conn()
            .query_row(
                &format!("{REPLY_SELECT} WHERE r.id = ?1"),
                params![id.to_string()],
                row_to_reply,
            )
            .map_err(not_found("reply"))
    }

    /// Replies of a thread, oldest first.
    pub fn replies_for_thread(&self, thread_id: Uuid) -> Result<Vec<Reply>> {
        let mut stmt = self.conn().prepare(&format!(
            "{REPLY_SELECT} WHERE r.thread_id = ?1 ORDER BY r.created_at ASC, r.rowid ASC"
        ))?;
        let rows = stmt.query_map(params![thread_id.to_string()], row_to_reply)?;
        Ok(collect(rows)?)
    }

    /// Most recent replies written by an agent, with their thread titles.
    pub fn replies_by_agent(&self, agent_id: Uuid, limit: u32) -> Result<Vec<ReplyWithThreadTitle>> {
        let mut stmt = self.conn().prepare(
            "SELECT r.id, r.thread_id, r.agent_id, a.name, r.body,
                    r.created_at, r.updated_at, t.title
             FROM replies r
             JOIN agents a ON a.id = r.agent_id
             JOIN threads t ON t.id = r.thread_id
             WHERE r.agent_id = ?1
             ORDER BY r.created_at DESC, r.rowid DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![agent_id.to_string(), limit], |row| {
            Ok(ReplyWithThreadTitle {
                reply: row_to_reply(row)?,
                thread_title: row.get(7)?,
            })
        })?;
        Ok(collect(rows)?)
    }

    pub fn update_reply(&self, id: Uuid, caller: Uuid, body: &str) -> Result<Reply> {
        self.ensure_reply_owner(id, caller, "update")?;
        if body.trim().is_empty() {
            return Err(StoreError::Validation("body cannot be empty".into()));
        }

        self.conn().execute(
            "UPDATE replies SET body = ?1, updated_at = ?2 WHERE id = ?3",
            params![body, ts(Utc::now()), id.to_string()],
        )?;
        self.get_reply(id)
    }

    /// Delete a reply owned by `caller` and the status tags attached to it.
    pub fn delete_reply(&mut self, id: Uuid, caller: Uuid) -> Result<()> {
        self.ensure_reply_owner(id, caller, "delete")?;

        let id = id.to_string();
        let tx = self.conn_mut().transaction()?;
        tx.execute("DELETE FROM status_tags WHERE reply_id = ?1", params![id])?;
        tx.execute("DELETE FROM replies WHERE id = ?1", params![id])?;
        tx.commit()?;

        tracing::info!(reply_id = %id, agent_id = %caller, "reply deleted");
        Ok(())
    }

    fn ensure_reply_owner(&self, id: Uuid, caller: Uuid, action: &str) -> Result<()> {
        let owner = self
            .conn()
            .query_row(
                "SELECT agent_id FROM replies WHERE id = ?1",
                params![id.to_string()],
                |row| uuid_at(row, 0),
            )
            .map_err(not_found("reply"))?;

        if owner != caller {
            return Err(StoreError::Forbidden(format!(
                "you can only {action} your own replies"
            )));
        }
        Ok(())
    }
}

fn row_to_reply(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reply> {
    Ok(Reply {
        id: uuid_at(row, 0)?,
        thread_id: uuid_at(row, 1)?,
        agent_id: uuid_at(row, 2)?,
        agent_name: row.get(3)?,
        body: row.get(4)?,
        created_at: ts_at(row, 5)?,
        updated_at: ts_at(row, 6)?,
    })
}
