//! Status tagging: attach, remove and query [`StatusTag`] records.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::Utc;
use forum_shared::constants::PREVIEW_CHARS;
use forum_shared::text::truncate_chars;
use forum_shared::{StatusKind, TargetKind};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{StatusQueryItem, StatusTag, StatusTarget};
use crate::rows::{collect, opt_uuid_at, ts, ts_at, uuid_at};

/// Status columns joined with the applying agent's name, in the order
/// [`row_to_status`] expects.
pub(crate) const STATUS_SELECT: &str = "SELECT s.id, s.thread_id, s.reply_id, s.agent_id, a.name,
        s.tag, s.reference_id, s.created_at
     FROM status_tags s
     JOIN agents a ON a.id = s.agent_id";

impl Database {
    /// Attach a status to a thread or reply. The target must exist; the
    /// reference id is stored as given. Duplicate tags are allowed.
    pub fn apply_status(
        &self,
        target: StatusTarget,
        agent_id: Uuid,
        kind: StatusKind,
        reference_id: Option<String>,
    ) -> Result<StatusTag> {
        match target {
            StatusTarget::Thread(id) => self.ensure_exists("threads", "thread", id)?,
            StatusTarget::Reply(id) => self.ensure_exists("replies", "reply", id)?,
        }
        let reference_id = reference_id.filter(|r| !r.is_empty());

        let id = Uuid::new_v4();
        self.conn().execute(
            "INSERT INTO status_tags (id, thread_id, reply_id, agent_id, tag, reference_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                target.thread_id().map(|t| t.to_string()),
                target.reply_id().map(|r| r.to_string()),
                agent_id.to_string(),
                kind.as_str(),
                reference_id,
                ts(Utc::now()),
            ],
        )?;

        tracing::debug!(
            status_id = %id,
            target = target.kind().as_str(),
            target_id = %target.id(),
            tag = kind.as_str(),
            "status applied"
        );
        self.get_status(id)
    }

    pub fn get_status(&self, id: Uuid) -> Result<StatusTag> {
        self.conn()
            .query_row(
                &format!("{STATUS_SELECT} WHERE s.id = ?1"),
                params![id.to_string()],
                row_to_status,
            )
            .map_err(not_found("status tag"))
    }

    /// Remove a status tag. Only the agent that applied it may do so.
    pub fn remove_status(&self, id: Uuid, agent_id: Uuid) -> Result<()> {
        let owner = self
            .conn()
            .query_row(
                "SELECT agent_id FROM status_tags WHERE id = ?1",
                params![id.to_string()],
                |row| uuid_at(row, 0),
            )
            .map_err(not_found("status tag"))?;

        if owner != agent_id {
            return Err(StoreError::Forbidden(
                "you can only remove your own status tags".into(),
            ));
        }

        self.conn()
            .execute("DELETE FROM status_tags WHERE id = ?1", params![id.to_string()])?;
        tracing::debug!(status_id = %id, agent_id = %agent_id, "status removed");
        Ok(())
    }

    /// Every tag of `kind`, newest first, with a short preview of its target.
    pub fn query_by_kind(&self, kind: StatusKind) -> Result<Vec<StatusQueryItem>> {
        let mut stmt = self.conn().prepare(
            "SELECT s.id, s.thread_id, s.reply_id, s.agent_id, a.name,
                    s.tag, s.reference_id, s.created_at,
                    t.title, r.body, COALESCE(s.thread_id, r.thread_id)
             FROM status_tags s
             JOIN agents a ON a.id = s.agent_id
             LEFT JOIN threads t ON t.id = s.thread_id
             LEFT JOIN replies r ON r.id = s.reply_id
             WHERE s.tag = ?1
             ORDER BY s.created_at DESC, s.rowid DESC",
        )?;
        let rows = stmt.query_map(params![kind.as_str()], |row| {
            let status = row_to_status(row)?;
            let (target_kind, preview) = match status.target {
                StatusTarget::Thread(_) => {
                    let title: Option<String> = row.get(8)?;
                    (TargetKind::Thread, title.unwrap_or_default())
                }
                StatusTarget::Reply(_) => {
                    let body: Option<String> = row.get(9)?;
                    let body = body.unwrap_or_default();
                    (TargetKind::Reply, truncate_chars(&body, PREVIEW_CHARS))
                }
            };
            Ok(StatusQueryItem {
                status,
                target_kind,
                target_thread_id: uuid_at(row, 10)?,
                preview,
            })
        })?;
        Ok(collect(rows)?)
    }

    /// Tags on a thread and on any of its replies, oldest first.
    pub fn statuses_in_thread(&self, thread_id: Uuid) -> Result<Vec<StatusTag>> {
        let mut stmt = self.conn().prepare(&format!(
            "{STATUS_SELECT}
             WHERE s.thread_id = ?1
                OR s.reply_id IN (SELECT id FROM replies WHERE thread_id = ?1)
             ORDER BY s.created_at ASC, s.rowid ASC"
        ))?;
        let rows = stmt.query_map(params![thread_id.to_string()], row_to_status)?;
        Ok(collect(rows)?)
    }

    /// Tags applied directly to each of `thread_ids`, grouped by thread and
    /// oldest first. Threads without tags are absent from the map.
    pub fn statuses_for_thread_ids(
        &self,
        thread_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<StatusTag>>> {
        let mut grouped: HashMap<Uuid, Vec<StatusTag>> = HashMap::new();
        if thread_ids.is_empty() {
            return Ok(grouped);
        }

        let placeholders = vec!["?"; thread_ids.len()].join(", ");
        let mut stmt = self.conn().prepare(&format!(
            "{STATUS_SELECT}
             WHERE s.thread_id IN ({placeholders})
             ORDER BY s.created_at ASC, s.rowid ASC"
        ))?;
        let ids: Vec<String> = thread_ids.iter().map(Uuid::to_string).collect();
        let rows = stmt.query_map(params_from_iter(ids.iter()), row_to_status)?;

        for status in collect(rows)? {
            if let StatusTarget::Thread(thread_id) = status.target {
                grouped.entry(thread_id).or_default().push(status);
            }
        }
        Ok(grouped)
    }

    /// Every tag an agent has applied, newest first.
    pub fn statuses_by_agent(&self, agent_id: Uuid) -> Result<Vec<StatusTag>> {
        let mut stmt = self.conn().prepare(&format!(
            "{STATUS_SELECT} WHERE s.agent_id = ?1 ORDER BY s.created_at DESC, s.rowid DESC"
        ))?;
        let rows = stmt.query_map(params![agent_id.to_string()], row_to_status)?;
        Ok(collect(rows)?)
    }

    fn ensure_exists(&self, table: &'static str, entity: &'static str, id: Uuid) -> Result<()> {
        self.conn()
            .query_row(
                &format!("SELECT 1 FROM {table} WHERE id = ?1"),
                params![id.to_string()],
                |_| Ok(()),
            )
            .map_err(not_found(entity))
    }
}

/// Map a row selected with [`STATUS_SELECT`] to a [`StatusTag`].
pub(crate) fn row_to_status(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatusTag> {
    let target = match (opt_uuid_at(row, 1)?, opt_uuid_at(row, 2)?) {
        (Some(thread_id), None) => StatusTarget::Thread(thread_id),
        (None, Some(reply_id)) => StatusTarget::Reply(reply_id),
        _ => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                "status tag must target exactly one of thread or reply".into(),
            ))
        }
    };

    let tag: String = row.get(5)?;
    let tag = StatusKind::from_str(&tag)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(StatusTag {
        id: uuid_at(row, 0)?,
        target,
        agent_id: uuid_at(row, 3)?,
        agent_name: row.get(4)?,
        tag,
        reference_id: row.get(6)?,
        created_at: ts_at(row, 7)?,
    })
}
