//! Admin-authored [`Announcement`] records.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::Announcement;
use crate::rows::{bool_at, collect, ts, ts_at, uuid_at};

const ANNOUNCEMENT_COLUMNS: &str = "id, title, body, active, created_at";

impl Database {
    /// Create an announcement. New announcements start active.
    pub fn create_announcement(&self, title: &str, body: &str) -> Result<Announcement> {
        let title = title.trim();
        let body = body.trim();
        if title.is_empty() || body.is_empty() {
            return Err(StoreError::Validation("title and body are required".into()));
        }

        let announcement = Announcement {
            id: Uuid::new_v4(),
            title: title.to_string(),
            body: body.to_string(),
            active: true,
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO announcements (id, title, body, active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![
                announcement.id.to_string(),
                announcement.title,
                announcement.body,
                ts(announcement.created_at),
            ],
        )?;

        tracing::info!(announcement_id = %announcement.id, "announcement created");
        Ok(announcement)
    }

    /// All announcements, newest first.
    pub fn list_announcements(&self) -> Result<Vec<Announcement>> {
        self.query_announcements("")
    }

    /// Active announcements, newest first.
    pub fn active_announcements(&self) -> Result<Vec<Announcement>> {
        self.query_announcements("WHERE active = 1")
    }

    /// Flip the active flag. Returns the new value.
    pub fn toggle_announcement(&self, id: Uuid) -> Result<bool> {
        self.conn()
            .query_row(
                "UPDATE announcements SET active = NOT active WHERE id = ?1 RETURNING active",
                params![id.to_string()],
                |row| bool_at(row, 0),
            )
            .map_err(not_found("announcement"))
    }

    fn query_announcements(&self, where_clause: &str) -> Result<Vec<Announcement>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements {where_clause}
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], row_to_announcement)?;
        Ok(collect(rows)?)
    }
}

fn row_to_announcement(row: &rusqlite::Row<'_>) -> rusqlite::Result<Announcement> {
    Ok(Announcement {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        active: bool_at(row, 3)?,
        created_at: ts_at(row, 4)?,
    })
}
