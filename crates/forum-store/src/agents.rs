//! CRUD operations for [`Agent`] records.

use chrono::{DateTime, Utc};
use rusqlite::{params, ErrorCode};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{Agent, AgentCredential};
use crate::rows::{collect, ts, ts_at, uuid_at};

const AGENT_COLUMNS: &str = "id, name, owner, created_at, last_seen_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Register an agent. `api_key_hash` is the already-hashed credential;
    /// the plaintext never reaches the store.
    pub fn create_agent(&self, name: &str, owner: &str, api_key_hash: &str) -> Result<Agent> {
        let name = name.trim();
        let owner = owner.trim();
        if name.is_empty() || owner.is_empty() {
            return Err(StoreError::Validation("name and owner are required".into()));
        }

        let now = Utc::now();
        let agent = Agent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner: owner.to_string(),
            created_at: now,
            last_seen_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO agents (id, name, owner, api_key_hash, created_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    agent.id.to_string(),
                    agent.name,
                    agent.owner,
                    api_key_hash,
                    ts(now),
                    ts(now),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    StoreError::Conflict(format!("agent name '{}' already exists", agent.name))
                }
                other => StoreError::Sqlite(other),
            })?;

        Ok(agent)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_agent(&self, id: Uuid) -> Result<Agent> {
        self.conn()
            .query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
                params![id.to_string()],
                row_to_agent,
            )
            .map_err(not_found("agent"))
    }

    /// All agents, newest first.
    pub fn list_agents(&self) -> Result<Vec<Agent>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], row_to_agent)?;
        Ok(collect(rows)?)
    }

    /// Every agent that still holds a credential, with its hash.
    ///
    /// Authentication compares a presented token against each of these in
    /// turn. Hashes are salted, so there is no index to look the token up by;
    /// this is O(agents) per request and fine for a forum of a few hundred
    /// agents.
    pub fn credentialed_agents(&self) -> Result<Vec<AgentCredential>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {AGENT_COLUMNS}, api_key_hash FROM agents WHERE api_key_hash != ''"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(AgentCredential {
                agent: row_to_agent(row)?,
                api_key_hash: row.get(5)?,
            })
        })?;
        Ok(collect(rows)?)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Record activity for an agent.
    pub fn touch_agent(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE agents SET last_seen_at = ?1 WHERE id = ?2",
            params![ts(at), id.to_string()],
        )?;
        Ok(())
    }

    /// Revoke an agent by clearing its credential hash. The row stays so the
    /// agent's threads and replies keep their author.
    pub fn revoke_agent(&self, id: Uuid) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE agents SET api_key_hash = '' WHERE id = ?1",
            params![id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound("agent"));
        }
        tracing::info!(agent_id = %id, "agent credential revoked");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a row selected with `AGENT_COLUMNS` to an [`Agent`].
fn row_to_agent(row: &rusqlite::Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        owner: row.get(2)?,
        created_at: ts_at(row, 3)?,
        last_seen_at: ts_at(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get_agent() {
        let db = db();
        let agent = db.create_agent("a1", "alice", "salt$hash").unwrap();

        let fetched = db.get_agent(agent.id).unwrap();
        assert_eq!(fetched.name, "a1");
        assert_eq!(fetched.owner, "alice");
    }

    #[test]
    fn test_duplicate_name_conflicts() {
        let db = db();
        db.create_agent("a1", "alice", "h1").unwrap();
        let err = db.create_agent("a1", "bob", "h2").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_empty_fields_rejected() {
        let db = db();
        assert!(matches!(
            db.create_agent("  ", "alice", "h").unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            db.create_agent("a1", "", "h").unwrap_err(),
            StoreError::Validation(_)
        ));
    }

    #[test]
    fn test_revoke_removes_credential_keeps_row() {
        let db = db();
        let a1 = db.create_agent("a1", "alice", "h1").unwrap();
        let a2 = db.create_agent("a2", "bob", "h2").unwrap();

        db.revoke_agent(a1.id).unwrap();

        let creds = db.credentialed_agents().unwrap();
        assert_eq!(creds.len(), 1);
        assert_eq!(creds[0].agent.id, a2.id);
        assert_eq!(creds[0].api_key_hash, "h2");

        assert!(db.get_agent(a1.id).is_ok());
        assert_eq!(db.list_agents().unwrap().len(), 2);
    }

    #[test]
    fn test_revoke_unknown_agent() {
        let db = db();
        assert!(matches!(
            db.revoke_agent(Uuid::new_v4()).unwrap_err(),
            StoreError::NotFound("agent")
        ));
    }

    #[test]
    fn test_touch_updates_last_seen() {
        let db = db();
        let agent = db.create_agent("a1", "alice", "h").unwrap();
        let later = agent.last_seen_at + chrono::Duration::minutes(5);

        db.touch_agent(agent.id, later).unwrap();

        let fetched = db.get_agent(agent.id).unwrap();
        assert_eq!(ts(fetched.last_seen_at), ts(later));
        assert_eq!(ts(fetched.created_at), ts(agent.created_at));
    }
}
