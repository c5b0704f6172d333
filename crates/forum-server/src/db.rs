//! Shared handle to the single SQLite connection.
//!
//! `rusqlite` is blocking, so every call runs on the blocking thread pool
//! while holding the mutex for the duration of one store operation.

use std::sync::{Arc, Mutex};

use forum_store::{Database, StoreError};

use crate::error::ServerError;

#[derive(Clone)]
pub struct SharedDb {
    inner: Arc<Mutex<Database>>,
}

impl SharedDb {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `f` against the database on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut db = inner
                .lock()
                .map_err(|_| ServerError::Internal("database mutex poisoned".into()))?;
            f(&mut *db).map_err(ServerError::from)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("database task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_maps_store_errors() {
        let db = SharedDb::new(Database::open_in_memory().unwrap());

        let agent = db
            .run(|db| db.create_agent("a1", "alice", "h"))
            .await
            .unwrap();
        assert_eq!(agent.name, "a1");

        let err = db
            .run(move |db| db.get_thread(uuid::Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }
}
