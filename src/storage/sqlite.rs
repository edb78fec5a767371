//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the recovery store
//! and the run log.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecoveryStore, RunLog, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, CHECKPOINT_IN_PROGRESS};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// The connection is shared behind a mutex; every operation holds it for a
/// single statement or transaction.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        generation: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
        documents_indexed: row.get(6)?,
        organizations_failed: row.get(7)?,
    })
}

const RUN_COLUMNS: &str = "id, generation, started_at, finished_at, config_hash, status,
     documents_indexed, organizations_failed";

impl RecoveryStore for SqliteStorage {
    fn set(&self, host: &str, url: &str, owner: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock()?.execute(
            "INSERT INTO checkpoints (host, url, organization, status, seq, updated_at)
             VALUES (?1, ?2, ?3, ?4, (SELECT COALESCE(MAX(seq), 0) + 1 FROM checkpoints), ?5)
             ON CONFLICT(host, organization, url) DO UPDATE SET
                status = excluded.status,
                seq = excluded.seq,
                updated_at = excluded.updated_at",
            params![host, url, owner, CHECKPOINT_IN_PROGRESS, now],
        )?;
        Ok(())
    }

    fn keys(&self, host: &str) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT url FROM checkpoints WHERE host = ?1 ORDER BY seq")?;
        let keys = stmt
            .query_map(params![host], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn delete(&self, host: &str, url: &str, owner: &str) -> StorageResult<()> {
        self.lock()?.execute(
            "DELETE FROM checkpoints WHERE host = ?1 AND organization = ?2 AND url = ?3",
            params![host, owner, url],
        )?;
        Ok(())
    }

    fn resume_point(&self, host: &str, owner: &str) -> StorageResult<Option<String>> {
        let url = self
            .lock()?
            .query_row(
                "SELECT url FROM checkpoints WHERE host = ?1 AND organization = ?2
                 ORDER BY seq DESC LIMIT 1",
                params![host, owner],
                |row| row.get(0),
            )
            .optional()?;
        Ok(url)
    }

    fn clear(&self) -> StorageResult<()> {
        self.lock()?.execute("DELETE FROM checkpoints", [])?;
        Ok(())
    }
}

impl RunLog for SqliteStorage {
    fn create_run(&self, generation: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO runs (generation, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![generation, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        documents_indexed: u64,
        organizations_failed: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.lock()?.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, documents_indexed = ?3,
             organizations_failed = ?4 WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                documents_indexed as i64,
                organizations_failed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        conn.query_row(&sql, params![run_id], row_to_run)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT ?1", RUN_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params![limit as i64], row_to_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStorage::new_in_memory().is_ok());
    }

    #[test]
    fn test_checkpoint_set_keys_delete() {
        let storage = SqliteStorage::new_in_memory().unwrap();

        storage.set("github.com", "https://api/orgs/a?page=1", "a").unwrap();
        storage.set("github.com", "https://api/orgs/b?page=1", "b").unwrap();
        storage.set("gitlab.com", "https://gl/groups/c", "c").unwrap();

        assert_eq!(storage.keys("github.com").unwrap().len(), 2);
        assert_eq!(storage.keys("gitlab.com").unwrap().len(), 1);

        storage.delete("github.com", "https://api/orgs/a?page=1", "a").unwrap();
        assert_eq!(
            storage.keys("github.com").unwrap(),
            vec!["https://api/orgs/b?page=1".to_string()]
        );
    }

    #[test]
    fn test_set_is_idempotent() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.set("github.com", "https://api/x", "x").unwrap();
        storage.set("github.com", "https://api/x", "x").unwrap();
        assert_eq!(storage.keys("github.com").unwrap().len(), 1);
    }

    #[test]
    fn test_resume_point_prefers_latest_write() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.set("github.com", "https://api/a?page=2", "a").unwrap();
        storage.set("github.com", "https://api/a?page=3", "a").unwrap();
        storage.set("github.com", "https://api/b?page=9", "b").unwrap();

        assert_eq!(
            storage.resume_point("github.com", "a").unwrap(),
            Some("https://api/a?page=3".to_string())
        );
        assert_eq!(storage.resume_point("github.com", "zzz").unwrap(), None);
        assert_eq!(storage.resume_point("gitlab.com", "a").unwrap(), None);
    }

    #[test]
    fn test_shared_organization_cursors_are_independent() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let url = "https://api/orgs/shared?page=1";

        storage.set("github.com", url, "c_one https://github.com/shared").unwrap();
        storage.set("github.com", url, "c_two https://github.com/shared").unwrap();
        storage.delete("github.com", url, "c_one https://github.com/shared").unwrap();

        assert_eq!(
            storage
                .resume_point("github.com", "c_two https://github.com/shared")
                .unwrap(),
            Some(url.to_string())
        );
        assert_eq!(
            storage
                .resume_point("github.com", "c_one https://github.com/shared")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_clear() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.set("github.com", "https://api/a", "a").unwrap();
        storage.clear().unwrap();
        assert!(storage.keys("github.com").unwrap().is_empty());
    }

    #[test]
    fn test_run_lifecycle() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("1700000000", "hash").unwrap();
        assert!(run_id > 0);

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        storage
            .finish_run(run_id, RunStatus::Completed, 12, 1)
            .unwrap();
        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.documents_indexed, 12);
        assert_eq!(run.organizations_failed, 1);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_finish_unknown_run() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.finish_run(42, RunStatus::Completed, 0, 0),
            Err(StorageError::RunNotFound(42))
        ));
    }

    #[test]
    fn test_recent_runs_newest_first() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.create_run("1", "h").unwrap();
        storage.create_run("2", "h").unwrap();
        storage.create_run("3", "h").unwrap();

        let runs = storage.recent_runs(2).unwrap();
        let generations: Vec<&str> = runs.iter().map(|r| r.generation.as_str()).collect();
        assert_eq!(generations, vec!["3", "2"]);
    }
}
