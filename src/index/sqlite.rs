//! SQLite-backed search index

use crate::index::{IndexError, IndexResult, SearchIndex};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const INDEX_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS indices (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    index_name TEXT NOT NULL REFERENCES indices(name),
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (index_name, id)
);

CREATE TABLE IF NOT EXISTS aliases (
    alias TEXT NOT NULL,
    index_name TEXT NOT NULL REFERENCES indices(name),
    PRIMARY KEY (alias, index_name)
);
"#;

/// Search index stored in a SQLite database
///
/// Alias moves run inside one transaction, so readers never observe an alias
/// without a target.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Opens or creates the index database at `path`
    pub fn new(path: &Path) -> IndexResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        conn.execute_batch(INDEX_SCHEMA_SQL)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory index
    pub fn new_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(INDEX_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| IndexError::Poisoned)
    }
}

/// Resolves an alias to its indices, or a plain index name to itself
fn resolve(conn: &Connection, name: &str) -> IndexResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT index_name FROM aliases WHERE alias = ?1 ORDER BY index_name")?;
    let targets = stmt
        .query_map(params![name], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    if !targets.is_empty() {
        return Ok(targets);
    }

    if index_exists(conn, name)? {
        Ok(vec![name.to_string()])
    } else {
        Ok(Vec::new())
    }
}

fn index_exists(conn: &Connection, name: &str) -> IndexResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM indices WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

impl SearchIndex for SqliteIndex {
    fn create_index(&self, index: &str) -> IndexResult<()> {
        self.lock()?.execute(
            "INSERT OR IGNORE INTO indices (name, created_at) VALUES (?1, ?2)",
            params![index, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn upsert(&self, index: &str, id: &str, document: &Value) -> IndexResult<()> {
        let body = serde_json::to_string(document)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR IGNORE INTO indices (name, created_at) VALUES (?1, ?2)",
            params![index, now],
        )?;
        conn.execute(
            "INSERT INTO documents (index_name, id, body, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(index_name, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![index, id, body, now],
        )?;
        Ok(())
    }

    fn get(&self, index_or_alias: &str, id: &str) -> IndexResult<Option<Value>> {
        let conn = self.lock()?;
        for index in resolve(&conn, index_or_alias)? {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents WHERE index_name = ?1 AND id = ?2",
                    params![index, id],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(body) = body {
                return Ok(Some(serde_json::from_str(&body)?));
            }
        }
        Ok(None)
    }

    fn count(&self, index_or_alias: &str) -> IndexResult<u64> {
        let conn = self.lock()?;
        let mut total = 0u64;
        for index in resolve(&conn, index_or_alias)? {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE index_name = ?1",
                params![index],
                |row| row.get(0),
            )?;
            total += count as u64;
        }
        Ok(total)
    }

    fn indices_for_alias(&self, alias: &str) -> IndexResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT index_name FROM aliases WHERE alias = ?1 ORDER BY index_name")?;
        let indices = stmt
            .query_map(params![alias], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(indices)
    }

    fn add_alias(&self, index: &str, alias: &str) -> IndexResult<()> {
        let conn = self.lock()?;
        if !index_exists(&conn, index)? {
            return Err(IndexError::IndexNotFound(index.to_string()));
        }
        conn.execute(
            "INSERT OR IGNORE INTO aliases (alias, index_name) VALUES (?1, ?2)",
            params![alias, index],
        )?;
        Ok(())
    }

    fn remove_alias(&self, index: &str, alias: &str) -> IndexResult<()> {
        self.lock()?.execute(
            "DELETE FROM aliases WHERE alias = ?1 AND index_name = ?2",
            params![alias, index],
        )?;
        Ok(())
    }

    fn swap_alias(&self, alias: &str, previous: &[String], next: &str) -> IndexResult<()> {
        let mut conn = self.lock()?;
        if !index_exists(&conn, next)? {
            return Err(IndexError::IndexNotFound(next.to_string()));
        }

        let tx = conn.transaction()?;
        for index in previous.iter().filter(|i| i.as_str() != next) {
            tx.execute(
                "DELETE FROM aliases WHERE alias = ?1 AND index_name = ?2",
                params![alias, index],
            )?;
        }
        tx.execute(
            "INSERT OR IGNORE INTO aliases (alias, index_name) VALUES (?1, ?2)",
            params![alias, next],
        )?;
        tx.commit()?;
        Ok(())
    }
}
