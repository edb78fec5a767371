//! Search index module
//!
//! This module defines the search index interface the crawler writes to,
//! the documents it stores, a SQLite-backed implementation, and the
//! publisher that moves the live alias to a completed generation.

mod document;
mod publisher;
mod sqlite;

pub use document::{AdministrationDocument, RepositoryDocument};
pub use publisher::{publish_generation, PublishOutcome};
pub use sqlite::SqliteIndex;

use serde_json::Value;
use thiserror::Error;

/// Errors raised by a search index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Alias '{alias}' could not be moved: {message}")]
    AliasUpdate { alias: String, message: String },
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// A document store with named indices and aliases
///
/// Upserts are keyed by `(index, id)`; writing the same key twice keeps the
/// latest body. Read operations accept either an index name or an alias.
pub trait SearchIndex: Send + Sync {
    /// Creates an index if it does not exist
    fn create_index(&self, index: &str) -> IndexResult<()>;

    /// Inserts or replaces the document `id` in `index`
    fn upsert(&self, index: &str, id: &str, document: &Value) -> IndexResult<()>;

    /// Fetches a document from an index or from the indices behind an alias
    fn get(&self, index_or_alias: &str, id: &str) -> IndexResult<Option<Value>>;

    /// Counts the documents of an index or of the indices behind an alias
    fn count(&self, index_or_alias: &str) -> IndexResult<u64>;

    /// Lists the indices an alias currently points at
    fn indices_for_alias(&self, alias: &str) -> IndexResult<Vec<String>>;

    /// Points `alias` at `index` in addition to its current targets
    fn add_alias(&self, index: &str, alias: &str) -> IndexResult<()>;

    /// Stops `alias` from pointing at `index`
    fn remove_alias(&self, index: &str, alias: &str) -> IndexResult<()>;

    /// Moves `alias` from the `previous` indices to `next`
    ///
    /// The default performs one call per removal and then the addition, so
    /// readers can briefly see no target. If any step fails, the removed
    /// targets are restored and `next` is not added. Stores with atomic alias
    /// updates override this.
    fn swap_alias(&self, alias: &str, previous: &[String], next: &str) -> IndexResult<()> {
        let mut removed = Vec::new();

        for index in previous.iter().filter(|i| i.as_str() != next) {
            match self.remove_alias(index, alias) {
                Ok(()) => {
                    tracing::debug!("Removed alias {} from {}", alias, index);
                    removed.push(index.clone());
                }
                Err(e) => {
                    tracing::warn!("Failed to remove alias {} from {}: {}", alias, index, e);
                    restore_aliases(self, alias, &removed);
                    return Err(IndexError::AliasUpdate {
                        alias: alias.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.add_alias(next, alias) {
            restore_aliases(self, alias, &removed);
            return Err(IndexError::AliasUpdate {
                alias: alias.to_string(),
                message: e.to_string(),
            });
        }

        tracing::debug!("Added alias {} to {}", alias, next);
        Ok(())
    }
}

fn restore_aliases<I: SearchIndex + ?Sized>(index: &I, alias: &str, removed: &[String]) {
    for target in removed {
        if let Err(e) = index.add_alias(target, alias) {
            tracing::error!("Failed to restore alias {} on {}: {}", alias, target, e);
        }
    }
}
