//! Interaction Store: an append-only, size-bounded log of past exchanges
//! backed by a UTF-8 JSON file.
//!
//! The store is the sole owner of its records. Lookups hand out clones and
//! writes are serialized behind a single write lock, so concurrent turns see
//! the last-committed snapshot.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::warn;

use sage_core::{InteractionRecord, MemoryError};

pub struct MemoryStore {
    path: PathBuf,
    retention: usize,
    log: RwLock<Vec<InteractionRecord>>,
}

impl MemoryStore {
    /// Opens the store, loading any persisted log. A missing or corrupt file
    /// starts an empty log rather than failing construction.
    pub fn load(path: impl Into<PathBuf>, retention: usize) -> Self {
        let path = path.into();
        let log = read_log(&path);
        Self { path, retention, log: RwLock::new(log) }
    }

    /// Appends one turn and synchronously persists the most recent
    /// `retention` records. On a write failure the in-memory log keeps the
    /// full uncapped history for the remainder of the process and the error
    /// is reported to the caller.
    ///
    /// Every append re-serializes the whole capped log: O(n) per write.
    /// Acceptable at the retention cap, but worth revisiting before raising
    /// the cap by orders of magnitude.
    pub async fn record(
        &self,
        user_text: impl Into<String>,
        agent_text: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Result<(), MemoryError> {
        let record = InteractionRecord::new(user_text, agent_text, metadata);
        let mut log = self.log.write().await;
        log.push(record);

        let start = log.len().saturating_sub(self.retention);
        let capped = &log[start..];
        let serialized = serde_json::to_vec_pretty(capped)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    MemoryError::Persist { path: self.path.clone(), source }
                })?;
            }
        }
        tokio::fs::write(&self.path, serialized)
            .await
            .map_err(|source| MemoryError::Persist { path: self.path.clone(), source })
    }

    /// Case-insensitive substring lookup against user or agent text, scanned
    /// newest-first, stopping once `limit` matches are collected. Linear scan
    /// over the log: O(n) per call.
    pub async fn lookup(&self, query_text: &str, limit: usize) -> Vec<InteractionRecord> {
        let needle = query_text.to_lowercase();
        let log = self.log.read().await;
        let mut matches = Vec::new();
        for record in log.iter().rev() {
            if record.matches(&needle) {
                matches.push(record.clone());
                if matches.len() >= limit {
                    break;
                }
            }
        }
        matches
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_log(path: &Path) -> Vec<InteractionRecord> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(error) => {
            warn!(
                event_name = "memory.load.corrupt",
                path = %path.display(),
                error = %error,
                "persisted interaction log was unreadable, starting empty"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::MemoryStore;

    fn store_at(dir: &tempfile::TempDir, retention: usize) -> MemoryStore {
        MemoryStore::load(dir.path().join("memory.json"), retention)
    }

    #[tokio::test]
    async fn round_trips_records_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_at(&dir, 100);

        for turn in 0..5 {
            store
                .record(format!("question {turn}"), format!("answer {turn}"), Map::new())
                .await
                .expect("record");
        }

        let reloaded = store_at(&dir, 100);
        assert_eq!(reloaded.len().await, 5);
        let matched = reloaded.lookup("question 3", 10).await;
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].agent_text, "answer 3");
    }

    #[tokio::test]
    async fn persisting_truncates_to_retention_cap() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_at(&dir, 100);

        for turn in 0..105 {
            store.record(format!("turn {turn}"), "ok", Map::new()).await.expect("record");
        }
        // In-memory keeps everything; the persisted file is capped.
        assert_eq!(store.len().await, 105);

        let reloaded = store_at(&dir, 100);
        assert_eq!(reloaded.len().await, 100);
        assert!(reloaded.lookup("turn 104", 1).await.len() == 1, "newest record survives");
        assert!(reloaded.lookup("turn 0", 1).await.is_empty(), "oldest records evicted");
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_and_newest_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_at(&dir, 100);

        store.record("Tell me about RUST", "sure", Map::new()).await.expect("record");
        store.record("unrelated", "rust is nice though", Map::new()).await.expect("record");
        store.record("more rust please", "ok", Map::new()).await.expect("record");

        let matches = store.lookup("rust", 2).await;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].user_text, "more rust please");
        assert_eq!(matches[1].user_text, "unrelated");
    }

    #[tokio::test]
    async fn lookup_without_matches_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_at(&dir, 100);
        store.record("hello", "world", Map::new()).await.expect("record");

        assert!(store.lookup("xyz", 5).await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{ not json").expect("write corrupt file");

        let store = MemoryStore::load(path, 100);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn persist_failure_keeps_in_memory_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A directory at the target path makes the write fail.
        let path = dir.path().join("memory.json");
        std::fs::create_dir(&path).expect("create blocking dir");

        let store = MemoryStore::load(&path, 100);
        let result = store.record("hello", "world", Map::new()).await;

        assert!(result.is_err());
        assert_eq!(store.len().await, 1);
    }
}
