//! Embedded per-test start-time store.
//!
//! A small single-file database keyed by `"<path>::<test-name>"` holding the
//! epoch-seconds start time recorded at test setup. The collector reads it
//! at failure time to scope the diagnostic window; the whole file is removed
//! at session end.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;

const STORE_FILE_NAME: &str = "diagnostics.db";

/// Store access errors. Never fatal to a run; callers log and move on.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create store directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Handle to the open start-time store.
pub struct DiagnosticStore {
    conn: Connection,
    file_path: PathBuf,
}

impl DiagnosticStore {
    /// Path of the store file under `base_dir`, whether or not it exists.
    pub fn file_path_for(base_dir: &Path) -> PathBuf {
        base_dir.join(STORE_FILE_NAME)
    }

    /// Open (creating if needed) the store file under `base_dir`.
    pub fn open(base_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(base_dir).map_err(|source| StoreError::CreateDir {
            path: base_dir.display().to_string(),
            source,
        })?;
        let file_path = base_dir.join(STORE_FILE_NAME);
        let conn = Connection::open(&file_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS test_start_times (
                 test_name TEXT PRIMARY KEY,
                 start_time INTEGER NOT NULL
             )",
            [],
        )?;
        Ok(Self { conn, file_path })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Record a test's start time; a re-run of the same test overwrites the
    /// previous record.
    pub fn insert_start_time(&self, test_name: &str, start_time: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO test_start_times (test_name, start_time) VALUES (?1, ?2)",
            params![test_name, start_time],
        )?;
        Ok(())
    }

    /// Look up a test's recorded start time.
    pub fn get_start_time(&self, test_name: &str) -> Result<Option<i64>, StoreError> {
        let start_time = self
            .conn
            .query_row(
                "SELECT start_time FROM test_start_times WHERE test_name = ?1",
                params![test_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(start_time)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiagnosticStore::open(dir.path()).unwrap();
        store
            .insert_start_time("tests/virt/test_vm.rs::test_vm_boot", 1_700_000_000)
            .unwrap();
        assert_eq!(
            store
                .get_start_time("tests/virt/test_vm.rs::test_vm_boot")
                .unwrap(),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_get_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiagnosticStore::open(dir.path()).unwrap();
        assert_eq!(store.get_start_time("tests/x.rs::test_missing").unwrap(), None);
    }

    #[test]
    fn test_insert_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiagnosticStore::open(dir.path()).unwrap();
        store.insert_start_time("tests/x.rs::test_a", 100).unwrap();
        store.insert_start_time("tests/x.rs::test_a", 200).unwrap();
        assert_eq!(store.get_start_time("tests/x.rs::test_a").unwrap(), Some(200));
    }

    #[test]
    fn test_store_file_lives_under_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiagnosticStore::open(dir.path()).unwrap();
        assert!(store.file_path().starts_with(dir.path()));
        assert!(store.file_path().exists());
    }
}
