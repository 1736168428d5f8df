// # File Snapshot Store
//
// File-based implementation of SnapshotStore with crash recovery.
//
// ## Purpose
//
// Keeps the last observed board state across daemon restarts so that
// already-known cards are not reported again.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good snapshot
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "5f1a...": {
//     "id": "5f1a...",
//     "name": "Write release notes",
//     "idList": "5e9b...",
//     "listName": "Doing"
//   }
// }
// ```
//
// The initialization marker is a separate file holding the RFC 3339 time
// it was created. Only its presence matters.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::model::{Card, Snapshot};
use crate::traits::snapshot_store::SnapshotStore;

/// File-based snapshot store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use cardwatch_core::model::Card;
/// use cardwatch_core::state::FileSnapshotStore;
/// use cardwatch_core::traits::SnapshotStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileSnapshotStore::new(
///         "/var/lib/cardwatch/state.json",
///         "/var/lib/cardwatch/.initialized",
///     )
///     .await?;
///
///     store.save(&[Card::new("c1", "Card", "l1").with_list_name("To Do")]).await?;
///     let snapshot = store.load().await?;
///     assert_eq!(snapshot.get("c1").unwrap().list_name, "To Do");
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    marker_path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a file snapshot store
    ///
    /// Parent directories of both files are created if needed. Nothing is
    /// read until [`SnapshotStore::load`] is called.
    pub async fn new<P: AsRef<Path>, M: AsRef<Path>>(path: P, marker_path: M) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let marker_path = marker_path.as_ref().to_path_buf();

        for file in [&path, &marker_path] {
            if let Some(parent) = file.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self { path, marker_path })
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the initialization marker
    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Read and parse one snapshot file
    ///
    /// A missing file is an empty snapshot.
    async fn read_snapshot(path: &Path) -> Result<Snapshot, Error> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Snapshot file does not exist: {}", path.display());
                return Ok(Snapshot::new());
            }
            Err(e) => {
                return Err(Error::snapshot(format!(
                    "Failed to read snapshot file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            Error::snapshot_corrupt(format!(
                "Failed to parse snapshot file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Recover from the backup after the main file failed to parse
    async fn recover_from_backup(&self, cause: Error) -> Result<Snapshot, Error> {
        tracing::warn!("{}. Attempting recovery from backup.", cause);

        let backup_path = Self::backup_path(&self.path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found");
            return Err(cause);
        }

        match Self::read_snapshot(&backup_path).await {
            Ok(snapshot) => {
                tracing::info!("Recovered snapshot from backup: {} cards", snapshot.len());

                if let Err(e) = fs::copy(&backup_path, &self.path).await {
                    tracing::error!("Failed to restore snapshot file from backup: {}", e);
                }

                Ok(snapshot)
            }
            Err(backup_err) => {
                tracing::error!("Backup also unreadable: {}", backup_err);
                Err(cause)
            }
        }
    }

    /// Write the snapshot file atomically
    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| Error::snapshot(format!("Failed to serialize snapshot: {}", e)))?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Keep the previous good snapshot as backup
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::snapshot(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Snapshot written to file: {}", self.path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Snapshot, Error> {
        match Self::read_snapshot(&self.path).await {
            Ok(snapshot) => {
                tracing::debug!("Loaded snapshot from file: {} cards", snapshot.len());
                Ok(snapshot)
            }
            Err(e) if e.is_corruption() => self.recover_from_backup(e).await,
            Err(e) => Err(e),
        }
    }

    async fn save(&self, cards: &[Card]) -> Result<(), Error> {
        self.write_snapshot(&Snapshot::from_cards(cards)).await
    }

    async fn is_first_run(&self) -> bool {
        match fs::try_exists(&self.marker_path).await {
            Ok(exists) => !exists,
            Err(e) => {
                tracing::warn!(
                    "Cannot check initialization marker {}: {}. Assuming first run.",
                    self.marker_path.display(),
                    e
                );
                true
            }
        }
    }

    async fn mark_initialized(&self) -> Result<(), Error> {
        if fs::try_exists(&self.marker_path).await.unwrap_or(false) {
            return Ok(());
        }

        let stamp = chrono::Utc::now().to_rfc3339();
        fs::write(&self.marker_path, stamp).await.map_err(|e| {
            Error::snapshot(format!(
                "Failed to write initialization marker {}: {}",
                self.marker_path.display(),
                e
            ))
        })?;

        tracing::debug!("Initialization marker written: {}", self.marker_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNKNOWN_LIST;
    use tempfile::tempdir;

    async fn store_in(dir: &Path) -> FileSnapshotStore {
        FileSnapshotStore::new(dir.join("state.json"), dir.join(".initialized"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let snapshot = store.load().await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let cards = vec![
            Card::new("c1", "Write docs", "l1").with_list_name("Doing"),
            Card::new("c2", "Orphan", "l9"),
        ];
        store.save(&cards).await.unwrap();

        // A new instance sees the persisted state
        let store2 = store_in(dir.path()).await;
        let snapshot = store2.load().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        let c1 = snapshot.get("c1").unwrap();
        assert_eq!(c1.name, "Write docs");
        assert_eq!(c1.id_list, "l1");
        assert_eq!(c1.list_name, "Doing");
        assert_eq!(snapshot.get("c2").unwrap().list_name, UNKNOWN_LIST);
    }

    #[tokio::test]
    async fn test_save_is_pretty_printed() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        store
            .save(&[Card::new("c1", "Card", "l1").with_list_name("To Do")])
            .await
            .unwrap();

        let text = fs::read_to_string(store.path()).await.unwrap();
        assert!(text.contains("\n  \"c1\": {"));
        assert!(text.contains("\"idList\": \"l1\""));
        assert!(text.contains("\"listName\": \"To Do\""));
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        store.save(&[Card::new("old", "Old", "l1")]).await.unwrap();
        store.save(&[Card::new("new", "New", "l1")]).await.unwrap();

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains("new"));
        assert!(!snapshot.contains("old"));
    }

    #[tokio::test]
    async fn test_corruption_recovery_from_backup() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        store.save(&[Card::new("c1", "First", "l1")]).await.unwrap();
        // Second write moves the first snapshot into the backup
        store.save(&[Card::new("c2", "Second", "l1")]).await.unwrap();

        let backup_path = FileSnapshotStore::backup_path(store.path());
        assert!(backup_path.exists(), "Backup file should exist after write");

        fs::write(store.path(), b"corrupted json data").await.unwrap();

        let recovered = store.load().await.unwrap();
        assert!(recovered.contains("c1"), "Backup should hold the previous snapshot");

        // Main file was restored from backup
        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded, recovered);
    }

    #[tokio::test]
    async fn test_corruption_without_backup_is_reported() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        fs::write(store.path(), b"{ not json").await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(err.is_corruption(), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_initialization_marker() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        assert!(store.is_first_run().await);

        store.mark_initialized().await.unwrap();
        assert!(!store.is_first_run().await);

        let stamp = fs::read_to_string(store.marker_path()).await.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());

        // Idempotent: second call keeps the original timestamp
        store.mark_initialized().await.unwrap();
        let again = fs::read_to_string(store.marker_path()).await.unwrap();
        assert_eq!(stamp, again);
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let store = FileSnapshotStore::new(nested.join("state.json"), nested.join(".initialized"))
            .await
            .unwrap();
        store.save(&[Card::new("c1", "Card", "l1")]).await.unwrap();

        assert!(nested.join("state.json").exists());
    }
}
