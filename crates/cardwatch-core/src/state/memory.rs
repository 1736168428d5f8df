// # Memory Snapshot Store
//
// In-memory implementation of SnapshotStore.
//
// ## Purpose
//
// Provides a snapshot store that doesn't persist across restarts.
// Useful for testing and for runs where a notification-free bootstrap
// after every restart is acceptable.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - Every process start begins with a first-run (silent) cycle

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{Card, Snapshot};
use crate::traits::snapshot_store::SnapshotStore;

/// In-memory snapshot store implementation
///
/// Clones share the same underlying state, so a test can keep a handle
/// while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    snapshot: Arc<RwLock<Snapshot>>,
    initialized: Arc<AtomicBool>,
}

impl MemorySnapshotStore {
    /// Create a new empty, uninitialized store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an initialized store holding `snapshot`
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(snapshot)),
            initialized: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Current snapshot contents
    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Whether the initialization flag is set
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Snapshot, Error> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, cards: &[Card]) -> Result<(), Error> {
        *self.snapshot.write().await = Snapshot::from_cards(cards);
        Ok(())
    }

    async fn is_first_run(&self) -> bool {
        !self.initialized.load(Ordering::SeqCst)
    }

    async fn mark_initialized(&self) -> Result<(), Error> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }
}
