// # Snapshot Store Trait
//
// Defines the interface for persisting board state between polls.
//
// ## Purpose
//
// The snapshot store keeps restarts quiet by tracking:
// - The last observed list of every known card
// - Whether the bootstrap poll has ever completed (initialization flag)
//
// ## Implementations
//
// - File-based: pretty-printed JSON plus a marker file
// - Memory: for tests and ephemeral runs

use async_trait::async_trait;

use crate::model::{Card, Snapshot};

/// Trait for snapshot store implementations
///
/// The store is the sole reader and writer of the persisted form. It never
/// decides what to do with a missing or corrupted snapshot; it reports and
/// the engine applies its policy.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last persisted snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(Snapshot)`: The stored snapshot (empty if nothing was ever saved)
    /// - `Err(Error::SnapshotCorrupt)`: Stored data exists but is unreadable
    /// - `Err(Error)`: Other storage error
    async fn load(&self) -> Result<Snapshot, crate::Error>;

    /// Replace the persisted snapshot with one built from `cards`
    ///
    /// Unresolved list names are stored as `"Unknown"`.
    async fn save(&self, cards: &[Card]) -> Result<(), crate::Error>;

    /// Whether the initialization flag is still unset
    async fn is_first_run(&self) -> bool;

    /// Set the initialization flag
    ///
    /// Idempotent. Calling it again leaves the store initialized.
    async fn mark_initialized(&self) -> Result<(), crate::Error>;
}
