// # cardwatch-core
//
// Core library for the board change notifier.
//
// ## Architecture Overview
//
// This library provides the core functionality for watching a kanban board:
// - **BoardSource**: Trait for fetching the current cards and lists
// - **Notifier**: Trait for delivering one human-readable message per change
// - **SnapshotStore**: Trait for persisting the last observed board state
// - **detect_changes**: Pure diff between a snapshot and a fresh fetch
// - **PollEngine**: Core loop that orchestrates fetch → detect → notify → persist
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from API clients
// 2. **Pure Detection**: Change detection has no I/O and is unit-testable
// 3. **Serialized Cycles**: Exactly one poll cycle runs at a time
// 4. **Library-First**: The daemon is a thin wiring layer over this crate
// 5. **Best-Effort Persistence**: Storage failures are logged, never fatal

pub mod model;
pub mod traits;
pub mod detector;
pub mod engine;
pub mod config;
pub mod error;
pub mod state;

// Re-export core types for convenience
pub use model::{BoardList, Card, CardState, ChangeEvent, Snapshot, UNKNOWN_LIST};
pub use traits::{BoardSource, Notifier, SnapshotStore};
pub use detector::{ChangeSummary, detect_changes};
pub use engine::{CycleOutcome, EngineEvent, PollEngine};
pub use config::{CorruptSnapshotPolicy, EngineConfig, StateStoreConfig, WatchConfig};
pub use error::{Error, Result};
pub use state::{FileSnapshotStore, MemorySnapshotStore};
