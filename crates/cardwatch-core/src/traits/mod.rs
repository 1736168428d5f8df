//! Core traits for the cardwatch system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`BoardSource`]: Fetch the current cards and lists of a board
//! - [`Notifier`]: Deliver one human-readable message
//! - [`SnapshotStore`]: Persist the last observed board state

pub mod board_source;
pub mod notifier;
pub mod snapshot_store;

pub use board_source::BoardSource;
pub use notifier::Notifier;
pub use snapshot_store::SnapshotStore;
