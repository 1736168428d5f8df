// # Board Source Trait
//
// Defines the interface for reading a kanban board.
//
// ## Implementations
//
// - Trello: `cardwatch-board-trello` crate
//
// ## Usage
//
// ```rust,ignore
// use cardwatch_core::BoardSource;
//
// let cards = source.fetch_cards().await?;
// let lists = source.fetch_lists().await?;
// ```

use async_trait::async_trait;

use crate::model::{BoardList, Card};

/// Trait for board source implementations
///
/// A board source performs exactly one API round trip per call. It does
/// not retry, cache, or schedule; those decisions belong to `PollEngine`.
///
/// Transport and HTTP failures are returned as errors rather than as empty
/// results, so the engine can tell an unreachable board from an empty one
/// in its logs.
#[async_trait]
pub trait BoardSource: Send + Sync {
    /// Fetch every card currently on the board, in API order
    ///
    /// Cards may carry a pre-filled `list_name` if the API embeds it.
    async fn fetch_cards(&self) -> Result<Vec<Card>, crate::Error>;

    /// Fetch every list on the board
    async fn fetch_lists(&self) -> Result<Vec<BoardList>, crate::Error>;

    /// Source name for logging (e.g., "trello")
    fn source_name(&self) -> &'static str;
}
