//! Core poll engine
//!
//! The PollEngine is responsible for:
//! - Fetching the board via BoardSource
//! - Detecting changes against the last persisted snapshot
//! - Delivering one notification per change via Notifier
//! - Persisting the fresh snapshot after every successful cycle
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ BoardSource │─── cards + lists ───┐
//! └─────────────┘                     │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │  PollEngine  │
//!                            └──────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌──────────────┐          ┌──────────────┐           ┌─────────────┐
//! │SnapshotStore │          │   Notifier   │           │   Events    │
//! │(load / save) │          │  (one by one)│           │  (monitor)  │
//! └──────────────┘          └──────────────┘           └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Fetch cards; an error or an empty board aborts the cycle untouched
//! 2. Fetch lists and resolve list names
//! 3. First run: persist and set the initialization flag, no notifications
//! 4. Otherwise: load snapshot, detect, notify sequentially, persist
//! 5. Wait the poll interval (retry delay after a failed fetch)
//!
//! The wait is measured from the end of a cycle, so a slow notification
//! batch pushes the next cycle back. Cycles never overlap.

use crate::config::{CorruptSnapshotPolicy, EngineConfig};
use crate::detector::{ChangeSummary, detect_changes};
use crate::error::Result;
use crate::model::{Card, ChangeEvent, Snapshot, resolve_list_names};
use crate::traits::{BoardSource, Notifier, SnapshotStore};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// Result of a single poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First run: state recorded, nothing sent
    Bootstrapped {
        cards: usize,
    },

    /// Steady-state cycle finished
    Completed {
        cards: usize,
        changes: ChangeSummary,
        delivered: usize,
        failed: usize,
        /// Changes left unsent because shutdown interrupted delivery
        skipped: usize,
    },

    /// Card fetch failed or returned nothing; persisted state untouched
    FetchFailed {
        reason: String,
    },
}

/// Events emitted by the PollEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        board_source: &'static str,
        notifier: &'static str,
    },

    /// A poll cycle finished
    CycleCompleted(CycleOutcome),

    /// A notification could not be delivered
    NotificationFailed {
        card_id: String,
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Core poll engine
///
/// ## Lifecycle
///
/// 1. Create with [`PollEngine::new()`]
/// 2. Start with [`PollEngine::run()`], passing a shutdown receiver
/// 3. Send `true` on the shutdown channel; the engine exits at the next
///    cycle boundary or notification pause
pub struct PollEngine {
    /// Board API client
    board: Box<dyn BoardSource>,

    /// Messaging API client
    notifier: Box<dyn Notifier>,

    /// Persisted board state
    store: Box<dyn SnapshotStore>,

    /// Wait after a completed cycle
    poll_interval: Duration,

    /// Wait after a failed fetch
    retry_delay: Duration,

    /// Pause after each notification
    notify_delay: Duration,

    /// Handling of an unreadable snapshot
    on_corrupt_snapshot: CorruptSnapshotPolicy,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl PollEngine {
    /// Create a new poll engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        board: Box<dyn BoardSource>,
        notifier: Box<dyn Notifier>,
        store: Box<dyn SnapshotStore>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            board,
            notifier,
            store,
            poll_interval: config.poll_interval(),
            retry_delay: config.retry_delay(),
            notify_delay: config.notify_delay(),
            on_corrupt_snapshot: config.on_corrupt_snapshot,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the poll loop until shutdown is requested
    ///
    /// Shutdown is requested by sending `true` on the watch channel or by
    /// dropping its sender. A cycle in progress finishes its fetch and
    /// persistence; pending notifications of that cycle are dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            board_source: self.board.source_name(),
            notifier: self.notifier.notifier_name(),
        });

        info!(
            "Watching board via {} (interval {:?}, notify delay {:?})",
            self.board.source_name(),
            self.poll_interval,
            self.notify_delay
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.run_cycle(&mut shutdown).await;

            let wait = match outcome {
                CycleOutcome::FetchFailed { .. } => self.retry_delay,
                _ => self.poll_interval,
            };
            self.emit_event(EngineEvent::CycleCompleted(outcome));

            info!("Next check in {:?}", wait);
            if wait_or_shutdown(&mut shutdown, wait).await {
                break;
            }
        }

        info!("Shutdown signal received, poll loop stopped");
        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Run exactly one poll cycle
    ///
    /// Notifications are still spaced by the notify delay.
    pub async fn poll_once(&self) -> CycleOutcome {
        let (_keep_open, mut shutdown) = watch::channel(false);
        let outcome = self.run_cycle(&mut shutdown).await;
        self.emit_event(EngineEvent::CycleCompleted(outcome.clone()));
        outcome
    }

    async fn run_cycle(&self, shutdown: &mut watch::Receiver<bool>) -> CycleOutcome {
        let first_run = self.store.is_first_run().await;

        let mut cards = match self.board.fetch_cards().await {
            Ok(cards) if cards.is_empty() => {
                warn!(
                    "Board returned no cards; treating as a failed fetch. Retrying in {:?}",
                    self.retry_delay
                );
                return CycleOutcome::FetchFailed {
                    reason: "board returned no cards".to_string(),
                };
            }
            Ok(cards) => cards,
            Err(e) => {
                error!(
                    "Failed to fetch cards: {}. Retrying in {:?}",
                    e, self.retry_delay
                );
                return CycleOutcome::FetchFailed {
                    reason: e.to_string(),
                };
            }
        };
        info!("{} cards found on board", cards.len());

        let lists = match self.board.fetch_lists().await {
            Ok(lists) => lists,
            Err(e) => {
                warn!("Failed to fetch lists, list names will be unresolved: {}", e);
                Vec::new()
            }
        };
        resolve_list_names(&mut cards, &lists);

        if first_run {
            return self.bootstrap(&cards).await;
        }

        let previous = match self.store.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => match self.on_corrupt_snapshot {
                CorruptSnapshotPolicy::TreatAsEmpty => {
                    error!(
                        "Failed to load snapshot: {}. Comparing against an empty snapshot; \
                         every card will be reported as new.",
                        e
                    );
                    Snapshot::new()
                }
                CorruptSnapshotPolicy::Rebaseline => {
                    error!(
                        "Failed to load snapshot: {}. Rebaselining without notifications.",
                        e
                    );
                    return self.bootstrap(&cards).await;
                }
            },
        };
        debug!("Previous snapshot loaded: {} cards", previous.len());

        let changes = detect_changes(&previous, &cards);
        let summary = ChangeSummary::from_changes(&changes);

        let (delivered, failed, skipped) = if changes.is_empty() {
            info!("No changes detected");
            (0, 0, 0)
        } else {
            info!("Sending {} notification(s)", changes.len());
            self.deliver(&changes, shutdown).await
        };

        if let Err(e) = self.store.save(&cards).await {
            error!("Failed to save snapshot: {}", e);
        }

        self.log_cards(&cards);
        info!(
            "Cycle complete: {} cards, {} moved, {} created, {} removed, {} delivered, {} failed",
            cards.len(),
            summary.moved,
            summary.created,
            summary.removed,
            delivered,
            failed
        );

        CycleOutcome::Completed {
            cards: cards.len(),
            changes: summary,
            delivered,
            failed,
            skipped,
        }
    }

    /// Record the board without notifying
    async fn bootstrap(&self, cards: &[Card]) -> CycleOutcome {
        info!(
            "First run: recording {} cards without sending notifications",
            cards.len()
        );

        match self.store.save(cards).await {
            Ok(()) => {
                if let Err(e) = self.store.mark_initialized().await {
                    error!("Failed to set initialization flag: {}", e);
                }
            }
            // Leave the flag unset so the next cycle bootstraps again
            Err(e) => error!("Failed to save initial snapshot: {}", e),
        }

        self.log_cards(cards);

        CycleOutcome::Bootstrapped { cards: cards.len() }
    }

    /// Deliver notifications one at a time
    ///
    /// Returns (delivered, failed, skipped).
    async fn deliver(
        &self,
        changes: &[ChangeEvent],
        shutdown: &mut watch::Receiver<bool>,
    ) -> (usize, usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;

        for (index, change) in changes.iter().enumerate() {
            let message = change.message();
            info!("Change detected ({}): {}", change.kind(), message);

            match self.notifier.send(&message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    error!(
                        "Failed to deliver notification for card {} ({}): {}",
                        change.card_id(),
                        change.card_name(),
                        e
                    );
                    self.emit_event(EngineEvent::NotificationFailed {
                        card_id: change.card_id().to_string(),
                        error: e.to_string(),
                    });
                }
            }

            if wait_or_shutdown(shutdown, self.notify_delay).await {
                let skipped = changes.len() - index - 1;
                if skipped > 0 {
                    warn!("Shutdown during delivery, {} notification(s) not sent", skipped);
                }
                return (delivered, failed, skipped);
            }
        }

        (delivered, failed, 0)
    }

    fn log_cards(&self, cards: &[Card]) {
        for (index, card) in cards.iter().enumerate() {
            debug!(
                "{}. {} - list: {}",
                index + 1,
                card.name,
                card.list_name_or_unknown()
            );
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Never block the poll loop on a slow consumer
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(event)) => {
                trace!("No event listener, dropping {:?}", event);
            }
        }
    }
}

/// Sleep for `wait` unless shutdown is requested first
///
/// Returns `true` when shutdown was requested (or the sender is gone).
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, wait: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }

    let sleep = tokio::time::sleep(wait);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}
