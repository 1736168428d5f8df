//! Test doubles and common utilities for poll engine contract tests
//!
//! This module provides minimal test doubles that verify engine behavior
//! without talking to any real API.

#![allow(dead_code)]

use cardwatch_core::config::EngineConfig;
use cardwatch_core::error::{Error, Result};
use cardwatch_core::model::{BoardList, Card, Snapshot};
use cardwatch_core::state::MemorySnapshotStore;
use cardwatch_core::traits::{BoardSource, Notifier, SnapshotStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted response to `fetch_cards()`
#[derive(Debug, Clone)]
pub enum Fetch {
    Cards(Vec<Card>),
    Fail(String),
}

/// A board source that replays a script of fetch results
///
/// The last entry repeats once the script is exhausted.
#[derive(Clone)]
pub struct ScriptedBoard {
    script: Arc<Mutex<VecDeque<Fetch>>>,
    last: Arc<Mutex<Fetch>>,
    lists: Arc<Mutex<Option<Vec<BoardList>>>>,
    fetch_count: Arc<AtomicUsize>,
}

impl ScriptedBoard {
    pub fn new(script: Vec<Fetch>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            last: Arc::new(Mutex::new(Fetch::Cards(Vec::new()))),
            lists: Arc::new(Mutex::new(Some(Vec::new()))),
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the lists returned by `fetch_lists()`
    pub fn with_lists(self, lists: Vec<BoardList>) -> Self {
        *self.lists.lock().unwrap() = Some(lists);
        self
    }

    /// Make `fetch_lists()` fail
    pub fn with_failing_lists(self) -> Self {
        *self.lists.lock().unwrap() = None;
        self
    }

    /// Number of `fetch_cards()` calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BoardSource for ScriptedBoard {
    async fn fetch_cards(&self) -> Result<Vec<Card>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        let step = match next {
            Some(step) => {
                *self.last.lock().unwrap() = step.clone();
                step
            }
            None => self.last.lock().unwrap().clone(),
        };

        match step {
            Fetch::Cards(cards) => Ok(cards),
            Fetch::Fail(reason) => Err(Error::board(reason)),
        }
    }

    async fn fetch_lists(&self) -> Result<Vec<BoardList>> {
        self.lists
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::board("lists unavailable"))
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A notifier that records every message and the (virtual) time it was sent
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, tokio::time::Instant)>>>,
    attempts: Arc<AtomicUsize>,
    fail_containing: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every message that contains `needle`
    pub fn failing_on(self, needle: &str) -> Self {
        self.fail_containing.lock().unwrap().push(needle.to_string());
        self
    }

    /// Successfully delivered messages, in order
    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }

    /// Delivery instants, in order
    pub fn sent_at(&self) -> Vec<tokio::time::Instant> {
        self.sent.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    /// Number of `send()` calls, including failures
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .fail_containing
            .lock()
            .unwrap()
            .iter()
            .any(|needle| message.contains(needle.as_str()));
        if should_fail {
            return Err(Error::notifier("messaging API unavailable"));
        }

        self.sent
            .lock()
            .unwrap()
            .push((message.to_string(), tokio::time::Instant::now()));
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

/// A memory store whose writes can be switched to fail
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: MemorySnapshotStore,
    fail_save: Arc<AtomicBool>,
    fail_mark: Arc<AtomicBool>,
    save_attempts: Arc<AtomicUsize>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already initialized store holding `snapshot`
    pub fn initialized(snapshot: Snapshot) -> Self {
        Self {
            inner: MemorySnapshotStore::with_snapshot(snapshot),
            ..Self::default()
        }
    }

    pub fn failing_save(self, fail: bool) -> Self {
        self.fail_save.store(fail, Ordering::SeqCst);
        self
    }

    pub fn failing_mark(self, fail: bool) -> Self {
        self.fail_mark.store(fail, Ordering::SeqCst);
        self
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.snapshot().await
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    /// Number of `save()` calls, including failures
    pub fn save_attempts(&self) -> usize {
        self.save_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SnapshotStore for FailingStore {
    async fn load(&self) -> Result<Snapshot> {
        self.inner.load().await
    }

    async fn save(&self, cards: &[Card]) -> Result<()> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(Error::snapshot("disk full"));
        }
        self.inner.save(cards).await
    }

    async fn is_first_run(&self) -> bool {
        self.inner.is_first_run().await
    }

    async fn mark_initialized(&self) -> Result<()> {
        if self.fail_mark.load(Ordering::SeqCst) {
            return Err(Error::snapshot("marker directory is read-only"));
        }
        self.inner.mark_initialized().await
    }
}

/// Build a card with a resolved list name
pub fn card(id: &str, id_list: &str, list_name: &str) -> Card {
    Card::new(id, format!("Card {}", id), id_list).with_list_name(list_name)
}

/// Default engine settings with deterministic timings
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        poll_interval_secs: 30,
        retry_delay_secs: None,
        notify_delay_secs: 2,
        event_channel_capacity: 100,
        ..EngineConfig::default()
    }
}

/// Engine settings with no pause between notifications
pub fn fast_engine_config() -> EngineConfig {
    EngineConfig {
        notify_delay_secs: 0,
        ..engine_config()
    }
}
