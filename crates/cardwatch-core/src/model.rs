//! Board data model
//!
//! Cards and lists are reconstructed from the board API on every poll.
//! A [`Snapshot`] is the persisted view of the last completed poll, and a
//! [`ChangeEvent`] is one difference between two of them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// List name used when a card's list cannot be resolved
pub const UNKNOWN_LIST: &str = "Unknown";

/// A card as fetched from the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Opaque card id, stable across polls
    pub id: String,
    /// Display name
    pub name: String,
    /// Id of the list the card currently belongs to
    pub id_list: String,
    /// Resolved list display name
    ///
    /// Board sources may pre-fill this with a list name embedded in the
    /// card payload; [`resolve_list_names`] overwrites it when the list
    /// lookup knows the card's `id_list`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
}

impl Card {
    /// Create a card with an unresolved list name
    pub fn new(id: impl Into<String>, name: impl Into<String>, id_list: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            id_list: id_list.into(),
            list_name: None,
        }
    }

    /// Set the resolved list name
    pub fn with_list_name(mut self, list_name: impl Into<String>) -> Self {
        self.list_name = Some(list_name.into());
        self
    }

    /// The list name, or [`UNKNOWN_LIST`] when unresolved
    pub fn list_name_or_unknown(&self) -> &str {
        self.list_name.as_deref().unwrap_or(UNKNOWN_LIST)
    }
}

/// A list (column) on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardList {
    /// Opaque list id
    pub id: String,
    /// Display name
    pub name: String,
}

impl BoardList {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Resolve every card's list name from the fetched lists
///
/// Lookup is by `id_list`. Cards whose list is not in `lists` keep the name
/// the board source embedded, or fall back to [`UNKNOWN_LIST`].
pub fn resolve_list_names(cards: &mut [Card], lists: &[BoardList]) {
    let names: HashMap<&str, &str> = lists
        .iter()
        .map(|list| (list.id.as_str(), list.name.as_str()))
        .collect();

    for card in cards.iter_mut() {
        match names.get(card.id_list.as_str()) {
            Some(name) => card.list_name = Some((*name).to_string()),
            None => {
                if card.list_name.is_none() {
                    card.list_name = Some(UNKNOWN_LIST.to_string());
                }
            }
        }
    }
}

/// Persisted state of a single card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardState {
    pub id: String,
    pub name: String,
    pub id_list: String,
    pub list_name: String,
}

impl From<&Card> for CardState {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id.clone(),
            name: card.name.clone(),
            id_list: card.id_list.clone(),
            list_name: card.list_name_or_unknown().to_string(),
        }
    }
}

/// Card id → last observed state, in fetch order
///
/// Serializes as a plain JSON object keyed by card id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    cards: IndexMap<String, CardState>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot that exactly reflects `cards`
    pub fn from_cards(cards: &[Card]) -> Self {
        let cards = cards
            .iter()
            .map(|card| (card.id.clone(), CardState::from(card)))
            .collect();
        Self { cards }
    }

    pub fn get(&self, card_id: &str) -> Option<&CardState> {
        self.cards.get(card_id)
    }

    pub fn contains(&self, card_id: &str) -> bool {
        self.cards.contains_key(card_id)
    }

    pub fn insert(&mut self, state: CardState) {
        self.cards.insert(state.id.clone(), state);
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Iterate card states in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &CardState> {
        self.cards.values()
    }
}

/// A detected difference between a snapshot and a fresh fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Card changed list
    Moved {
        card_id: String,
        card_name: String,
        from_list: String,
        to_list: String,
    },

    /// Card was not in the previous snapshot
    Created {
        card_id: String,
        card_name: String,
        list: String,
    },

    /// Card disappeared from the board
    Removed {
        card_id: String,
        card_name: String,
        /// Last persisted list name
        list: String,
    },
}

impl ChangeEvent {
    pub fn card_id(&self) -> &str {
        match self {
            ChangeEvent::Moved { card_id, .. }
            | ChangeEvent::Created { card_id, .. }
            | ChangeEvent::Removed { card_id, .. } => card_id,
        }
    }

    pub fn card_name(&self) -> &str {
        match self {
            ChangeEvent::Moved { card_name, .. }
            | ChangeEvent::Created { card_name, .. }
            | ChangeEvent::Removed { card_name, .. } => card_name,
        }
    }

    /// Short kind label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Moved { .. } => "moved",
            ChangeEvent::Created { .. } => "created",
            ChangeEvent::Removed { .. } => "removed",
        }
    }

    /// Human-readable notification text
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEvent::Moved {
                card_name,
                from_list,
                to_list,
                ..
            } => write!(
                f,
                "🔄 Card \"{}\" moved from \"{}\" to \"{}\"",
                card_name, from_list, to_list
            ),
            ChangeEvent::Created {
                card_name, list, ..
            } => write!(f, "🆕 New card \"{}\" created in list \"{}\"", card_name, list),
            ChangeEvent::Removed {
                card_name, list, ..
            } => write!(
                f,
                "🗑️ Card \"{}\" was removed from list \"{}\"",
                card_name, list
            ),
        }
    }
}
