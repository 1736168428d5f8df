//! Change detection
//!
//! Diffs the previous [`Snapshot`] against a freshly fetched card set.
//!
//! ## Ordering
//!
//! Events for current cards come first, in fetch order. Events for removed
//! cards follow, in snapshot order. Nothing is sorted.
//!
//! ## Comparison Key
//!
//! A card counts as moved when its `id_list` changes. Two distinct lists
//! that share a display name are still different lists.

use crate::model::{Card, ChangeEvent, Snapshot};
use std::collections::HashSet;

/// Detect list-membership changes between `previous` and `current`
///
/// `current` must already have list names resolved. This function performs
/// no I/O and is deterministic in its inputs.
pub fn detect_changes(previous: &Snapshot, current: &[Card]) -> Vec<ChangeEvent> {
    let mut changes = Vec::new();

    for card in current {
        match previous.get(&card.id) {
            None => changes.push(ChangeEvent::Created {
                card_id: card.id.clone(),
                card_name: card.name.clone(),
                list: card.list_name_or_unknown().to_string(),
            }),
            Some(before) if before.id_list != card.id_list => {
                changes.push(ChangeEvent::Moved {
                    card_id: card.id.clone(),
                    card_name: card.name.clone(),
                    from_list: before.list_name.clone(),
                    to_list: card.list_name_or_unknown().to_string(),
                })
            }
            Some(_) => {}
        }
    }

    let seen: HashSet<&str> = current.iter().map(|card| card.id.as_str()).collect();
    for gone in previous.iter().filter(|state| !seen.contains(state.id.as_str())) {
        changes.push(ChangeEvent::Removed {
            card_id: gone.id.clone(),
            card_name: gone.name.clone(),
            list: gone.list_name.clone(),
        });
    }

    changes
}

/// Per-kind event counts for a poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub moved: usize,
    pub created: usize,
    pub removed: usize,
}

impl ChangeSummary {
    pub fn from_changes(changes: &[ChangeEvent]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change {
                ChangeEvent::Moved { .. } => summary.moved += 1,
                ChangeEvent::Created { .. } => summary.created += 1,
                ChangeEvent::Removed { .. } => summary.removed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.moved + self.created + self.removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CardState;

    fn card(id: &str, id_list: &str, list_name: &str) -> Card {
        Card::new(id, format!("Card {}", id), id_list).with_list_name(list_name)
    }

    fn snapshot(cards: &[Card]) -> Snapshot {
        Snapshot::from_cards(cards)
    }

    #[test]
    fn test_move_then_create_in_fetch_order() {
        let previous = snapshot(&[card("c1", "A", "List A")]);
        let current = vec![card("c1", "B", "List B"), card("c2", "A", "List A")];

        let changes = detect_changes(&previous, &current);

        assert_eq!(
            changes,
            vec![
                ChangeEvent::Moved {
                    card_id: "c1".into(),
                    card_name: "Card c1".into(),
                    from_list: "List A".into(),
                    to_list: "List B".into(),
                },
                ChangeEvent::Created {
                    card_id: "c2".into(),
                    card_name: "Card c2".into(),
                    list: "List A".into(),
                },
            ]
        );
    }

    #[test]
    fn test_missing_card_is_removed_with_stored_list_name() {
        let previous = snapshot(&[card("c1", "A", "List A"), card("c2", "A", "List A")]);
        let current = vec![card("c1", "A", "List A")];

        let changes = detect_changes(&previous, &current);

        assert_eq!(
            changes,
            vec![ChangeEvent::Removed {
                card_id: "c2".into(),
                card_name: "Card c2".into(),
                list: "List A".into(),
            }]
        );
    }

    #[test]
    fn test_unchanged_board_yields_nothing() {
        let cards = vec![card("c1", "A", "List A"), card("c2", "B", "List B")];
        let previous = snapshot(&cards);

        assert!(detect_changes(&previous, &cards).is_empty());
    }

    #[test]
    fn test_renamed_list_is_not_a_move() {
        let previous = snapshot(&[card("c1", "A", "Old name")]);
        let current = vec![card("c1", "A", "New name")];

        assert!(detect_changes(&previous, &current).is_empty());
    }

    #[test]
    fn test_same_display_name_different_list_is_a_move() {
        let previous = snapshot(&[card("c1", "A", "Review")]);
        let current = vec![card("c1", "B", "Review")];

        let changes = detect_changes(&previous, &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind(), "moved");
    }

    #[test]
    fn test_removed_follow_current_events_in_snapshot_order() {
        let mut previous = Snapshot::new();
        for id in ["z", "a", "m"] {
            previous.insert(CardState {
                id: id.into(),
                name: id.into(),
                id_list: "L".into(),
                list_name: "List".into(),
            });
        }
        let current = vec![card("new", "L", "List")];

        let changes = detect_changes(&previous, &current);
        let ids: Vec<&str> = changes.iter().map(|c| c.card_id()).collect();

        assert_eq!(ids, vec!["new", "z", "a", "m"]);
        assert_eq!(changes[0].kind(), "created");
    }

    #[test]
    fn test_counts_match_set_differences() {
        // previous: a(L1) b(L1) c(L2) d(L2)
        // current:  a(L1) b(L2) e(L1) f(L3)
        let previous = snapshot(&[
            card("a", "L1", "One"),
            card("b", "L1", "One"),
            card("c", "L2", "Two"),
            card("d", "L2", "Two"),
        ]);
        let current = vec![
            card("a", "L1", "One"),
            card("b", "L2", "Two"),
            card("e", "L1", "One"),
            card("f", "L3", "Three"),
        ];

        let changes = detect_changes(&previous, &current);
        let summary = ChangeSummary::from_changes(&changes);

        assert_eq!(summary, ChangeSummary { moved: 1, created: 2, removed: 2 });
        assert_eq!(summary.total(), changes.len());
    }

    #[test]
    fn test_empty_snapshot_reports_every_card_created() {
        let current = vec![card("c1", "A", "List A"), card("c2", "B", "List B")];

        let changes = detect_changes(&Snapshot::new(), &current);

        assert_eq!(ChangeSummary::from_changes(&changes).created, 2);
    }
}
