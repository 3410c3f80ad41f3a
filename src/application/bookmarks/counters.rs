//! Incremental bookkeeping for `bookmark_user_counters`.
//!
//! Every bookmark mutation produces a delta that is applied to the stored counter
//! row instead of recounting the user's bookmarks. `None` means "nothing to
//! write", which lets callers skip a no-op upsert.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::bookmarks::{BookmarkCounters, BookmarkListRow};

/// Counter key for bookmarks that do not belong to a collection.
///
/// Collection ids are UUIDs, so this key cannot collide with a real collection.
pub const UNCOLLECTED_KEY: &str = "__uncollected__";

pub fn collection_key_for_id(collection_id: Option<Uuid>) -> String {
    match collection_id {
        Some(id) => id.to_string(),
        None => UNCOLLECTED_KEY.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkCounterDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_unread: Option<BTreeMap<String, i64>>,
}

impl BookmarkCounterDelta {
    /// Nets two deltas. A present `total` stays present even when it sums to zero;
    /// unread counts and collection entries that cancel out are dropped.
    pub fn combine(&self, other: &BookmarkCounterDelta) -> BookmarkCounterDelta {
        let total = match (self.total, other.total) {
            (None, None) => None,
            (left, right) => Some(left.unwrap_or(0) + right.unwrap_or(0)),
        };

        let unread = self.unread.unwrap_or(0) + other.unread.unwrap_or(0);

        let mut collections = BTreeMap::new();
        for map in [&self.collection_unread, &other.collection_unread]
            .into_iter()
            .flatten()
        {
            for (key, value) in map {
                *collections.entry(key.clone()).or_insert(0) += value;
            }
        }

        BookmarkCounterDelta {
            total,
            unread: non_zero(unread),
            collection_unread: pruned(collections),
        }
    }
}

pub fn build_addition_counter_delta(row: &BookmarkListRow) -> BookmarkCounterDelta {
    let mut delta = BookmarkCounterDelta {
        total: Some(1),
        ..Default::default()
    };

    if row.is_unread() {
        delta.unread = Some(1);
        delta.collection_unread = Some(BTreeMap::from([(
            collection_key_for_id(row.collection_id),
            1,
        )]));
    }

    delta
}

pub fn build_removal_counter_delta(rows: &[BookmarkListRow]) -> Option<BookmarkCounterDelta> {
    if rows.is_empty() {
        return None;
    }

    let mut unread = 0_i64;
    let mut collections = BTreeMap::new();
    for row in rows.iter().filter(|row| row.is_unread()) {
        unread += 1;
        *collections
            .entry(collection_key_for_id(row.collection_id))
            .or_insert(0) -= 1;
    }

    Some(BookmarkCounterDelta {
        total: Some(-(rows.len() as i64)),
        unread: non_zero(-unread),
        collection_unread: pruned(collections),
    })
}

/// Net counter effect of moving one bookmark from `previous` to `next`.
pub fn build_update_counter_delta(
    previous: &BookmarkListRow,
    next: &BookmarkListRow,
) -> Option<BookmarkCounterDelta> {
    let was_unread = previous.is_unread();
    let is_unread = next.is_unread();
    if was_unread == is_unread && previous.collection_id == next.collection_id {
        return None;
    }

    let mut collections = BTreeMap::new();
    if was_unread {
        *collections
            .entry(collection_key_for_id(previous.collection_id))
            .or_insert(0) -= 1;
    }
    if is_unread {
        *collections
            .entry(collection_key_for_id(next.collection_id))
            .or_insert(0) += 1;
    }

    let unread = i64::from(is_unread) - i64::from(was_unread);
    let collection_unread = pruned(collections);
    if unread == 0 && collection_unread.is_none() {
        return None;
    }

    Some(BookmarkCounterDelta {
        total: None,
        unread: non_zero(unread),
        collection_unread,
    })
}

impl BookmarkCounters {
    /// Applies a delta, clamping every counter at zero and dropping emptied collections.
    pub fn apply(&mut self, delta: &BookmarkCounterDelta) {
        if let Some(total) = delta.total {
            self.total_count = (self.total_count + total).max(0);
        }
        if let Some(unread) = delta.unread {
            self.unread_count = (self.unread_count + unread).max(0);
        }
        if let Some(collections) = &delta.collection_unread {
            for (key, change) in collections {
                let current = self.collection_unread_counts.get(key).copied().unwrap_or(0);
                let updated = (current + change).max(0);
                if updated == 0 {
                    self.collection_unread_counts.remove(key);
                } else {
                    self.collection_unread_counts.insert(key.clone(), updated);
                }
            }
        }
    }
}

fn non_zero(value: i64) -> Option<i64> {
    (value != 0).then_some(value)
}

fn pruned(mut collections: BTreeMap<String, i64>) -> Option<BTreeMap<String, i64>> {
    collections.retain(|_, value| *value != 0);
    (!collections.is_empty()).then_some(collections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bookmarks::ReadState;

    fn row(read_state: ReadState, collection_id: Option<Uuid>) -> BookmarkListRow {
        BookmarkListRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            post_id: "101".to_string(),
            collection_id,
            read_state,
            created_at: "2024-05-01T10:00:00+00:00".to_string(),
            slug: None,
            title: None,
            edition_code: None,
            featured_image: None,
        }
    }

    #[test]
    fn adding_a_read_bookmark_only_bumps_total() {
        let delta = build_addition_counter_delta(&row(ReadState::Read, Some(Uuid::new_v4())));
        assert_eq!(
            delta,
            BookmarkCounterDelta {
                total: Some(1),
                ..Default::default()
            }
        );
        assert_eq!(
            serde_json::to_value(&delta).expect("json"),
            serde_json::json!({ "total": 1 })
        );
    }

    #[test]
    fn adding_an_unread_bookmark_bumps_its_collection() {
        let collection = Uuid::new_v4();
        let delta = build_addition_counter_delta(&row(ReadState::Unread, Some(collection)));
        assert_eq!(delta.total, Some(1));
        assert_eq!(delta.unread, Some(1));
        assert_eq!(
            delta.collection_unread,
            Some(BTreeMap::from([(collection.to_string(), 1)]))
        );
    }

    #[test]
    fn uncollected_bookmarks_use_sentinel_key() {
        let delta = build_addition_counter_delta(&row(ReadState::Unread, None));
        let map = delta.collection_unread.expect("collection counts");
        assert_eq!(map.get(UNCOLLECTED_KEY), Some(&1));
        assert!(Uuid::parse_str(UNCOLLECTED_KEY).is_err());
    }

    #[test]
    fn removing_nothing_yields_no_delta() {
        assert_eq!(build_removal_counter_delta(&[]), None);
    }

    #[test]
    fn removal_counts_only_unread_rows_per_collection() {
        let a = Uuid::new_v4();
        let rows = vec![
            row(ReadState::Unread, Some(a)),
            row(ReadState::Unread, Some(a)),
            row(ReadState::Read, Some(a)),
            row(ReadState::Unread, None),
        ];
        let delta = build_removal_counter_delta(&rows).expect("delta");
        assert_eq!(delta.total, Some(-4));
        assert_eq!(delta.unread, Some(-3));
        assert_eq!(
            delta.collection_unread,
            Some(BTreeMap::from([
                (a.to_string(), -2),
                (UNCOLLECTED_KEY.to_string(), -1),
            ]))
        );
    }

    #[test]
    fn removing_read_rows_only_changes_total() {
        let delta = build_removal_counter_delta(&[row(ReadState::Read, None)]).expect("delta");
        assert_eq!(
            delta,
            BookmarkCounterDelta {
                total: Some(-1),
                ..Default::default()
            }
        );
    }

    #[test]
    fn unchanged_revision_yields_no_delta() {
        let before = row(ReadState::Unread, None);
        let mut after = before.clone();
        after.title = Some("edited".to_string());
        assert_eq!(build_update_counter_delta(&before, &after), None);
    }

    #[test]
    fn moving_a_read_bookmark_between_collections_yields_no_delta() {
        let before = row(ReadState::Read, Some(Uuid::new_v4()));
        let mut after = before.clone();
        after.collection_id = Some(Uuid::new_v4());
        assert_eq!(build_update_counter_delta(&before, &after), None);
    }

    #[test]
    fn marking_read_decrements_unread_and_collection() {
        let collection = Uuid::new_v4();
        let before = row(ReadState::Unread, Some(collection));
        let mut after = before.clone();
        after.read_state = ReadState::Read;

        let delta = build_update_counter_delta(&before, &after).expect("delta");
        assert_eq!(delta.total, None);
        assert_eq!(delta.unread, Some(-1));
        assert_eq!(
            delta.collection_unread,
            Some(BTreeMap::from([(collection.to_string(), -1)]))
        );
    }

    #[test]
    fn moving_an_unread_bookmark_shifts_collection_counts() {
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        let before = row(ReadState::Unread, Some(from));
        let mut after = before.clone();
        after.collection_id = Some(to);

        let delta = build_update_counter_delta(&before, &after).expect("delta");
        assert_eq!(delta.unread, None);
        assert_eq!(
            delta.collection_unread,
            Some(BTreeMap::from([(from.to_string(), -1), (to.to_string(), 1)]))
        );
    }

    #[test]
    fn add_then_remove_nets_to_zero_total() {
        let bookmark = row(ReadState::Unread, Some(Uuid::new_v4()));
        let added = build_addition_counter_delta(&bookmark);
        let removed = build_removal_counter_delta(std::slice::from_ref(&bookmark)).expect("delta");
        assert_eq!(
            added.combine(&removed),
            BookmarkCounterDelta {
                total: Some(0),
                ..Default::default()
            }
        );
    }

    #[test]
    fn applying_deltas_clamps_and_prunes() {
        let collection = Uuid::new_v4();
        let mut counters = BookmarkCounters::empty(Uuid::nil());

        counters.apply(&build_addition_counter_delta(&row(
            ReadState::Unread,
            Some(collection),
        )));
        assert_eq!(counters.total_count, 1);
        assert_eq!(counters.unread_count, 1);
        assert_eq!(
            counters.collection_unread_counts.get(&collection.to_string()),
            Some(&1)
        );

        let stale = BookmarkCounterDelta {
            total: Some(-5),
            unread: Some(-5),
            collection_unread: Some(BTreeMap::from([(collection.to_string(), -3)])),
        };
        counters.apply(&stale);
        assert_eq!(counters.total_count, 0);
        assert_eq!(counters.unread_count, 0);
        assert!(counters.collection_unread_counts.is_empty());
    }
}
