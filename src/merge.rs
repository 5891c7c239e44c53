//! Reconciliation of incoming records into an existing store.
//!
//! Identity is the normalized native name. English names are filled one way
//! only: a blank is filled, a present value is never replaced.

use tracing::debug;

use crate::english::is_missing;
use crate::record::{sanitize_english, Record};
use crate::store::RecordStore;

/// Counts produced by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Existing records whose blank English name was filled
    pub updated: usize,
    /// New records appended to the store
    pub added: usize,
    /// Incoming records skipped for a blank native (or English) name
    pub skipped: usize,
    /// Incoming records matching an existing key that already had a value
    pub unchanged: usize,
}

/// Merge a batch of records into `store`.
///
/// Rows with an empty native name or an empty (sanitized) English name are
/// skipped; sources frequently yield partial rows.
pub fn merge(store: &mut RecordStore, incoming: impl IntoIterator<Item = Record>) -> MergeOutcome {
    merge_with(store, incoming, false)
}

/// Merge a raw listing into `store`, keeping rows that have no English name
/// yet as blank placeholders so enrichment can fill them later.
pub fn merge_listing(
    store: &mut RecordStore,
    incoming: impl IntoIterator<Item = Record>,
) -> MergeOutcome {
    merge_with(store, incoming, true)
}

fn merge_with(
    store: &mut RecordStore,
    incoming: impl IntoIterator<Item = Record>,
    keep_blank_english: bool,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for record in incoming {
        let native_name = record.native_name.trim();
        let english_name = if is_missing(&record.english_name) {
            String::new()
        } else {
            sanitize_english(&record.english_name)
        };

        let key = record.key();
        if key.is_empty() || (english_name.is_empty() && !keep_blank_english) {
            outcome.skipped += 1;
            continue;
        }

        match store.position(&key) {
            Some(position) => {
                let existing = store.record_mut(position);
                if existing.english_name.is_empty() && !english_name.is_empty() {
                    existing.english_name = english_name;
                    outcome.updated += 1;
                } else {
                    outcome.unchanged += 1;
                }
            }
            None => {
                store.push(key, Record::new(native_name, english_name));
                outcome.added += 1;
            }
        }
    }

    debug!(
        "Merged into {}: {} added, {} updated, {} unchanged, {} skipped",
        store.source(),
        outcome.added,
        outcome.updated,
        outcome.unchanged,
        outcome.skipped
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(native: &str, english: &str) -> Record {
        Record::new(native, english)
    }

    fn snapshot(store: &RecordStore) -> Vec<(String, String)> {
        store
            .iter()
            .map(|r| (r.native_name.clone(), r.english_name.clone()))
            .collect()
    }

    // ==================== Add Tests ====================

    #[test]
    fn test_merge_into_empty_store_adds_in_order() {
        let mut store = RecordStore::new("Poland");

        let outcome = merge(
            &mut store,
            vec![
                rec("华沙大学", "University of Warsaw"),
                rec("雅盖隆大学", "Jagiellonian University"),
            ],
        );

        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.updated, 0);
        assert_eq!(
            snapshot(&store),
            vec![
                ("华沙大学".to_string(), "University of Warsaw".to_string()),
                ("雅盖隆大学".to_string(), "Jagiellonian University".to_string()),
            ]
        );
    }

    #[test]
    fn test_merge_does_not_duplicate_formatting_variants() {
        let mut store = RecordStore::new("Poland");

        let outcome = merge(
            &mut store,
            vec![
                rec("华沙 大学", "University of Warsaw"),
                rec("（华沙大学）", "Warsaw University"),
            ],
        );

        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].english_name, "University of Warsaw");
    }

    #[test]
    fn test_merge_trims_native_name_on_insert() {
        let mut store = RecordStore::new("Poland");
        merge(&mut store, vec![rec("  华沙大学 ", "University of Warsaw")]);
        assert_eq!(store.records()[0].native_name, "华沙大学");
    }

    // ==================== Skip Tests ====================

    #[test]
    fn test_merge_skips_blank_native_or_english() {
        let mut store = RecordStore::new("Poland");

        let outcome = merge(
            &mut store,
            vec![
                rec("", "Orphan University"),
                rec(" ( ) ", "Orphan"),
                rec("华沙大学", ""),
                rec("乙", "nan"),
            ],
        );

        assert_eq!(outcome.skipped, 4);
        assert!(store.is_empty());
    }

    #[test]
    fn test_merge_listing_keeps_blank_english_placeholders() {
        let mut store = RecordStore::new("China");

        let outcome = merge_listing(&mut store, vec![rec("北京大学", ""), rec("", "Orphan")]);

        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(store.records()[0].english_name, "");
    }

    // ==================== Fill Policy Tests ====================

    #[test]
    fn test_merge_fills_blank_english() {
        let mut store = RecordStore::with_records("Test", vec![rec("甲", "")]);

        let outcome = merge(&mut store, vec![rec("甲", "Alpha U")]);

        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.added, 0);
        assert_eq!(store.records()[0].english_name, "Alpha U");
    }

    #[test]
    fn test_merge_never_regresses_filled_name() {
        let mut store = RecordStore::with_records("Test", vec![rec("甲", "Old Name")]);

        let outcome = merge(&mut store, vec![rec("甲", "Alpha U")]);

        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(store.records()[0].english_name, "Old Name");
    }

    #[test]
    fn test_merge_fill_order_independent() {
        let mut two_batches = RecordStore::new("Test");
        merge(&mut two_batches, vec![rec("甲", "")]);
        merge(&mut two_batches, vec![rec("甲", "Alpha U")]);

        let mut one_batch = RecordStore::new("Test");
        merge(&mut one_batch, vec![rec("甲", ""), rec("甲", "Alpha U")]);

        assert_eq!(snapshot(&two_batches), snapshot(&one_batch));
        assert_eq!(snapshot(&one_batch), vec![("甲".to_string(), "Alpha U".to_string())]);
    }

    #[test]
    fn test_merge_listing_fill_order_independent() {
        let mut two_batches = RecordStore::new("Test");
        merge_listing(&mut two_batches, vec![rec("甲", "")]);
        merge_listing(&mut two_batches, vec![rec("甲", "Alpha U")]);

        let mut one_batch = RecordStore::new("Test");
        merge_listing(&mut one_batch, vec![rec("甲", ""), rec("甲", "Alpha U")]);

        assert_eq!(snapshot(&two_batches), snapshot(&one_batch));
    }

    // ==================== Sanitization Tests ====================

    #[test]
    fn test_merge_sanitizes_english() {
        let mut store = RecordStore::new("USA");

        merge(
            &mut store,
            vec![rec("加州大学伯克利分校", "\"University of California, Berkeley\"")],
        );

        assert_eq!(store.records()[0].english_name, "University of California  Berkeley");
    }

    #[test]
    fn test_merge_replaces_internal_quotes() {
        let mut store = RecordStore::new("USA");
        merge(&mut store, vec![rec("新学院", "The \"New\" School")]);
        assert_eq!(store.records()[0].english_name, "The 'New' School");
    }

    proptest! {
        #[test]
        fn prop_add_only_disjoint_batches_commute(
            a in proptest::collection::btree_set("[a-m]{1,4}", 0..8),
            b in proptest::collection::btree_set("[n-z]{1,4}", 0..8),
        ) {
            let batch_a: Vec<Record> = a.iter().map(|k| rec(k, "Some University")).collect();
            let batch_b: Vec<Record> = b.iter().map(|k| rec(k, "Other University")).collect();

            let mut ab = RecordStore::new("P");
            merge(&mut ab, batch_a.clone());
            merge(&mut ab, batch_b.clone());

            let mut ba = RecordStore::new("P");
            merge(&mut ba, batch_b);
            merge(&mut ba, batch_a);

            let mut left = snapshot(&ab);
            let mut right = snapshot(&ba);
            left.sort();
            right.sort();
            prop_assert_eq!(left, right);
        }

        #[test]
        fn prop_merge_keeps_one_record_per_key(
            names in proptest::collection::vec("[ab() ]{1,5}", 0..20),
        ) {
            let mut store = RecordStore::new("P");
            merge(&mut store, names.iter().map(|n| rec(n, "Some University")));

            let mut keys: Vec<String> = store.iter().map(Record::key).collect();
            let total = keys.len();
            keys.sort();
            keys.dedup();
            prop_assert_eq!(keys.len(), total);
        }
    }
}
