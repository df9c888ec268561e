use std::collections::{HashMap, HashSet};

use crate::aggregate::aggregate_records;
use crate::config::EmptyKeyPolicy;
use crate::key::{build_match_key, MatchKey};
use crate::model::{KeyedRecord, MatchOutput, MatchedPair, Record};
use crate::normalize::{QualityIssue, QualityLog};

/// Key bindings and aggregation settings for one reconciliation.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Fields concatenated into the key on side A.
    pub left_key: Vec<String>,
    /// Fields concatenated into the key on side B.
    pub right_key: Vec<String>,
    /// Side-B fields summed when lines share a key.
    pub right_sum_fields: Vec<String>,
    pub empty_keys: EmptyKeyPolicy,
}

/// Three-way split of two record sets by exact key.
///
/// Side B is aggregated per key before matching. Records without a usable
/// key never match and come out one-sided, so nothing disappears.
pub fn reconcile(
    set_a: &[Record],
    set_b: &[Record],
    options: &MatchOptions,
    log: &mut QualityLog,
) -> MatchOutput {
    let keys_a = assign_keys("tax", set_a, &options.left_key, options.empty_keys, log);
    let keys_b = assign_keys("ledger", set_b, &options.right_key, options.empty_keys, log);

    let aggregates = aggregate_records(
        set_b
            .iter()
            .zip(&keys_b)
            .filter_map(|(record, key)| key.participating().map(|k| (k, record))),
        &options.right_sum_fields,
        log,
    );
    let agg_index: HashMap<&MatchKey, usize> = aggregates
        .iter()
        .enumerate()
        .map(|(i, agg)| (&agg.key, i))
        .collect();
    let left_keys: HashSet<&MatchKey> = keys_a.iter().filter_map(KeyState::participating).collect();

    let mut output = MatchOutput::default();

    for (record, state) in set_a.iter().zip(&keys_a) {
        match state.participating().and_then(|k| agg_index.get(k)) {
            Some(&i) => output.matched.push(MatchedPair {
                key: aggregates[i].key.clone(),
                left: record.clone(),
                right: aggregates[i].clone(),
            }),
            None => output.left_only.push(KeyedRecord {
                key: state.key().cloned(),
                record: record.clone(),
            }),
        }
    }

    for (record, state) in set_b.iter().zip(&keys_b) {
        let matched = state
            .participating()
            .is_some_and(|k| left_keys.contains(k));
        if !matched {
            output.right_only.push(KeyedRecord {
                key: state.key().cloned(),
                record: record.clone(),
            });
        }
    }

    log::debug!(
        "reconcile: {} tax / {} ledger lines ({} groups) -> {} matched, {} left only, {} right only",
        set_a.len(),
        set_b.len(),
        aggregates.len(),
        output.matched.len(),
        output.left_only.len(),
        output.right_only.len(),
    );

    output
}

enum KeyState {
    Unkeyable,
    /// Empty key under `EmptyKeyPolicy::Unmatched`.
    Excluded(MatchKey),
    Keyed(MatchKey),
}

impl KeyState {
    fn participating(&self) -> Option<&MatchKey> {
        match self {
            Self::Keyed(k) => Some(k),
            _ => None,
        }
    }

    fn key(&self) -> Option<&MatchKey> {
        match self {
            Self::Unkeyable => None,
            Self::Excluded(k) | Self::Keyed(k) => Some(k),
        }
    }
}

fn assign_keys(
    side: &str,
    records: &[Record],
    fields: &[String],
    policy: EmptyKeyPolicy,
    log: &mut QualityLog,
) -> Vec<KeyState> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| match build_match_key(record, fields) {
            None => {
                log.record(
                    QualityIssue::MissingKeyComponent,
                    &format!("{side} record #{}", i + 1),
                    &fields.join("+"),
                );
                KeyState::Unkeyable
            }
            Some(key) if key.is_empty() => {
                log.record(QualityIssue::EmptyKey, &format!("{side} record #{}", i + 1), "");
                match policy {
                    EmptyKeyPolicy::Match => KeyState::Keyed(key),
                    EmptyKeyPolicy::Unmatched => KeyState::Excluded(key),
                }
            }
            Some(key) => KeyState::Keyed(key),
        })
        .collect()
}
