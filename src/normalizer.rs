//! Normalizer: duplicate suppression for raw movement batches
//!
//! Retried client submissions leave the store with exact and near-duplicate
//! movement documents. The normalizer removes them in two passes: identity
//! dedup on document ids (defensive, should not happen under correct
//! persistence) and a windowed signature dedup that treats two movements of
//! the same kind, total and payment distribution written within a short
//! window as one user action plus retries. The chronologically earliest
//! record always wins: the first write is assumed to be the original action.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::types::Movement;
use crate::utils::money::within_epsilon;

/// Default signature-dedup window, in seconds. Two equal-signature movements
/// further apart than this are assumed to be genuinely distinct.
pub const DEFAULT_WINDOW_SECS: i64 = 60;

/// One collapsed duplicate group, reported for human triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// The shared duplicate signature (or the duplicated id for identity dups).
    pub signature: String,
    /// Id of the record that survived, when it has one.
    pub kept_id: Option<String>,
    /// Ids of the records that were discarded (`None` for unsaved records).
    pub dropped_ids: Vec<Option<String>>,
}

impl DuplicateGroup {
    /// Number of discarded records in this group.
    pub fn dropped_count(&self) -> usize {
        self.dropped_ids.len()
    }
}

/// Deterministic, idempotent duplicate filter.
#[derive(Debug, Clone)]
pub struct Normalizer {
    window: Duration,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS)
    }
}

impl Normalizer {
    /// Create a normalizer with a custom dedup window.
    pub fn new(window_secs: i64) -> Self {
        Self {
            window: Duration::seconds(window_secs),
        }
    }

    /// Remove duplicates from a batch. See [`normalize_with_report`] for the
    /// variant that also returns the collapsed groups.
    ///
    /// [`normalize_with_report`]: Normalizer::normalize_with_report
    pub fn normalize(&self, movements: Vec<Movement>) -> Vec<Movement> {
        self.normalize_with_report(movements).0
    }

    /// Remove duplicates and report every collapsed group.
    ///
    /// Records with no parseable date cannot participate in time-ordered
    /// comparison; they pass through untouched (dropping financial data
    /// silently would be worse than keeping a possible duplicate) and are
    /// appended after the dated records. Output order is otherwise
    /// chronological, which makes the pass idempotent.
    pub fn normalize_with_report(
        &self,
        movements: Vec<Movement>,
    ) -> (Vec<Movement>, Vec<DuplicateGroup>) {
        let mut groups: Vec<DuplicateGroup> = Vec::new();

        // Pass 1: identity dedup, first occurrence wins.
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut uniques: Vec<Movement> = Vec::with_capacity(movements.len());
        let mut id_dups: HashMap<String, Vec<Option<String>>> = HashMap::new();
        for movement in movements {
            match &movement.id {
                Some(id) if !seen_ids.insert(id.clone()) => {
                    warn!(id = id.as_str(), "duplicate document id in batch");
                    id_dups.entry(id.clone()).or_default().push(movement.id.clone());
                }
                _ => uniques.push(movement),
            }
        }
        let mut id_dups: Vec<(String, Vec<Option<String>>)> = id_dups.into_iter().collect();
        id_dups.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, dropped_ids) in id_dups {
            groups.push(DuplicateGroup {
                signature: format!("id:{id}"),
                kept_id: Some(id),
                dropped_ids,
            });
        }

        // Pass 2: windowed signature dedup over date-sorted records.
        let (mut dated, undated): (Vec<Movement>, Vec<Movement>) =
            uniques.into_iter().partition(|m| m.date.is_some());
        for movement in &undated {
            warn!(
                id = movement.id.as_deref(),
                "movement without parseable date passed through without dedup"
            );
        }
        dated.sort_by_key(|m| m.date);

        let mut accepted: Vec<Movement> = Vec::with_capacity(dated.len());
        let mut signatures: Vec<String> = Vec::with_capacity(dated.len());
        let mut group_of_kept: HashMap<usize, DuplicateGroup> = HashMap::new();
        for candidate in dated {
            let candidate_date = candidate.date.expect("partitioned on date presence");
            let candidate_signature = candidate.signature();

            // Only look back while still inside the window; accepted is in
            // date order so the scan is near-linear over the whole batch.
            let mut duplicate_of = None;
            for (index, earlier) in accepted.iter().enumerate().rev() {
                let earlier_date = earlier.date.expect("accepted records are dated");
                if candidate_date - earlier_date > self.window {
                    break;
                }
                if earlier.kind == candidate.kind
                    && within_epsilon(&earlier.total, &candidate.total)
                    && signatures[index] == candidate_signature
                {
                    duplicate_of = Some(index);
                    break;
                }
            }

            match duplicate_of {
                Some(index) => {
                    group_of_kept
                        .entry(index)
                        .or_insert_with(|| DuplicateGroup {
                            signature: candidate_signature,
                            kept_id: accepted[index].id.clone(),
                            dropped_ids: Vec::new(),
                        })
                        .dropped_ids
                        .push(candidate.id.clone());
                }
                None => {
                    signatures.push(candidate_signature);
                    accepted.push(candidate);
                }
            }
        }

        let mut kept_indexes: Vec<usize> = group_of_kept.keys().copied().collect();
        kept_indexes.sort_unstable();
        for index in kept_indexes {
            groups.push(group_of_kept.remove(&index).expect("index from keys"));
        }

        accepted.extend(undated);
        (accepted, groups)
    }
}
