//! Audit reporter: naive vs normalized totals
//!
//! Read-only diagnostics. Computes per-method signed totals twice — straight
//! over the raw batch, and after the normalizer has removed duplicates — and
//! reports the difference together with the duplicate groups responsible, so
//! an operator can see exactly how much money duplicate writes are inflating
//! and which records to look at. Performs no writes.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::allocator::{is_unallocated, known_methods, signed_amount_for};
use crate::normalizer::{DuplicateGroup, Normalizer};
use crate::types::Movement;

/// Result of comparing the naive and normalized views of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Signed per-method totals with no dedup applied.
    pub naive: BTreeMap<String, BigDecimal>,
    /// Signed per-method totals after normalization.
    pub normalized: BTreeMap<String, BigDecimal>,
    /// `naive - normalized` per method; nonzero means duplicates moved money.
    pub deltas: BTreeMap<String, BigDecimal>,
    /// The duplicate groups the normalizer collapsed, for human triage.
    pub duplicate_groups: Vec<DuplicateGroup>,
    /// Ids of positive-total movements carrying no usable allocation
    /// (`None` for unsaved records). Data-quality flags, not errors.
    pub unallocated: Vec<Option<String>>,
}

impl AuditReport {
    /// Whether the naive and normalized views agree for every method.
    pub fn is_clean(&self) -> bool {
        self.deltas
            .values()
            .all(|delta| *delta == BigDecimal::from(0))
    }
}

/// Compare a raw batch against its normalized form.
pub fn compare(movements: &[Movement], normalizer: &Normalizer) -> AuditReport {
    let methods = known_methods(movements);
    let naive = totals_by_method(movements, &methods);

    let (normalized_movements, duplicate_groups) =
        normalizer.normalize_with_report(movements.to_vec());
    let normalized = totals_by_method(&normalized_movements, &methods);

    let deltas = methods
        .iter()
        .map(|method| {
            let difference = &naive[method] - &normalized[method];
            (method.clone(), difference)
        })
        .collect();

    let unallocated = normalized_movements
        .iter()
        .filter(|m| is_unallocated(m))
        .map(|m| m.id.clone())
        .collect();

    AuditReport {
        naive,
        normalized,
        deltas,
        duplicate_groups,
        unallocated,
    }
}

fn totals_by_method(movements: &[Movement], methods: &[String]) -> BTreeMap<String, BigDecimal> {
    methods
        .iter()
        .map(|method| {
            let total: BigDecimal = movements
                .iter()
                .map(|movement| signed_amount_for(movement, method))
                .sum();
            (method.clone(), total)
        })
        .collect()
}
