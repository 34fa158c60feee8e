//! Correction engine: persisted allocation-drift repair
//!
//! Detects movements whose recorded total exceeds the sum of their payment
//! allocations and plans a top-up of the difference into a single absorbing
//! method. Unlike reporting-time proration, write-back deliberately touches
//! one stable field: an auditable "delta went here" beats rewriting every
//! share. The engine only ever adds missing money; a delta that would shrink
//! a recorded allocation is never planned.
//!
//! Corrections are independently idempotent: once applied, re-planning the
//! same record computes a delta of ~0 and proposes nothing, so partially
//! applied runs are an accepted, reported outcome rather than an error.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::allocator::payment_summary;
use crate::traits::{MovementStore, WRITE_BATCH_LIMIT};
use crate::types::{Movement, MovementKind, DEFAULT_METHOD_CODES};
use crate::utils::money::{correction_threshold, round2};

/// One planned top-up for one movement. Carries the before/after state so an
/// operator can audit the proposal before committing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionPlan {
    pub movement_id: String,
    /// Absorbing method receiving the delta.
    pub method: String,
    /// Missing amount being added.
    pub delta: BigDecimal,
    /// Absorbing method's allocation before the correction.
    pub before: BigDecimal,
    /// Absorbing method's allocation after the correction.
    pub after: BigDecimal,
    /// The authoritative recorded total.
    pub total: BigDecimal,
    /// Allocation sum found on the record.
    pub allocated: BigDecimal,
    /// Full corrected allocation map to persist.
    pub allocations: BTreeMap<String, BigDecimal>,
}

/// One rejected write during apply. Per-record, never batch-fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionFailure {
    pub movement_id: String,
    pub error: String,
}

/// Aggregate result of an apply run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    pub applied: usize,
    pub failed: usize,
    pub failures: Vec<CorrectionFailure>,
}

/// Drift detector and repair planner.
#[derive(Debug, Clone)]
pub struct CorrectionEngine {
    /// Method that absorbs deltas when it already carries an allocation (or
    /// when nothing else does).
    pub preferred_method: String,
    /// Movement kinds eligible for correction.
    pub kinds: Vec<MovementKind>,
}

impl Default for CorrectionEngine {
    fn default() -> Self {
        Self {
            preferred_method: "mercadoPago".to_string(),
            kinds: vec![MovementKind::Sale, MovementKind::Purchase],
        }
    }
}

impl CorrectionEngine {
    pub fn new(preferred_method: impl Into<String>, kinds: Vec<MovementKind>) -> Self {
        Self {
            preferred_method: preferred_method.into(),
            kinds,
        }
    }

    /// Plan corrections for every eligible movement dated at or after
    /// `since`. Pure: nothing is written here.
    ///
    /// Movements without a persisted id cannot receive a write-back and are
    /// skipped with a warning. Undated movements are skipped too: the date
    /// filter is a safety bound and a record outside time comparison cannot
    /// satisfy it.
    pub fn plan(&self, movements: &[Movement], since: DateTime<Utc>) -> Vec<CorrectionPlan> {
        let mut plans = Vec::new();
        for movement in movements {
            if !self.kinds.contains(&movement.kind) {
                continue;
            }
            let Some(date) = movement.date else { continue };
            if date < since {
                continue;
            }

            let total = round2(&movement.total);
            if total <= BigDecimal::from(0) {
                continue;
            }

            // Seed the candidate map with the default codes so a first-time
            // correction can land on a method the record never mentioned.
            let mut allocations: BTreeMap<String, BigDecimal> = DEFAULT_METHOD_CODES
                .iter()
                .map(|code| (code.to_string(), BigDecimal::from(0)))
                .collect();
            for (method, amount) in &movement.allocations {
                allocations.insert(method.clone(), round2(amount));
            }

            let allocated: BigDecimal = round2(&allocations.values().sum::<BigDecimal>());
            let delta = round2(&(&total - &allocated));
            if delta <= correction_threshold() {
                continue;
            }

            let Some(movement_id) = movement.id.clone() else {
                warn!(
                    kind = %movement.kind,
                    %total,
                    "drifted movement has no document id, cannot correct"
                );
                continue;
            };

            let method = self.absorbing_method(&allocations);
            let before = allocations
                .get(&method)
                .cloned()
                .unwrap_or_else(|| BigDecimal::from(0));
            let after = round2(&(&before + &delta));
            allocations.insert(method.clone(), after.clone());

            debug!(id = movement_id.as_str(), method = method.as_str(), %delta, "planned correction");
            plans.push(CorrectionPlan {
                movement_id,
                method,
                delta,
                before,
                after,
                total,
                allocated,
                allocations,
            });
        }
        plans
    }

    /// Commit plans through the store, in chunks the external batch limit
    /// allows. A rejected record is reported and the run continues; nothing
    /// already applied is rolled back.
    pub async fn apply<S: MovementStore>(
        &self,
        store: &mut S,
        collection: &str,
        plans: &[CorrectionPlan],
    ) -> CorrectionOutcome {
        let mut outcome = CorrectionOutcome::default();
        for (chunk_index, chunk) in plans.chunks(WRITE_BATCH_LIMIT).enumerate() {
            info!(chunk = chunk_index, size = chunk.len(), "committing correction chunk");
            for plan in chunk {
                let summary = payment_summary(&plan.allocations);
                match store
                    .update_allocations(collection, &plan.movement_id, &plan.allocations, &summary)
                    .await
                {
                    Ok(()) => outcome.applied += 1,
                    Err(error) => {
                        warn!(id = plan.movement_id.as_str(), %error, "correction rejected");
                        outcome.failed += 1;
                        outcome.failures.push(CorrectionFailure {
                            movement_id: plan.movement_id.clone(),
                            error: error.to_string(),
                        });
                    }
                }
            }
        }
        outcome
    }

    /// Preferred method when it already holds an allocation, else the method
    /// with the largest current allocation, else the preferred method at 0.
    fn absorbing_method(&self, allocations: &BTreeMap<String, BigDecimal>) -> String {
        let preferred_current = allocations
            .get(&self.preferred_method)
            .cloned()
            .unwrap_or_else(|| BigDecimal::from(0));
        if preferred_current > BigDecimal::from(0) {
            return self.preferred_method.clone();
        }
        allocations
            .iter()
            .filter(|(_, amount)| **amount > BigDecimal::from(0))
            .max_by(|a, b| a.1.cmp(b.1))
            .map(|(method, _)| method.clone())
            .unwrap_or_else(|| self.preferred_method.clone())
    }
}
