//! Allocator: per-method amount derivation
//!
//! Given one movement and one payment-method code, decide how much of the
//! movement's total belongs to that method. The recorded `total` is always
//! authoritative: when the split map drifted away from it (historical
//! rounding bugs), every method's share is rescaled proportionally so the
//! shares sum back to the total. Proration is deliberately unbiased; the
//! correction engine uses a different, absorbing rule when writing back
//! because a single auditable target field is preferable for mutations.

use bigdecimal::BigDecimal;
use std::collections::BTreeMap;

use crate::types::Movement;
use crate::utils::money::{round2, within_epsilon};

/// Amount of `movement.total` attributable to `method`. Pure, no side effects.
///
/// Rules, in order:
/// 1. Non-empty split map: exact lookup when the map sums to the total
///    (within epsilon); proportional rescale rounded to 2dp when it drifted;
///    0 for every method when the map sums to nothing on a positive total
///    (an unallocated movement, see [`is_unallocated`]).
/// 2. Legacy single-method record: the whole total when the method matches.
/// 3. Otherwise 0.
pub fn amount_for(movement: &Movement, method: &str) -> BigDecimal {
    if !movement.allocations.is_empty() {
        let raw = movement
            .allocations
            .get(method)
            .cloned()
            .unwrap_or_else(|| BigDecimal::from(0));
        let sum = movement.allocation_sum();
        if within_epsilon(&sum, &movement.total) {
            return raw;
        }
        if sum > BigDecimal::from(0) {
            return round2(&((&raw * &movement.total) / &sum));
        }
        return BigDecimal::from(0);
    }
    if movement.legacy_method.as_deref() == Some(method) {
        return movement.total.clone();
    }
    BigDecimal::from(0)
}

/// [`amount_for`] with the movement kind's sign applied: positive for sales
/// and income, negative for purchases and expenses, zero for unknown kinds.
pub fn signed_amount_for(movement: &Movement, method: &str) -> BigDecimal {
    BigDecimal::from(movement.kind.sign() as i64) * amount_for(movement, method)
}

/// Whether a positive-total movement carries no usable allocation at all.
/// Reporting surfaces these as data-quality flags; they are never silently
/// assigned to a method.
pub fn is_unallocated(movement: &Movement) -> bool {
    if movement.total <= BigDecimal::from(0) {
        return false;
    }
    if movement.allocations.is_empty() {
        return movement.legacy_method.is_none();
    }
    movement.allocation_sum() == BigDecimal::from(0)
}

/// Every method code a batch of movements mentions, in sorted order. The
/// method set is open, so reports derive it from the data instead of a
/// hard-coded list.
pub fn known_methods(movements: &[Movement]) -> Vec<String> {
    let mut methods: Vec<String> = movements
        .iter()
        .flat_map(|m| {
            m.allocations
                .keys()
                .cloned()
                .chain(m.legacy_method.clone())
        })
        .collect();
    methods.sort();
    methods.dedup();
    methods
}

/// Human-readable distribution summary, positive entries only:
/// `"efectivo: $100.00, mercadoPago: $50.00"`. Written back alongside
/// corrected allocations and shown in dry-run output.
pub fn payment_summary(allocations: &BTreeMap<String, BigDecimal>) -> String {
    allocations
        .iter()
        .filter(|(_, amount)| **amount > BigDecimal::from(0))
        .map(|(method, amount)| format!("{method}: ${}", round2(amount)))
        .collect::<Vec<_>>()
        .join(", ")
}
