//! Balance calculator: running balances and monthly statements
//!
//! Works on normalized movements only; callers are expected to run the batch
//! through the [`Normalizer`](crate::normalizer::Normalizer) first. Balances
//! are signed cumulative sums and are recomputed on demand, never persisted.
//! Negative balances are legitimate (outflows can post before the first
//! sale); clamping to zero here would hide a real bookkeeping error.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeMap;

use crate::allocator::signed_amount_for;
use crate::types::{Movement, StatementRow};

/// Signed cumulative balance for one method over all movements dated at or
/// before `cutoff`. Undated movements are excluded: with no instant they can
/// satisfy no cutoff. An empty selection yields 0.
pub fn balance_as_of(movements: &[Movement], method: &str, cutoff: DateTime<Utc>) -> BigDecimal {
    movements
        .iter()
        .filter(|m| m.date.is_some_and(|date| date <= cutoff))
        .map(|m| signed_amount_for(m, method))
        .sum()
}

/// Signed net for one method within a single calendar month. This is the
/// "month net" figure operators cross-check against opening + net ==
/// available; future-dated movements inside the month count like any other.
pub fn month_net(movements: &[Movement], method: &str, year: i32, month: u32) -> BigDecimal {
    movements
        .iter()
        .filter(|m| {
            m.date
                .is_some_and(|date| date.year() == year && date.month() == month)
        })
        .map(|m| signed_amount_for(m, method))
        .sum()
}

/// Monthly statement rows for one method, in chronological order.
///
/// Months with no movements are omitted, but the opening/closing chain is
/// unbroken: the next emitted row opens at the previous row's closing. The
/// first row opens at 0 (plus anything undated contributes nowhere, by the
/// same exclusion rule as [`balance_as_of`]).
pub fn monthly_statement(movements: &[Movement], method: &str) -> Vec<StatementRow> {
    let mut buckets: BTreeMap<(i32, u32), (BigDecimal, BigDecimal)> = BTreeMap::new();
    for movement in movements {
        let Some(date) = movement.date else { continue };
        let signed = signed_amount_for(movement, method);
        if signed == BigDecimal::from(0) {
            continue;
        }
        let bucket = buckets
            .entry((date.year(), date.month()))
            .or_insert_with(|| (BigDecimal::from(0), BigDecimal::from(0)));
        if signed > BigDecimal::from(0) {
            bucket.0 += signed;
        } else {
            bucket.1 += signed.abs();
        }
    }

    let mut rows = Vec::with_capacity(buckets.len());
    let mut opening = BigDecimal::from(0);
    for ((year, month), (inflow, outflow)) in buckets {
        let net = &inflow - &outflow;
        let closing = &opening + &net;
        rows.push(StatementRow {
            year,
            month,
            opening: opening.clone(),
            inflow,
            outflow,
            net,
            closing: closing.clone(),
        });
        opening = closing;
    }
    rows
}
