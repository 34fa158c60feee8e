//! Shared money arithmetic helpers
//!
//! The allocator, balance calculator and correction engine must never
//! disagree on what "equal" or "rounded" means, so all three go through
//! these helpers instead of rounding or comparing inline.

use bigdecimal::{BigDecimal, RoundingMode};

/// Tolerance for comparing recorded totals against allocation sums: one cent.
pub fn money_epsilon() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Materiality threshold for corrections. Deltas at or below this are noise
/// left over from rounding, not missing money.
pub fn correction_threshold() -> BigDecimal {
    BigDecimal::from(9) / BigDecimal::from(1000)
}

/// Round a monetary amount to two decimal places, ties away from zero
/// (standard cash rounding).
pub fn round2(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

/// Whether two amounts are equal within [`money_epsilon`].
pub fn within_epsilon(a: &BigDecimal, b: &BigDecimal) -> bool {
    (a - b).abs() <= money_epsilon()
}
