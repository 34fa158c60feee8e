//! Core types and data structures for the movement ledger

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::utils::money::round2;

/// Payment-method codes the point-of-sale front end seeds new movements with.
/// The code set is open: movements may carry any method code, these are only
/// the defaults the correction engine offers as absorbing candidates.
pub const DEFAULT_METHOD_CODES: [&str; 4] = ["efectivo", "mercadoPago", "transferencia", "tarjeta"];

/// Movement kinds as recorded by the point-of-sale front end.
///
/// Sales and income are inflows, purchases and both expense kinds are
/// outflows. Anything else carries sign 0 so an unrecognized kind can never
/// silently move money.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    #[serde(rename = "venta")]
    Sale,
    #[serde(rename = "compra")]
    Purchase,
    #[serde(rename = "ingreso")]
    Income,
    #[serde(rename = "egreso")]
    Expense,
    #[serde(rename = "gasto")]
    GenericExpense,
    #[serde(other)]
    Unknown,
}

impl MovementKind {
    /// Parse a wire code into a kind. Unrecognized codes map to `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "venta" => MovementKind::Sale,
            "compra" => MovementKind::Purchase,
            "ingreso" => MovementKind::Income,
            "egreso" => MovementKind::Expense,
            "gasto" => MovementKind::GenericExpense,
            _ => MovementKind::Unknown,
        }
    }

    /// Wire code for this kind, if it has one.
    pub fn as_code(&self) -> Option<&'static str> {
        match self {
            MovementKind::Sale => Some("venta"),
            MovementKind::Purchase => Some("compra"),
            MovementKind::Income => Some("ingreso"),
            MovementKind::Expense => Some("egreso"),
            MovementKind::GenericExpense => Some("gasto"),
            MovementKind::Unknown => None,
        }
    }

    /// Signed direction of this kind: +1 inflow, -1 outflow, 0 unrecognized.
    pub fn sign(&self) -> i8 {
        match self {
            MovementKind::Sale | MovementKind::Income => 1,
            MovementKind::Purchase | MovementKind::Expense | MovementKind::GenericExpense => -1,
            MovementKind::Unknown => 0,
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code().unwrap_or("unknown"))
    }
}

/// One canonical ledger entry.
///
/// Movements are created once by the point-of-sale front end and are normally
/// immutable; only the correction engine may rewrite `allocations` (and the
/// derived summary), never `kind`, `date` or `total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Store document id. `None` means "not yet persisted": the record is
    /// excluded from identity dedup and cannot receive corrections.
    pub id: Option<String>,
    /// What happened (sale, purchase, ...). Determines the balance sign.
    pub kind: MovementKind,
    /// When it happened. `None` after a failed date parse; such records are
    /// excluded from every time-based comparison but never dropped.
    pub date: Option<DateTime<Utc>>,
    /// Recorded monetary total, non-negative by convention. The sign comes
    /// from `kind`, never from this field.
    pub total: BigDecimal,
    /// Amount attributed to each payment method. May legitimately disagree
    /// with `total` on historical records; that drift is the allocator's and
    /// correction engine's problem, not the model's.
    pub allocations: BTreeMap<String, BigDecimal>,
    /// Single method code from records predating the split map. Kept for
    /// provenance even after ingestion synthesizes a singleton map from it.
    pub legacy_method: Option<String>,
}

impl Movement {
    /// Sum of all per-method allocations.
    pub fn allocation_sum(&self) -> BigDecimal {
        self.allocations.values().sum()
    }

    /// Derived near-duplicate key: kind, total rounded to 2dp, and the sorted
    /// positive `method:amount` pairs. Two movements with equal signatures
    /// close in time are indistinguishable in effect.
    pub fn signature(&self) -> String {
        let distribution = if self.allocations.is_empty() {
            self.legacy_method
                .clone()
                .unwrap_or_else(|| "single".to_string())
        } else {
            self.allocations
                .iter()
                .filter(|(_, amount)| **amount > BigDecimal::from(0))
                .map(|(method, amount)| format!("{method}:{}", round2(amount)))
                .collect::<Vec<_>>()
                .join("|")
        };
        format!("{}_{}_{}", self.kind, round2(&self.total), distribution)
    }
}

/// One calendar month of signed activity for a single payment method.
///
/// Consecutive rows chain: `closing` of one row equals `opening` of the next
/// emitted row, even when empty months are skipped in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub year: i32,
    pub month: u32,
    /// Balance at the start of the month (everything dated before it).
    pub opening: BigDecimal,
    /// Sum of positive signed amounts in the month.
    pub inflow: BigDecimal,
    /// Absolute sum of negative signed amounts in the month.
    pub outflow: BigDecimal,
    /// `inflow - outflow`.
    pub net: BigDecimal,
    /// `opening + net`.
    pub closing: BigDecimal,
}

/// Errors that can occur while reconciling the movement ledger
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(String),
    #[error("movement not found: {0}")]
    MovementNotFound(String),
    #[error("invalid movement: {0}")]
    InvalidMovement(String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn kind_signs() {
        assert_eq!(MovementKind::Sale.sign(), 1);
        assert_eq!(MovementKind::Income.sign(), 1);
        assert_eq!(MovementKind::Purchase.sign(), -1);
        assert_eq!(MovementKind::Expense.sign(), -1);
        assert_eq!(MovementKind::GenericExpense.sign(), -1);
        assert_eq!(MovementKind::Unknown.sign(), 0);
    }

    #[test]
    fn kind_round_trips_wire_codes() {
        for code in ["venta", "compra", "ingreso", "egreso", "gasto"] {
            assert_eq!(MovementKind::from_code(code).as_code(), Some(code));
        }
        assert_eq!(MovementKind::from_code("traspaso"), MovementKind::Unknown);
    }

    #[test]
    fn signature_sorts_and_drops_zero_allocations() {
        let mut allocations = BTreeMap::new();
        allocations.insert("mercadoPago".to_string(), dec("600"));
        allocations.insert("efectivo".to_string(), dec("400"));
        allocations.insert("tarjeta".to_string(), dec("0"));
        let movement = Movement {
            id: None,
            kind: MovementKind::Sale,
            date: None,
            total: dec("1000"),
            allocations,
            legacy_method: None,
        };
        assert_eq!(
            movement.signature(),
            "venta_1000.00_efectivo:400.00|mercadoPago:600.00"
        );
    }

    #[test]
    fn signature_falls_back_to_legacy_method() {
        let movement = Movement {
            id: None,
            kind: MovementKind::Purchase,
            date: None,
            total: dec("250.5"),
            allocations: BTreeMap::new(),
            legacy_method: Some("efectivo".to_string()),
        };
        assert_eq!(movement.signature(), "compra_250.50_efectivo");
    }
}
