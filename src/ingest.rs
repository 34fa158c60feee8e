//! Ingestion boundary: raw store documents to canonical movements
//!
//! The store holds two generations of movement documents: a legacy shape with
//! a single `paymentMethod` field, and the current shape with a
//! `paymentMethods` split map. Both normalize to one canonical [`Movement`]
//! here, so no downstream component ever branches on document shape again.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::types::{Movement, MovementKind};
use crate::utils::money::round2;

/// A movement document exactly as the store returns it. Field names follow
/// the wire schema; every field is optional because historical documents are
/// missing some of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMovement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(
        rename = "paymentMethods",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_methods: Option<BTreeMap<String, f64>>,
    #[serde(
        rename = "paymentMethod",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_method: Option<String>,
    #[serde(
        rename = "paymentSummary",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_summary: Option<String>,
}

/// Convert one raw document into the canonical model.
///
/// Data-quality anomalies never drop a record: a missing or non-finite
/// amount becomes 0, an unparseable date becomes `None`, and both are logged
/// so the anomaly stays visible. When the split map is absent or empty and a
/// legacy method is present, a singleton map is synthesized so downstream
/// code only sees one shape.
pub fn parse_movement(raw: &RawMovement) -> Movement {
    let kind = raw
        .kind
        .as_deref()
        .map(MovementKind::from_code)
        .unwrap_or(MovementKind::Unknown);
    if kind == MovementKind::Unknown {
        warn!(id = raw.id.as_deref(), kind = raw.kind.as_deref(), "unrecognized movement kind");
    }

    let date = raw.date.as_deref().and_then(|text| {
        let parsed = parse_date(text);
        if parsed.is_none() {
            warn!(id = raw.id.as_deref(), date = text, "unparseable movement date");
        }
        parsed
    });

    let total = raw
        .total
        .map(|value| amount_from_f64(raw.id.as_deref(), "total", value))
        .unwrap_or_else(|| BigDecimal::from(0));

    let mut allocations: BTreeMap<String, BigDecimal> = raw
        .payment_methods
        .iter()
        .flatten()
        .map(|(method, amount)| {
            (
                method.clone(),
                amount_from_f64(raw.id.as_deref(), method, *amount),
            )
        })
        .collect();

    // Legacy single-field records: the whole total belongs to that method.
    if allocations.is_empty() {
        if let Some(method) = &raw.payment_method {
            allocations.insert(method.clone(), total.clone());
        }
    }

    Movement {
        id: raw.id.clone(),
        kind,
        date,
        total,
        allocations,
        legacy_method: raw.payment_method.clone(),
    }
}

/// Parse every raw document in a batch, preserving order.
pub fn parse_batch(raw: &[RawMovement]) -> Vec<Movement> {
    raw.iter().map(parse_movement).collect()
}

fn amount_from_f64(id: Option<&str>, field: &str, value: f64) -> BigDecimal {
    match BigDecimal::try_from(value) {
        Ok(amount) => round2(&amount),
        Err(_) => {
            warn!(id, field, value, "non-finite amount, coerced to 0");
            BigDecimal::from(0)
        }
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(day.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}
