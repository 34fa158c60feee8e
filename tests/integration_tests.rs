//! Integration tests for movements-core

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::str::FromStr;

use movements_core::{
    allocator::{amount_for, known_methods, signed_amount_for},
    balance::{balance_as_of, monthly_statement},
    audit::compare,
    CorrectionEngine, MemoryStore, Movement, MovementKind, Normalizer, RawMovement, Reconciler,
};

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec).unwrap()
}

fn movement(
    id: &str,
    kind: MovementKind,
    date: DateTime<Utc>,
    total: &str,
    allocations: &[(&str, &str)],
) -> Movement {
    Movement {
        id: Some(id.to_string()),
        kind,
        date: Some(date),
        total: dec(total),
        allocations: allocations
            .iter()
            .map(|(m, a)| (m.to_string(), dec(a)))
            .collect::<BTreeMap<_, _>>(),
        legacy_method: None,
    }
}

fn raw(id: &str, kind: &str, date: &str, total: f64, allocations: &[(&str, f64)]) -> RawMovement {
    RawMovement {
        id: Some(id.to_string()),
        kind: Some(kind.to_string()),
        date: Some(date.to_string()),
        total: Some(total),
        payment_methods: if allocations.is_empty() {
            None
        } else {
            Some(
                allocations
                    .iter()
                    .map(|(m, a)| (m.to_string(), *a))
                    .collect(),
            )
        },
        ..Default::default()
    }
}

#[test]
fn normalization_is_idempotent() {
    let base = at(2025, 10, 1, 12, 0, 0);
    let batch = vec![
        movement("a", MovementKind::Sale, base, "1000.00", &[("efectivo", "1000.00")]),
        movement(
            "a-retry",
            MovementKind::Sale,
            base + Duration::seconds(8),
            "1000.00",
            &[("efectivo", "1000.00")],
        ),
        movement(
            "b",
            MovementKind::Purchase,
            base + Duration::seconds(30),
            "400.00",
            &[("mercadoPago", "400.00")],
        ),
        movement(
            "c",
            MovementKind::Sale,
            base + Duration::seconds(3000),
            "1000.00",
            &[("efectivo", "1000.00")],
        ),
    ];

    let normalizer = Normalizer::default();
    let once = normalizer.normalize(batch);
    let twice = normalizer.normalize(once.clone());
    assert_eq!(once, twice);
    assert_eq!(once.len(), 3);
}

#[test]
fn duplicate_detection_respects_the_window() {
    let normalizer = Normalizer::default();
    let base = at(2025, 10, 1, 12, 0, 0);
    let twin = |id: &str, offset: Duration| {
        movement("x", MovementKind::Sale, base + offset, "1000.00", &[("efectivo", "1000.00")])
            .clone_with_id(id)
    };

    // 10 seconds apart: one survives, the earlier one.
    let close = vec![twin("late", Duration::seconds(10)), twin("early", Duration::seconds(0))];
    let kept = normalizer.normalize(close);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id.as_deref(), Some("early"));

    // 5 minutes apart with the default 60s window: both survive.
    let far = vec![twin("first", Duration::seconds(0)), twin("second", Duration::seconds(300))];
    assert_eq!(normalizer.normalize(far).len(), 2);
}

trait CloneWithId {
    fn clone_with_id(&self, id: &str) -> Movement;
}

impl CloneWithId for Movement {
    fn clone_with_id(&self, id: &str) -> Movement {
        let mut clone = self.clone();
        clone.id = Some(id.to_string());
        clone
    }
}

#[test]
fn allocation_conserves_totals_across_all_methods() {
    let base = at(2025, 10, 1, 12, 0, 0);
    let mut legacy = movement("legacy", MovementKind::Sale, base, "320.50", &[]);
    legacy.legacy_method = Some("efectivo".to_string());

    let batch = vec![
        movement("exact", MovementKind::Sale, base, "1000.00", &[("efectivo", "400.00"), ("mercadoPago", "600.00")]),
        movement("drifted", MovementKind::Sale, base, "150.00", &[("efectivo", "50.00"), ("mercadoPago", "50.00")]),
        movement("uneven", MovementKind::Purchase, base, "100.00", &[("efectivo", "33.00"), ("mercadoPago", "33.00"), ("tarjeta", "33.00")]),
        legacy,
    ];

    let methods = known_methods(&batch);
    let epsilon = dec("0.01");
    for m in &batch {
        let spread: BigDecimal = methods.iter().map(|code| amount_for(m, code)).sum();
        assert!(
            (&spread - &m.total).abs() <= epsilon,
            "movement {:?} allocated {spread}, total {}",
            m.id,
            m.total
        );
    }
}

#[test]
fn legacy_proration_and_absorbing_correction_diverge_deliberately() {
    let m = movement(
        "m1",
        MovementKind::Sale,
        at(2025, 10, 2, 10, 0, 0),
        "150.00",
        &[("efectivo", "50.00"), ("mercadoPago", "50.00")],
    );

    // Reporting: proportional rescale, no method favored.
    assert_eq!(amount_for(&m, "efectivo"), dec("75.00"));
    assert_eq!(amount_for(&m, "mercadoPago"), dec("75.00"));

    // Write-back: the preferred method absorbs the whole delta.
    let engine = CorrectionEngine::default();
    let plans = engine.plan(std::slice::from_ref(&m), at(2025, 10, 1, 0, 0, 0));
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].method, "mercadoPago");
    assert_eq!(plans[0].allocations["mercadoPago"], dec("100.00"));
    assert_eq!(plans[0].allocations["efectivo"], dec("50.00"));
}

#[test]
fn statement_rows_chain_and_match_cutoff_balances() {
    let movements = vec![
        movement("jan-sale", MovementKind::Sale, at(2025, 1, 10, 9, 0, 0), "1000.00", &[("mercadoPago", "1000.00")]),
        movement("jan-buy", MovementKind::Purchase, at(2025, 1, 22, 9, 0, 0), "250.00", &[("mercadoPago", "250.00")]),
        movement("mar-sale", MovementKind::Sale, at(2025, 3, 4, 9, 0, 0), "500.00", &[("mercadoPago", "500.00")]),
        movement("apr-exp", MovementKind::Expense, at(2025, 4, 1, 9, 0, 0), "2000.00", &[("mercadoPago", "2000.00")]),
    ];

    let rows = monthly_statement(&movements, "mercadoPago");
    assert_eq!(rows.len(), 3);
    for pair in rows.windows(2) {
        assert_eq!(pair[0].closing, pair[1].opening);
    }

    let end_of_month = [
        at(2025, 1, 31, 23, 59, 59),
        at(2025, 3, 31, 23, 59, 59),
        at(2025, 4, 30, 23, 59, 59),
    ];
    for (row, cutoff) in rows.iter().zip(end_of_month) {
        assert_eq!(row.closing, balance_as_of(&movements, "mercadoPago", cutoff));
    }

    // April spends more than everything earned: the chain goes negative
    // and stays negative, unclamped.
    assert_eq!(rows[2].closing, dec("-750.00"));
}

#[test]
fn balance_is_not_clamped_before_first_sale() {
    let movements = vec![
        movement("rent", MovementKind::GenericExpense, at(2025, 2, 1, 8, 0, 0), "900.00", &[("efectivo", "900.00")]),
        movement("sale", MovementKind::Sale, at(2025, 2, 10, 8, 0, 0), "300.00", &[("efectivo", "300.00")]),
    ];
    assert_eq!(
        balance_as_of(&movements, "efectivo", at(2025, 2, 5, 0, 0, 0)),
        dec("-900.00")
    );
    assert_eq!(
        balance_as_of(&movements, "efectivo", at(2025, 2, 28, 0, 0, 0)),
        dec("-600.00")
    );
}

#[test]
fn audit_attributes_deltas_to_duplicate_groups() {
    let base = at(2025, 10, 1, 12, 0, 0);
    let batch = vec![
        movement("a", MovementKind::Sale, base, "1000.00", &[("mercadoPago", "1000.00")]),
        movement("a2", MovementKind::Sale, base + Duration::seconds(12), "1000.00", &[("mercadoPago", "1000.00")]),
        movement("a3", MovementKind::Sale, base + Duration::seconds(25), "1000.00", &[("mercadoPago", "1000.00")]),
        movement("b", MovementKind::Purchase, base + Duration::seconds(7200), "300.00", &[("efectivo", "300.00")]),
    ];

    let report = compare(&batch, &Normalizer::default());
    assert_eq!(report.deltas["mercadoPago"], dec("2000.00"));
    assert_eq!(report.deltas["efectivo"], dec("0.00"));
    assert_eq!(report.duplicate_groups.len(), 1);
    assert_eq!(report.duplicate_groups[0].dropped_count(), 2);
    assert_eq!(report.duplicate_groups[0].kept_id.as_deref(), Some("a"));
}

#[tokio::test]
async fn full_pipeline_corrects_drift_and_converges() {
    let store = MemoryStore::new();
    store.insert("movements", raw("s1", "venta", "2025-10-02T10:00:00Z", 150.0, &[("efectivo", 50.0), ("mercadoPago", 50.0)]));
    store.insert("movements", raw("s2", "venta", "2025-10-02T11:00:00Z", 80.0, &[]));
    store.insert("movements", raw("s3", "compra", "2025-10-02T12:00:00Z", 40.0, &[("efectivo", 40.0)]));
    // Retry pair: only one should count anywhere.
    store.insert("movements", raw("r1", "venta", "2025-10-02T13:00:00Z", 500.0, &[("mercadoPago", 500.0)]));
    store.insert("movements", raw("r2", "venta", "2025-10-02T13:00:20Z", 500.0, &[("mercadoPago", 500.0)]));

    let mut reconciler = Reconciler::new(store, "movements");
    let engine = CorrectionEngine::default();
    let since = at(2025, 10, 1, 0, 0, 0);

    let plans = reconciler.plan_corrections(&engine, since).await.unwrap();
    // s1 drifted by 50, s2 fully unallocated; s3 and the retry pair are fine.
    assert_eq!(plans.len(), 2);

    let outcome = reconciler.apply_corrections(&engine, &plans).await.unwrap();
    assert_eq!(outcome.applied, 2);
    assert_eq!(outcome.failed, 0);

    // Convergence: a second planning pass proposes nothing.
    let replanned = reconciler.plan_corrections(&engine, since).await.unwrap();
    assert!(replanned.is_empty());

    // Balances after correction: every total is fully allocated.
    let cutoff = at(2025, 10, 31, 23, 59, 59);
    let mp = reconciler.balance_as_of("mercadoPago", cutoff).await.unwrap();
    let cash = reconciler.balance_as_of("efectivo", cutoff).await.unwrap();
    // mercadoPago: 100 (s1 corrected) + 80 (s2 absorbed) + 500 (one retry) = 680.
    assert_eq!(mp, dec("680.00"));
    // efectivo: 50 (s1) - 40 (s3) = 10.
    assert_eq!(cash, dec("10.00"));
}

#[tokio::test]
async fn mixed_shape_collection_reconciles_to_one_model() {
    let store = MemoryStore::new();
    // Current shape.
    store.insert("movements", raw("new", "venta", "2025-09-01T10:00:00Z", 100.0, &[("mercadoPago", 100.0)]));
    // Legacy shape: single paymentMethod field.
    store.insert(
        "movements",
        RawMovement {
            id: Some("old".to_string()),
            kind: Some("venta".to_string()),
            date: Some("2025-09-01T11:00:00Z".to_string()),
            total: Some(200.0),
            payment_method: Some("mercadoPago".to_string()),
            ..Default::default()
        },
    );

    let reconciler = Reconciler::new(store, "movements");
    let normalized = reconciler.load_normalized().await.unwrap();
    assert_eq!(normalized.len(), 2);
    for m in &normalized {
        assert_eq!(signed_amount_for(m, "mercadoPago"), m.total.clone());
    }
    let balance = reconciler
        .balance_as_of("mercadoPago", at(2025, 9, 30, 0, 0, 0))
        .await
        .unwrap();
    assert_eq!(balance, dec("300.00"));
}
