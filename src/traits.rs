//! Storage abstraction for the movement ledger
//!
//! The concrete store is an external key-document collaborator (the
//! production deployment uses a hosted document database). The engine only
//! needs a bulk read and a narrow partial write, so that is all the trait
//! exposes: no transactions, no queries, no multi-record atomicity. Reads are
//! at-least-once, writes are per-record and idempotent by construction.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::BTreeMap;

use crate::ingest::RawMovement;
use crate::types::ReconcileResult;

/// Maximum write operations committed per chunk. The external store rejects
/// batches above ~500 operations, so correction runs commit in chunks of this
/// size and keep going when a chunk member fails.
pub const WRITE_BATCH_LIMIT: usize = 450;

/// Bulk-read / partial-write access to a movement collection.
///
/// Implementations must only ever touch `paymentMethods` and
/// `paymentSummary` in [`update_allocations`](MovementStore::update_allocations);
/// `type`, `date` and `total` are immutable once written.
#[async_trait]
pub trait MovementStore: Send + Sync {
    /// Read every document in the collection. A failure here is fatal for a
    /// reconciliation run: there is nothing to reconcile without data.
    async fn fetch_all(&self, collection: &str) -> ReconcileResult<Vec<RawMovement>>;

    /// Overwrite one movement's payment distribution and its human-readable
    /// summary, leaving every other field untouched.
    async fn update_allocations(
        &mut self,
        collection: &str,
        id: &str,
        allocations: &BTreeMap<String, BigDecimal>,
        summary: &str,
    ) -> ReconcileResult<()>;
}
