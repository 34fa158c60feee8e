//! # Movements Core
//!
//! Reconciliation engine for a retail point-of-sale movement ledger. Turns a
//! raw, append-mostly stream of financial movements (sales, purchases,
//! income, expenses, each with a total and a split across payment methods)
//! into trustworthy per-method balances, despite duplicate writes from
//! retried submissions, legacy single-method records, and rounding drift
//! between totals and their allocations.
//!
//! ## Pipeline
//!
//! raw batch → [`normalizer`] (duplicate suppression) → [`allocator`]
//! (per-method amounts) → [`balance`] (balances and statements). The
//! [`correction`] engine reuses the same arithmetic to repair persisted
//! drift, and [`audit`] quantifies what normalization changed.
//!
//! ## Quick start
//!
//! ```rust
//! use movements_core::{MemoryStore, Reconciler};
//!
//! // Any MovementStore works; MemoryStore is the test/dev backend.
//! let reconciler = Reconciler::new(MemoryStore::new(), "movements");
//! ```

pub mod allocator;
pub mod audit;
pub mod balance;
pub mod correction;
pub mod engine;
pub mod ingest;
pub mod normalizer;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use audit::AuditReport;
pub use correction::{CorrectionEngine, CorrectionOutcome, CorrectionPlan};
pub use engine::Reconciler;
pub use ingest::{parse_batch, parse_movement, RawMovement};
pub use normalizer::{DuplicateGroup, Normalizer};
pub use traits::{MovementStore, WRITE_BATCH_LIMIT};
pub use types::{
    Movement, MovementKind, ReconcileError, ReconcileResult, StatementRow, DEFAULT_METHOD_CODES,
};
pub use utils::{JsonFileStore, MemoryStore};
