//! Reconciler: orchestrates the full pipeline against one store collection
//!
//! One run reads the collection once, parses every document into the
//! canonical model, and feeds the in-memory pipeline (normalize, allocate,
//! compute). All computation is synchronous and total; the only suspension
//! points are the bulk read and, for correction runs, the per-record writes.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::audit::{compare, AuditReport};
use crate::balance::{balance_as_of, month_net, monthly_statement};
use crate::correction::{CorrectionEngine, CorrectionOutcome, CorrectionPlan};
use crate::ingest::parse_batch;
use crate::normalizer::Normalizer;
use crate::traits::MovementStore;
use crate::types::{Movement, ReconcileResult, StatementRow};

/// Batch reconciliation pipeline over one movement collection.
pub struct Reconciler<S: MovementStore> {
    store: S,
    collection: String,
    normalizer: Normalizer,
}

impl<S: MovementStore> Reconciler<S> {
    /// Create a reconciler with the default 60-second dedup window.
    pub fn new(store: S, collection: impl Into<String>) -> Self {
        Self::with_normalizer(store, collection, Normalizer::default())
    }

    /// Create a reconciler with a custom-configured normalizer.
    pub fn with_normalizer(store: S, collection: impl Into<String>, normalizer: Normalizer) -> Self {
        Self {
            store,
            collection: collection.into(),
            normalizer,
        }
    }

    /// Bulk-read the collection and parse every document. A read failure is
    /// fatal for the run: there is nothing to reconcile without data.
    pub async fn load(&self) -> ReconcileResult<Vec<Movement>> {
        let raw = self.store.fetch_all(&self.collection).await?;
        info!(collection = self.collection.as_str(), count = raw.len(), "loaded movements");
        Ok(parse_batch(&raw))
    }

    /// [`load`](Reconciler::load) followed by duplicate suppression.
    pub async fn load_normalized(&self) -> ReconcileResult<Vec<Movement>> {
        Ok(self.normalizer.normalize(self.load().await?))
    }

    /// Normalized signed balance for one method up to a cutoff.
    pub async fn balance_as_of(
        &self,
        method: &str,
        cutoff: DateTime<Utc>,
    ) -> ReconcileResult<BigDecimal> {
        Ok(balance_as_of(&self.load_normalized().await?, method, cutoff))
    }

    /// Normalized signed net for one method within one calendar month.
    pub async fn month_net(
        &self,
        method: &str,
        year: i32,
        month: u32,
    ) -> ReconcileResult<BigDecimal> {
        Ok(month_net(&self.load_normalized().await?, method, year, month))
    }

    /// Normalized monthly statement rows for one method.
    pub async fn monthly_statement(&self, method: &str) -> ReconcileResult<Vec<StatementRow>> {
        Ok(monthly_statement(&self.load_normalized().await?, method))
    }

    /// Naive-vs-normalized comparison over the whole collection.
    pub async fn audit(&self) -> ReconcileResult<AuditReport> {
        Ok(compare(&self.load().await?, &self.normalizer))
    }

    /// Plan allocation-drift corrections over the normalized collection.
    pub async fn plan_corrections(
        &self,
        engine: &CorrectionEngine,
        since: DateTime<Utc>,
    ) -> ReconcileResult<Vec<CorrectionPlan>> {
        Ok(engine.plan(&self.load_normalized().await?, since))
    }

    /// Commit previously planned corrections. Per-record failures are
    /// collected in the outcome, not raised.
    pub async fn apply_corrections(
        &mut self,
        engine: &CorrectionEngine,
        plans: &[CorrectionPlan],
    ) -> ReconcileResult<CorrectionOutcome> {
        Ok(engine.apply(&mut self.store, &self.collection, plans).await)
    }
}
