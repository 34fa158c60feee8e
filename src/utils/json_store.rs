//! JSON-file store implementation for operator runs
//!
//! Reconciliation jobs are usually run against an export of the movements
//! collection (a JSON array of documents). This store treats one file as one
//! collection and writes corrections back to the same file, so a dry-run plus
//! apply cycle works end to end without the production document store.

use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::ingest::RawMovement;
use crate::traits::MovementStore;
use crate::types::{ReconcileError, ReconcileResult};

/// Movement store backed by a single JSON array file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> ReconcileResult<Vec<RawMovement>> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            ReconcileError::Store(format!("cannot read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            ReconcileError::Store(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    fn write(&self, documents: &[RawMovement]) -> ReconcileResult<()> {
        let text = serde_json::to_string_pretty(documents)
            .map_err(|e| ReconcileError::Store(format!("cannot serialize movements: {e}")))?;
        fs::write(&self.path, text).map_err(|e| {
            ReconcileError::Store(format!("cannot write {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl MovementStore for JsonFileStore {
    async fn fetch_all(&self, collection: &str) -> ReconcileResult<Vec<RawMovement>> {
        debug!(collection, path = %self.path.display(), "reading movement export");
        self.read()
    }

    async fn update_allocations(
        &mut self,
        _collection: &str,
        id: &str,
        allocations: &BTreeMap<String, BigDecimal>,
        summary: &str,
    ) -> ReconcileResult<()> {
        let mut documents = self.read()?;
        let raw = documents
            .iter_mut()
            .find(|raw| raw.id.as_deref() == Some(id))
            .ok_or_else(|| ReconcileError::MovementNotFound(id.to_string()))?;

        let as_f64 = allocations
            .iter()
            .map(|(method, amount)| {
                amount
                    .to_f64()
                    .map(|value| (method.clone(), value))
                    .ok_or_else(|| {
                        ReconcileError::Store(format!("unrepresentable amount for {method}"))
                    })
            })
            .collect::<ReconcileResult<BTreeMap<String, f64>>>()?;

        raw.payment_methods = Some(as_f64);
        raw.payment_summary = Some(summary.to_string());
        self.write(&documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn round_trips_documents_through_the_file() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            r#"[
                {"id": "m1", "type": "venta", "date": "2025-10-01T10:00:00Z",
                 "total": 150.0, "paymentMethods": {"efectivo": 100.0}}
            ]"#,
        )
        .unwrap();

        let mut store = JsonFileStore::new(file.path());
        let all = store.fetch_all("movements").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id.as_deref(), Some("m1"));

        let corrected = BTreeMap::from([
            ("efectivo".to_string(), BigDecimal::from_str("100.00").unwrap()),
            ("mercadoPago".to_string(), BigDecimal::from_str("50.00").unwrap()),
        ]);
        store
            .update_allocations("movements", "m1", &corrected, "efectivo: $100.00, mercadoPago: $50.00")
            .await
            .unwrap();

        let reread = store.fetch_all("movements").await.unwrap();
        assert_eq!(reread[0].payment_methods.as_ref().unwrap()["mercadoPago"], 50.0);
        assert_eq!(reread[0].total, Some(150.0));
    }

    #[tokio::test]
    async fn unreadable_file_is_a_store_error() {
        let store = JsonFileStore::new("/definitely/not/here.json");
        let err = store.fetch_all("movements").await.unwrap_err();
        assert!(matches!(err, ReconcileError::Store(_)));
    }
}
