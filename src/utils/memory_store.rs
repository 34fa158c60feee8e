//! In-memory store implementation for testing

use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::ingest::RawMovement;
use crate::traits::MovementStore;
use crate::types::{ReconcileError, ReconcileResult};

/// In-memory movement store for testing and development. Documents are kept
/// per collection in insertion order, like the production store returns them.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<RawMovement>>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document, assigning a fresh id when the record has none
    /// (the production store mints document ids the same way).
    pub fn insert(&self, collection: &str, mut raw: RawMovement) -> String {
        let id = raw
            .id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        self.collections
            .write()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(raw);
        id
    }

    /// Snapshot one document by id (useful for asserting write-backs).
    pub fn get(&self, collection: &str, id: &str) -> Option<RawMovement> {
        self.collections
            .read()
            .unwrap()
            .get(collection)?
            .iter()
            .find(|raw| raw.id.as_deref() == Some(id))
            .cloned()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.collections.write().unwrap().clear();
    }
}

#[async_trait]
impl MovementStore for MemoryStore {
    async fn fetch_all(&self, collection: &str) -> ReconcileResult<Vec<RawMovement>> {
        Ok(self
            .collections
            .read()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_allocations(
        &mut self,
        collection: &str,
        id: &str,
        allocations: &BTreeMap<String, BigDecimal>,
        summary: &str,
    ) -> ReconcileResult<()> {
        let mut collections = self.collections.write().unwrap();
        let documents = collections
            .get_mut(collection)
            .ok_or_else(|| ReconcileError::Store(format!("unknown collection: {collection}")))?;
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
        Ok(())
    }
}
