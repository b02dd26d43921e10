//! In-memory consumer storage implementation
//!
//! Suitable for development and testing.

use crate::consumers::types::{ConsumerSummary, ProtectedConsumerRecord};
use crate::errors::StorageError;
use crate::storage::traits::{ConsumerStore, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Mutex;

/// In-memory implementation of consumer storage
#[derive(Default)]
pub struct MemoryConsumerStore {
    consumers: Mutex<BTreeMap<String, ProtectedConsumerRecord>>,
}

impl MemoryConsumerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored consumers
    pub fn len(&self) -> usize {
        self.consumers.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConsumerStore for MemoryConsumerStore {
    async fn insert_consumer(&self, record: &ProtectedConsumerRecord) -> Result<()> {
        let mut consumers = self
            .consumers
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        match consumers.entry(record.component_id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(record.component_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn get_consumer(&self, component_id: &str) -> Result<Option<ProtectedConsumerRecord>> {
        let consumers = self
            .consumers
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        Ok(consumers.get(component_id).cloned())
    }

    async fn list_consumers(&self) -> Result<Vec<ConsumerSummary>> {
        let consumers = self
            .consumers
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        Ok(consumers.values().map(|record| record.summary()).collect())
    }
}
