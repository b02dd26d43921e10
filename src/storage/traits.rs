//! Storage trait definitions for the consumer registry.

use crate::consumers::types::{ConsumerSummary, ProtectedConsumerRecord};
use crate::errors::StorageError;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for storing and retrieving protected consumer records
#[async_trait]
pub trait ConsumerStore: Send + Sync {
    /// Insert a new consumer.
    ///
    /// Fails with [`StorageError::Conflict`] if the component id is already
    /// registered; the stored record is left untouched.
    async fn insert_consumer(&self, record: &ProtectedConsumerRecord) -> Result<()>;

    /// Retrieve a consumer by component id
    async fn get_consumer(&self, component_id: &str) -> Result<Option<ProtectedConsumerRecord>>;

    /// List all consumers, identifying fields only
    async fn list_consumers(&self) -> Result<Vec<ConsumerSummary>>;
}
