//! SQLite storage implementations
//!
//! SQLite is suitable for single-instance deployments and development.

mod consumers;

use crate::errors::StorageError;
use crate::storage::traits::Result;
use sqlx::sqlite::SqlitePool;

pub use consumers::SqliteConsumerStore;

/// Run database migrations
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
    Ok(())
}
