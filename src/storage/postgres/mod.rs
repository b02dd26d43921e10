//! PostgreSQL storage implementations
//!
//! PostgreSQL is suitable for production deployments.

mod consumers;

use crate::errors::StorageError;
use crate::storage::traits::Result;
use sqlx::postgres::PgPool;

pub use consumers::PostgresConsumerStore;

/// Run database migrations
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
    Ok(())
}
