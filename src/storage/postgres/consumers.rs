//! PostgreSQL implementation for consumer storage

use crate::consumers::types::{ConsumerSummary, OAuthVersion, ProtectedConsumerRecord};
use crate::errors::StorageError;
use crate::storage::traits::{ConsumerStore, Result};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};

/// PostgreSQL implementation of consumer storage
pub struct PostgresConsumerStore {
    pool: PgPool,
}

impl PostgresConsumerStore {
    /// Create a new PostgreSQL consumer store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        super::migrate(&self.pool).await
    }

    fn string_to_version(s: &str) -> Result<OAuthVersion> {
        OAuthVersion::parse(s)
            .ok_or_else(|| StorageError::InvalidData(format!("Unknown oauth version: {}", s)))
    }

    fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        row.try_get(name)
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get {}: {}", name, e)))
    }

    /// Convert PostgreSQL row to ProtectedConsumerRecord
    fn row_to_record(row: &PgRow) -> Result<ProtectedConsumerRecord> {
        let oauth_version: String = Self::column(row, "oauth_version")?;

        Ok(ProtectedConsumerRecord {
            component_id: Self::column(row, "component_id")?,
            friendly_name: Self::column(row, "friendly_name")?,
            app_key: Self::column(row, "app_key")?,
            oauth_version: Self::string_to_version(&oauth_version)?,
            auth_url: Self::column(row, "auth_url")?,
            token_url: Self::column(row, "token_url")?,
            request_token_url: Self::column(row, "request_token_url")?,
            secret_remote_cipher: Self::column(row, "secret_remote_cipher")?,
            secret_local_cipher: Self::column(row, "secret_local_cipher")?,
            created_at: Self::column(row, "created_at")?,
        })
    }
}

#[async_trait]
impl ConsumerStore for PostgresConsumerStore {
    async fn insert_consumer(&self, record: &ProtectedConsumerRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO consumers (
                component_id, friendly_name, app_key, oauth_version, auth_url, token_url,
                request_token_url, secret_remote_cipher, secret_local_cipher, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&record.component_id)
        .bind(&record.friendly_name)
        .bind(&record.app_key)
        .bind(record.oauth_version.as_str())
        .bind(&record.auth_url)
        .bind(&record.token_url)
        .bind(&record.request_token_url)
        .bind(&record.secret_remote_cipher)
        .bind(&record.secret_local_cipher)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StorageError::Conflict(record.component_id.clone())
            }
            e => StorageError::DatabaseError(e.to_string()),
        })?;

        Ok(())
    }

    async fn get_consumer(&self, component_id: &str) -> Result<Option<ProtectedConsumerRecord>> {
        let row = sqlx::query("SELECT * FROM consumers WHERE component_id = $1")
            .bind(component_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn list_consumers(&self) -> Result<Vec<ConsumerSummary>> {
        let rows = sqlx::query(
            "SELECT component_id, friendly_name, app_key, oauth_version FROM consumers ORDER BY component_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let oauth_version: String = Self::column(row, "oauth_version")?;
                Ok(ConsumerSummary {
                    component_id: Self::column(row, "component_id")?,
                    friendly_name: Self::column(row, "friendly_name")?,
                    app_key: Self::column(row, "app_key")?,
                    oauth_version: Self::string_to_version(&oauth_version)?,
                })
            })
            .collect()
    }
}
