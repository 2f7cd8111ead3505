//! SQLite credential backend

use async_trait::async_trait;
use querygate_core::{
    CapabilityManifest, ConnectionParams, CredentialFilter, CredentialKey, CredentialRecord,
    GatewayError, Result,
};
use querygate_types::Category;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::debug;

use super::backend::CredentialBackend;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS credentials (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    connection_id TEXT NOT NULL,
    product_name TEXT NOT NULL,
    connection_params TEXT NOT NULL,
    manifest TEXT NOT NULL,
    UNIQUE (category, owner_id, connection_id, product_name)
)
"#;

fn store_error(e: sqlx::Error) -> GatewayError {
    GatewayError::Internal(format!("credential store: {}", e))
}

/// Credential records in one SQLite table, params and manifest as JSON text.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(store_error)?;
        debug!(path = %path, "Opened credential database");
        Self::with_pool(pool).await
    }

    /// Private in-memory database; a single connection keeps it alive.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(store_error)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(store_error)?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(store_error)?;
        Ok(Self { pool })
    }

    fn decode(row: &SqliteRow) -> Result<CredentialRecord> {
        let category: String = row.try_get("category").map_err(store_error)?;
        let category = Category::from_str(&category).map_err(GatewayError::Internal)?;
        let owner_id: String = row.try_get("owner_id").map_err(store_error)?;
        let connection_id: String = row.try_get("connection_id").map_err(store_error)?;
        let product_name: String = row.try_get("product_name").map_err(store_error)?;
        let params: String = row.try_get("connection_params").map_err(store_error)?;
        let manifest: String = row.try_get("manifest").map_err(store_error)?;

        Ok(CredentialRecord {
            key: CredentialKey::new(category, owner_id, connection_id, product_name),
            connection_params: serde_json::from_str::<ConnectionParams>(&params)?,
            manifest: serde_json::from_str::<CapabilityManifest>(&manifest)?,
        })
    }
}

#[async_trait]
impl CredentialBackend for SqliteBackend {
    async fn read(&self, filter: &CredentialFilter) -> Result<Vec<CredentialRecord>> {
        let rows = sqlx::query(
            "SELECT category, owner_id, connection_id, product_name, connection_params, manifest \
             FROM credentials \
             WHERE category = ?1 \
               AND (?2 IS NULL OR owner_id = ?2) \
               AND (?3 IS NULL OR connection_id = ?3) \
               AND (?4 IS NULL OR product_name = ?4) \
             ORDER BY id",
        )
        .bind(filter.category.as_str())
        .bind(filter.owner_id.as_deref())
        .bind(filter.connection_id.as_deref())
        .bind(filter.product_name.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter().map(Self::decode).collect()
    }

    async fn exists(&self, key: &CredentialKey) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM credentials \
             WHERE category = ? AND owner_id = ? AND connection_id = ? AND product_name = ?",
        )
        .bind(key.category.as_str())
        .bind(&key.owner_id)
        .bind(&key.connection_id)
        .bind(&key.product_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(row.is_some())
    }

    async fn insert(&self, record: &CredentialRecord) -> Result<()> {
        let key = &record.key;
        sqlx::query(
            "INSERT INTO credentials \
             (category, owner_id, connection_id, product_name, connection_params, manifest) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(key.category.as_str())
        .bind(&key.owner_id)
        .bind(&key.connection_id)
        .bind(&key.product_name)
        .bind(serde_json::to_string(&record.connection_params)?)
        .bind(serde_json::to_string(&record.manifest)?)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn update(&self, record: &CredentialRecord) -> Result<()> {
        let key = &record.key;
        let result = sqlx::query(
            "UPDATE credentials SET connection_params = ?, manifest = ? \
             WHERE category = ? AND owner_id = ? AND connection_id = ? AND product_name = ?",
        )
        .bind(serde_json::to_string(&record.connection_params)?)
        .bind(serde_json::to_string(&record.manifest)?)
        .bind(key.category.as_str())
        .bind(&key.owner_id)
        .bind(&key.connection_id)
        .bind(&key.product_name)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::NotFound(format!("No credentials found for {}", key)));
        }
        Ok(())
    }

    async fn remove(&self, key: &CredentialKey) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM credentials \
             WHERE category = ? AND owner_id = ? AND connection_id = ? AND product_name = ?",
        )
        .bind(key.category.as_str())
        .bind(&key.owner_id)
        .bind(&key.connection_id)
        .bind(&key.product_name)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
