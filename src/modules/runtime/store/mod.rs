//! Credential store
//!
//! Resolves (category, owner, connection, product) keys to connection
//! parameters and capability manifests. Reads run concurrently; writes are
//! serialized so the existence check and the write that follows it cannot
//! interleave with another writer.

mod backend;
mod memory;
mod sqlite;

pub use backend::CredentialBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use querygate_core::{
    CapabilityManifest, ConnectionParams, CredentialFilter, CredentialKey, CredentialRecord,
    GatewayError, Result,
};
use querygate_types::Category;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn CredentialBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by the SQLite file at `path`.
    pub async fn open(path: &str) -> Result<Self> {
        let backend = SqliteBackend::open(path).await?;
        Ok(Self::new(Arc::new(backend)))
    }

    /// Store that lives for the process only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Insert or replace the record for `key`.
    ///
    /// `params` must carry every key in `manifest.required_connection_params`;
    /// otherwise the write fails and any existing record is left untouched.
    pub async fn upsert(
        &self,
        key: CredentialKey,
        params: ConnectionParams,
        manifest: CapabilityManifest,
    ) -> Result<()> {
        manifest.check(&key.product_name, &params)?;
        let record = CredentialRecord {
            key,
            connection_params: params,
            manifest,
        };

        let _guard = self.write_lock.lock().await;
        if self.backend.exists(&record.key).await? {
            self.backend.update(&record).await?;
            debug!(key = %record.key, "Updated credential");
        } else {
            self.backend.insert(&record).await?;
            info!(key = %record.key, backend = self.backend.name(), "Stored credential");
        }
        Ok(())
    }

    /// All records matching `filter`, in insertion order; fails when none match.
    pub async fn lookup(&self, filter: &CredentialFilter) -> Result<Vec<CredentialRecord>> {
        let records = self.backend.read(filter).await?;
        if records.is_empty() {
            return Err(GatewayError::NotFound(format!(
                "No credentials found for {}",
                describe(filter)
            )));
        }
        Ok(records)
    }

    /// First matching record by insertion order.
    pub async fn resolve(&self, filter: &CredentialFilter) -> Result<CredentialRecord> {
        let mut records = self.lookup(filter).await?;
        Ok(records.remove(0))
    }

    /// Records matching `filter`; empty when none match.
    pub async fn list(&self, filter: &CredentialFilter) -> Result<Vec<CredentialRecord>> {
        self.backend.read(filter).await
    }

    /// Remove exactly one record.
    pub async fn delete(&self, key: &CredentialKey) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.backend.remove(key).await? {
            info!(key = %key, "Deleted credential");
            Ok(())
        } else {
            Err(GatewayError::NotFound(format!("No credentials found for {}", key)))
        }
    }

    /// Manifest of the first record stored for `product_name` in `category`.
    pub async fn manifest(&self, category: Category, product_name: &str) -> Result<CapabilityManifest> {
        let filter = CredentialFilter::new(category).product(product_name);
        Ok(self.resolve(&filter).await?.manifest)
    }

    /// Product name to manifest for a whole category; the first record per
    /// product wins.
    pub async fn manifests(&self, category: Category) -> Result<BTreeMap<String, CapabilityManifest>> {
        let mut manifests = BTreeMap::new();
        for record in self.backend.read(&CredentialFilter::new(category)).await? {
            manifests
                .entry(record.key.product_name)
                .or_insert(record.manifest);
        }
        Ok(manifests)
    }
}

fn describe(filter: &CredentialFilter) -> String {
    let part = |v: &Option<String>| v.clone().unwrap_or_else(|| "*".to_string());
    format!(
        "{}/{}/{}/{}",
        filter.category,
        part(&filter.owner_id),
        part(&filter.connection_id),
        part(&filter.product_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use querygate_types::{Product, QueryKind};

    fn pg_manifest() -> CapabilityManifest {
        CapabilityManifest::for_product(Product::Postgresql)
    }

    fn pg_params(host: &str) -> ConnectionParams {
        ConnectionParams::new()
            .with("host", host)
            .with("port", 5432i64)
            .with("user", "app")
            .with("password", "secret")
            .with("database", "shop")
    }

    fn key(owner: &str, connection: &str, product: &str) -> CredentialKey {
        CredentialKey::new(Category::Db, owner, connection, product)
    }

    async fn stores() -> Vec<CredentialStore> {
        vec![
            CredentialStore::in_memory(),
            CredentialStore::new(Arc::new(SqliteBackend::open_in_memory().await.unwrap())),
        ]
    }

    #[tokio::test]
    async fn test_failed_write_leaves_prior_record() {
        for store in stores().await {
            store
                .upsert(key("u1", "c1", "postgresql"), pg_params("db-a"), pg_manifest())
                .await
                .unwrap();

            let incomplete = ConnectionParams::new().with("host", "db-b");
            let err = store
                .upsert(key("u1", "c1", "postgresql"), incomplete, pg_manifest())
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::Validation(_)));
            assert!(err.to_string().contains("password"));

            let record = store
                .resolve(&CredentialFilter::new(Category::Db).owner("u1"))
                .await
                .unwrap();
            assert_eq!(record.connection_params.get("host").as_deref(), Some("db-a"));
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        for store in stores().await {
            for _ in 0..3 {
                store
                    .upsert(key("u1", "c1", "postgresql"), pg_params("db-a"), pg_manifest())
                    .await
                    .unwrap();
            }
            let records = store.lookup(&CredentialFilter::new(Category::Db)).await.unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].connection_params, pg_params("db-a"));
            assert_eq!(records[0].manifest, pg_manifest());
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_params() {
        for store in stores().await {
            store
                .upsert(key("u1", "c1", "postgresql"), pg_params("db-a"), pg_manifest())
                .await
                .unwrap();
            store
                .upsert(key("u1", "c1", "postgresql"), pg_params("db-b"), pg_manifest())
                .await
                .unwrap();
            let records = store.lookup(&CredentialFilter::new(Category::Db)).await.unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].connection_params.get("host").as_deref(), Some("db-b"));
        }
    }

    #[tokio::test]
    async fn test_delete_then_lookup_not_found() {
        for store in stores().await {
            let k = key("u1", "c1", "postgresql");
            store.upsert(k.clone(), pg_params("db-a"), pg_manifest()).await.unwrap();
            store.delete(&k).await.unwrap();

            let err = store
                .lookup(&CredentialFilter::new(Category::Db).product("postgresql"))
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::NotFound(_)));
            assert!(matches!(store.delete(&k).await, Err(GatewayError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn test_categories_are_independent() {
        for store in stores().await {
            let manifest = CapabilityManifest::for_product(Product::Zoho);
            let params = ConnectionParams::new()
                .with("client_id", "id")
                .with("client_secret", "s")
                .with("refresh_token", "r");
            store
                .upsert(
                    CredentialKey::new(Category::App, "u1", "c1", "zoho"),
                    params.clone(),
                    manifest.clone(),
                )
                .await
                .unwrap();
            store
                .upsert(
                    CredentialKey::new(Category::Ecom, "u1", "c1", "zoho"),
                    params.with("app", "inventory"),
                    manifest,
                )
                .await
                .unwrap();

            store
                .delete(&CredentialKey::new(Category::App, "u1", "c1", "zoho"))
                .await
                .unwrap();
            let ecom = store
                .resolve(&CredentialFilter::new(Category::Ecom).product("zoho"))
                .await
                .unwrap();
            assert_eq!(ecom.connection_params.get("app").as_deref(), Some("inventory"));
            assert!(store
                .lookup(&CredentialFilter::new(Category::App))
                .await
                .is_err());
        }
    }

    #[tokio::test]
    async fn test_first_match_by_insertion_order() {
        for store in stores().await {
            store
                .upsert(key("u2", "c9", "postgresql"), pg_params("first"), pg_manifest())
                .await
                .unwrap();
            store
                .upsert(key("u1", "c1", "postgresql"), pg_params("second"), pg_manifest())
                .await
                .unwrap();
            // Updating the first record must not move it behind the second
            store
                .upsert(key("u2", "c9", "postgresql"), pg_params("first-updated"), pg_manifest())
                .await
                .unwrap();

            let record = store
                .resolve(&CredentialFilter::new(Category::Db).product("postgresql"))
                .await
                .unwrap();
            assert_eq!(record.connection_params.get("host").as_deref(), Some("first-updated"));
        }
    }

    #[tokio::test]
    async fn test_manifests_per_category() {
        for store in stores().await {
            store
                .upsert(key("u1", "c1", "postgresql"), pg_params("a"), pg_manifest())
                .await
                .unwrap();
            let sheet = CapabilityManifest::new(QueryKind::Formula).require(["sheet_id"]);
            store
                .upsert(
                    CredentialKey::new(Category::Ss, "u1", "c1", "googlesheet"),
                    ConnectionParams::new().with("sheet_id", "abc"),
                    sheet.clone(),
                )
                .await
                .unwrap();

            let db = store.manifests(Category::Db).await.unwrap();
            assert_eq!(db.keys().collect::<Vec<_>>(), vec!["postgresql"]);
            assert_eq!(store.manifest(Category::Ss, "googlesheet").await.unwrap(), sheet);
            assert!(store.manifests(Category::Doi).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_sqlite_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.db");
        let path = path.to_str().unwrap();

        let store = CredentialStore::open(path).await.unwrap();
        store
            .upsert(key("u1", "c1", "postgresql"), pg_params("db-a"), pg_manifest())
            .await
            .unwrap();
        drop(store);

        let reopened = CredentialStore::open(path).await.unwrap();
        let records = reopened.lookup(&CredentialFilter::new(Category::Db)).await.unwrap();
        assert_eq!(records.len(), 1);
    }
}
