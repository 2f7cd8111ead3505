//! In-memory credential backend

use async_trait::async_trait;
use querygate_core::{CredentialFilter, CredentialKey, CredentialRecord, GatewayError, Result};
use tokio::sync::RwLock;

use super::backend::CredentialBackend;

/// Records kept in a vector so lookups preserve insertion order.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<Vec<CredentialRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialBackend for MemoryBackend {
    async fn read(&self, filter: &CredentialFilter) -> Result<Vec<CredentialRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| filter.matches(&r.key))
            .cloned()
            .collect())
    }

    async fn exists(&self, key: &CredentialKey) -> Result<bool> {
        let records = self.records.read().await;
        Ok(records.iter().any(|r| r.key == *key))
    }

    async fn insert(&self, record: &CredentialRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.key == record.key) {
            return Err(GatewayError::Internal(format!(
                "duplicate credential key {}",
                record.key
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &CredentialRecord) -> Result<()> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.key == record.key) {
            Some(existing) => {
                existing.connection_params = record.connection_params.clone();
                existing.manifest = record.manifest.clone();
                Ok(())
            }
            None => Err(GatewayError::NotFound(format!(
                "No credentials found for {}",
                record.key
            ))),
        }
    }

    async fn remove(&self, key: &CredentialKey) -> Result<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.key != *key);
        Ok(records.len() != before)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
