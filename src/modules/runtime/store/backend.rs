//! Persistence contract behind the credential store

use async_trait::async_trait;
use querygate_core::{CredentialFilter, CredentialKey, CredentialRecord, Result};

/// Keyed, filterable record persistence.
///
/// Implementations need not serialize writers themselves; the store holds a
/// write lock around every existence check and the write that follows it.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Records matching `filter`, in insertion order.
    async fn read(&self, filter: &CredentialFilter) -> Result<Vec<CredentialRecord>>;

    async fn exists(&self, key: &CredentialKey) -> Result<bool>;

    /// Insert a record whose key is not yet present.
    async fn insert(&self, record: &CredentialRecord) -> Result<()>;

    /// Replace params and manifest of an existing record in place, keeping
    /// its insertion position.
    async fn update(&self, record: &CredentialRecord) -> Result<()>;

    /// Remove the record with `key`; returns false when none existed.
    async fn remove(&self, key: &CredentialKey) -> Result<bool>;

    /// Short backend name used in logs
    fn name(&self) -> &'static str;
}
