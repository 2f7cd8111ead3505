//! Adapter trait definition

use async_trait::async_trait;
use querygate_core::{normalize, ConnectionParams, LogicalQuery, NativeResult, Result};
use querygate_types::{NormalizedRecord, Product};

/// One backend product behind a uniform execute contract.
///
/// Implementations open a fresh backend session inside `fetch`, run exactly
/// one logical query, and release the session before returning on every path.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Product served by this adapter
    fn product(&self) -> Product;

    /// Expand product-specific shortcuts before the query reaches the safety gate.
    fn prepare(&self, query: LogicalQuery) -> LogicalQuery {
        query
    }

    /// Table the credential itself names, used when the caller gives no hint.
    fn table_fallback(&self, _params: &ConnectionParams) -> Option<String> {
        None
    }

    /// Run the query and return the driver-level result.
    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult>;

    /// Run the query and return normalized records.
    async fn execute(
        &self,
        params: &ConnectionParams,
        query: &LogicalQuery,
    ) -> Result<Vec<NormalizedRecord>> {
        let native = self.fetch(params, query).await?;
        Ok(normalize(native))
    }
}
