//! Adapter registry: one adapter instance per product

use querygate_core::{GatewayError, Result};
use querygate_types::Product;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;

use super::rest::{
    AirtableAdapter, FreshworksAdapter, HubspotAdapter, OdooAdapter, SapAdapter, ServicenowAdapter,
    ShopifyAdapter, WixAdapter, WoocommerceAdapter, ZohoAdapter,
};
use super::traits::Adapter;
use super::{
    ClickhouseAdapter, DatabricksAdapter, InfluxdbAdapter, LokiAdapter, MongodbAdapter, MysqlAdapter,
    Neo4jAdapter, PostgresAdapter, PrometheusAdapter, RedisAdapter, SearchAdapter, SheetsAdapter,
    SnowflakeAdapter, TempoAdapter,
};

/// Maps every product to the adapter that serves it.
///
/// Adapters are stateless between calls, so one shared instance per product
/// is enough for any number of concurrent dispatches.
pub struct AdapterRegistry {
    adapters: HashMap<Product, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with the built-in adapter for every product.
    pub fn with_defaults(client: Client) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PostgresAdapter::postgresql()));
        registry.register(Arc::new(PostgresAdapter::supabase()));
        registry.register(Arc::new(PostgresAdapter::timescaledb()));
        registry.register(Arc::new(MysqlAdapter::new()));
        registry.register(Arc::new(SnowflakeAdapter::new(client.clone())));
        registry.register(Arc::new(DatabricksAdapter::new(client.clone())));
        registry.register(Arc::new(ClickhouseAdapter::new(client.clone())));
        registry.register(Arc::new(MongodbAdapter::new()));
        registry.register(Arc::new(Neo4jAdapter::new(client.clone())));
        registry.register(Arc::new(RedisAdapter::new()));
        registry.register(Arc::new(SearchAdapter::elasticsearch(client.clone())));
        registry.register(Arc::new(SearchAdapter::opensearch(client.clone())));
        registry.register(Arc::new(InfluxdbAdapter::new(client.clone())));
        registry.register(Arc::new(PrometheusAdapter::new(client.clone())));
        registry.register(Arc::new(LokiAdapter::new(client.clone())));
        registry.register(Arc::new(TempoAdapter::new(client.clone())));
        registry.register(Arc::new(SheetsAdapter::new(client.clone())));
        registry.register(Arc::new(AirtableAdapter::new(client.clone())));
        registry.register(Arc::new(ZohoAdapter::new(client.clone())));
        registry.register(Arc::new(FreshworksAdapter::new(client.clone())));
        registry.register(Arc::new(ServicenowAdapter::new(client.clone())));
        registry.register(Arc::new(OdooAdapter::new(client.clone())));
        registry.register(Arc::new(SapAdapter::new(client.clone())));
        registry.register(Arc::new(HubspotAdapter::new(client.clone())));
        registry.register(Arc::new(ShopifyAdapter::new(client.clone())));
        registry.register(Arc::new(WoocommerceAdapter::new(client.clone())));
        registry.register(Arc::new(WixAdapter::new(client)));
        registry
    }

    /// Register an adapter, replacing any previous one for the same product.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.product(), adapter);
    }

    /// Get the adapter for a product
    pub fn get(&self, product: Product) -> Result<Arc<dyn Adapter>> {
        self.adapters
            .get(&product)
            .cloned()
            .ok_or_else(|| GatewayError::UnsupportedProduct(product.to_string()))
    }

    /// Check if a product has an adapter
    pub fn has(&self, product: Product) -> bool {
        self.adapters.contains_key(&product)
    }

    /// Products with a registered adapter, in catalogue order
    pub fn products(&self) -> Vec<Product> {
        let mut products: Vec<_> = self.adapters.keys().copied().collect();
        products.sort();
        products
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
