//! Domain model: credentials, manifests, logical queries and configuration

mod credential;
mod manifest;
mod model;
mod query;
mod types;

pub use credential::{ConnectionParams, CredentialFilter, CredentialKey, CredentialRecord, ParamValue};
pub use manifest::CapabilityManifest;
pub use model::{CredentialSeed, GatewayConfig};
pub use query::{scalar_text, LogicalQuery, QueryHints, RawQuery};
pub use types::{ServerConfig, StoreConfig, DEFAULT_PORT, DEFAULT_STORE_PATH};
