//! Runtime server for Querygate
//!
//! This crate provides the credential store, the backend adapters, the
//! dispatch router and the HTTP surface in front of them.

pub mod adapters;
pub mod dispatch;
pub mod handlers;
pub mod server;
pub mod state;
pub mod store;

pub use adapters::{Adapter, AdapterRegistry};
pub use dispatch::{DispatchRequest, Dispatcher};
pub use handlers::{CredentialsHandler, MetadataHandler, QueryHandler};
pub use server::Runtime;
pub use store::CredentialStore;
