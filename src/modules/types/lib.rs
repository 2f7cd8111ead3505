//! Type definitions for Querygate
//!
//! Shared vocabulary used across the workspace: the product catalogue,
//! credential categories, query kinds and the wire-level request/response types.

pub mod category;
pub mod kind;
pub mod product;
pub mod runtime;

pub use category::Category;
pub use kind::{ProductFamily, QueryKind};
pub use product::Product;
pub use runtime::{ErrorKind, NormalizedRecord, QueryRequest, ResultEnvelope, Status};
