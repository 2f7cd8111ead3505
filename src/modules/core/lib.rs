//! Core domain logic for Querygate
//!
//! This crate holds the pieces of the gateway that never touch a network:
//! the credential and query domain model, the error taxonomy, the query
//! safety gate, the SQL clause skeleton used for `FROM` injection, and the
//! response normalizer.

pub mod domain;
pub mod error;
pub mod normalize;
pub mod safety;
pub mod sql;

pub use domain::*;
pub use error::{GatewayError, Result};
pub use normalize::{normalize, NativeResult, NativeValue};
pub use safety::{RejectionReason, SafetyGate, ValidatedQuery};
