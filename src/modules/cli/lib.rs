//! Querygate CLI
//!
//! This crate provides the command-line interface for Querygate:
//! - run: Start the gateway server
//! - seed: Load configured credentials into the store
//! - credentials: List or delete stored credentials

pub mod commands;

pub use commands::{Cli, Commands, LogFormat};
