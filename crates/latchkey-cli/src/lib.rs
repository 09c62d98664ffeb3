//! Latchkey CLI - command line client for TTL key-value store locks
//!
//! This crate provides:
//! - Layered configuration (file, environment, flags)
//! - Logging bootstrap with optional rolling log files
//! - Store construction (Redis, or an in-process memory store)
//! - Subcommands driving `LockClient`

pub mod command;
pub mod model;
pub mod startup;
