//! # Pointgate Shared Library
//!
//! This crate contains the types, storage operations, and business logic
//! shared by the Pointgate API server and its tooling.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Password hashing and bearer token utilities
//! - `codes`: Verification code issuance (with notification dispatch)
//! - `ledger`: Points ledger (consume, recharge, settlement)
//! - `notify`: Notification sender abstraction (email / SMS gateway)
//! - `db`: Connection pool and migration runner

pub mod auth;
pub mod codes;
pub mod db;
pub mod ledger;
pub mod models;
pub mod notify;

/// Current version of the Pointgate shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
