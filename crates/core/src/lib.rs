//! Warehub Core - Shared domain types.
//!
//! This crate provides the types used across all Warehub components:
//! - `portal` - The warehouse rental web application
//! - `cli` - Command-line tools for migrations, admin provisioning and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, status enums, roles and pagination

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
