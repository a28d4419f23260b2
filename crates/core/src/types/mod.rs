//! Core types for Warehub.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod pagination;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use pagination::{Page, PageRequest};
pub use role::{Capability, Role};
pub use status::*;
