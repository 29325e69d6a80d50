//! `condo-core`: shared building blocks for the console.
//!
//! This crate contains **pure** primitives (no IO, no async).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{NotificationId, SubjectId, TenantId};
