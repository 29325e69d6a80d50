//! `condo-auth`: identity and role resolution at the network boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod principal;
pub mod reset;
pub mod roles;

pub use principal::{Principal, UserProfile, lenient_profile};
pub use reset::{ResetCode, ResetCodeError, validate_reset_code};
pub use roles::Role;
