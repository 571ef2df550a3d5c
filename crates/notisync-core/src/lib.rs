//! # notisync-core
//!
//! Core crate for Notisync. Contains configuration schemas, typed
//! identifiers, pagination types, the shared session token,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other Notisync crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
