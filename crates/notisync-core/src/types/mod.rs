//! Core type definitions used across the Notisync workspace.

pub mod id;
pub mod pagination;
pub mod token;

pub use id::*;
pub use pagination::{PageRequest, PageResponse};
pub use token::SessionToken;
