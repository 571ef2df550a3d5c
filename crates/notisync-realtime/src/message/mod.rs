//! Duplex channel message types, parsing, and validation.

pub mod parser;
pub mod types;
pub mod validator;

pub use parser::{encode, parse_inbound};
pub use types::{ClientMessage, Inbound, ServerEnvelope, ServerEvent};
