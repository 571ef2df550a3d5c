//! Inbound frame parsing.

use serde_json::Value;

use notisync_core::error::AppError;
use notisync_core::result::AppResult;

use super::types::{ClientMessage, Inbound, ServerEnvelope};
use super::validator::validate_inbound;

/// Envelope types this client understands.
const KNOWN_TYPES: [&str; 4] = ["created", "read", "deleted", "ping"];

/// Parse one text frame.
///
/// Unknown `type` values yield [`Inbound::Ignored`]. Anything else that
/// cannot be understood is an error; callers drop it and keep the
/// channel open.
pub fn parse_inbound(raw: &str) -> AppResult<Inbound> {
    validate_inbound(raw)?;

    let value: Value = serde_json::from_str(raw)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::validation("Envelope has no string 'type' field"))?
        .to_string();

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Ok(Inbound::Ignored(kind));
    }

    let envelope: ServerEnvelope = serde_json::from_value(value)?;
    Ok(envelope.into())
}

/// Serialize an outbound message.
pub fn encode(message: &ClientMessage) -> AppResult<String> {
    Ok(serde_json::to_string(message)?)
}
