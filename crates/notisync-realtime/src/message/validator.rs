//! Message validation rules.

use notisync_core::error::AppError;
use notisync_core::result::AppResult;

/// Maximum accepted inbound frame size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 65_536;

/// Maximum topic name length.
const MAX_CHANNEL_NAME_LEN: usize = 256;

/// Rejects oversized or blank inbound frames before parsing.
pub fn validate_inbound(raw: &str) -> AppResult<()> {
    if raw.len() > MAX_MESSAGE_SIZE {
        return Err(AppError::validation(format!(
            "Frame of {} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit",
            raw.len()
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty frame"));
    }

    Ok(())
}

/// Topic names are 1-256 characters of alphanumerics, `:`, `-` and `_`.
pub fn validate_channel_name(channel: &str) -> AppResult<()> {
    if channel.is_empty() || channel.len() > MAX_CHANNEL_NAME_LEN {
        return Err(AppError::validation(format!(
            "Topic name must be 1-{MAX_CHANNEL_NAME_LEN} characters"
        )));
    }

    if let Some(bad) = channel
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_')))
    {
        return Err(AppError::validation(format!(
            "Topic name '{channel}' contains invalid character {bad:?}"
        )));
    }

    Ok(())
}
