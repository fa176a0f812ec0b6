use super::Sender;
use crate::capture::RegionRejection;
use crate::error::{RelayError, Result};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no string `type` field")]
    MissingType,

    #[error("{type_name} has the wrong shape: {reason}")]
    Malformed { type_name: String, reason: String },

    #[error("text payload is empty")]
    EmptyText,

    #[error("bad region: {0}")]
    Region(#[from] RegionRejection),

    #[error("bad image payload: {0}")]
    Image(String),

    #[error("{0} must be sent from a tab")]
    MissingSenderTab(&'static str),
}

/// Rejects any sender whose identity is not exactly `expected_id`.
pub fn authenticate(sender: &Sender, expected_id: &str) -> Result<()> {
    match sender.id.as_deref() {
        Some(id) if id == expected_id => Ok(()),
        other => {
            let who = other.unwrap_or("<anonymous>");
            log::warn!(
                "[SECURITY] Rejected message from unauthorized sender '{}' (url: {:?})",
                who,
                sender.url
            );
            Err(RelayError::Unauthorized(who.to_string()))
        }
    }
}

/// Truncates `text` to at most `max_chars` characters, on a char boundary.
pub fn cap_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            log::warn!(
                "Truncating text payload from {} bytes to {} chars",
                text.len(),
                max_chars
            );
            text[..byte_idx].to_string()
        }
        None => text.to_string(),
    }
}
