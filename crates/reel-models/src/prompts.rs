//! Prompt list decoding.
//!
//! Prompts arrive as base64-encoded JSON: an array of strings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Errors decoding a prompt list.
#[derive(Debug, Error)]
pub enum PromptDecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("prompt list is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("prompt list is not a JSON array of strings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a base64 JSON array of prompts.
pub fn decode_prompts(encoded: &str) -> Result<Vec<String>, PromptDecodeError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let text = String::from_utf8(bytes)?;
    let prompts: Vec<String> = serde_json::from_str(&text)?;
    Ok(prompts)
}
