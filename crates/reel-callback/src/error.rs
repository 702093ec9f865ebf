//! Callback error types.
//!
//! These only surface while building a reporter. Delivery problems are
//! reported as a `DeliveryStatus`, never as an error.

use thiserror::Error;

pub type CallbackResult<T> = Result<T, CallbackError>;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid auth header: {0}")]
    InvalidHeader(String),
}
