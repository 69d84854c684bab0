//! Error types for backend access.

use thiserror::Error;

/// Failure talking to the assistant backend.
///
/// The display strings are shown to the user as-is, either in a banner or as
/// an alert message in the conversation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("{} ({})", .context, .status.as_u16())]
    Status {
        context: &'static str,
        status: reqwest::StatusCode,
    },

    /// The request never completed (connection refused, DNS, bad body).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response parsed but matched none of the expected shapes.
    #[error("{0}")]
    UnexpectedPayload(String),

    /// A URL could not be built from the configured base.
    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(context: &'static str, status: reqwest::StatusCode) -> Self {
        Self::Status { context, status }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedPayload(message.into())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
