//! Errors raised by provider backends.

use thiserror::Error;

/// Transport, authentication, rate-limit or protocol failure from a provider.
///
/// Always recoverable from the pipeline's point of view: the next provider in
/// the chain gets a turn.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid response body: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Authentication(body),
            429 => Self::RateLimited(body),
            code => Self::Api { status: code, body },
        }
    }
}
