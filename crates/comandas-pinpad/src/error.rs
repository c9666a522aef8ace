//! # Provider Error Types
//!
//! ```text
//! reqwest::Error ──► ProviderError::Http ─────────┐
//! non-2xx response ─► ProviderError::Api ─────────┼──► ApiError 502
//! unreadable body ──► ProviderError::InvalidResponse ┘
//!
//! ProviderError::Unsupported / MissingCredential / InvalidRequest ──► 400
//! ```

use thiserror::Error;

/// Payment provider failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The pinpad's provider has no client.
    #[error("Provider '{0}' is not supported")]
    Unsupported(String),

    /// The pinpad lacks a credential the provider needs.
    #[error("Pinpad is missing {0}")]
    MissingCredential(&'static str),

    /// The caller asked for something the provider can't do.
    #[error("{0}")]
    InvalidRequest(String),

    /// Transport failure: DNS, TLS, timeout, connection reset.
    #[error("Communication error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an error status.
    #[error("{provider} error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// The provider answered 2xx with a body we can't use.
    #[error("Unexpected response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    /// OAuth token request failed.
    #[error("{provider} authentication failed: {message}")]
    Auth {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    /// True for errors caused by the request or pinpad configuration,
    /// as opposed to the provider or the network.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ProviderError::Unsupported(_) | ProviderError::MissingCredential(_) | ProviderError::InvalidRequest(_)
        )
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
