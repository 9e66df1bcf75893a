//! Error types for provider operations.

use repolink_types::{MalformedUrl, ProviderKind};
use thiserror::Error;

/// Errors returned by provider adapters.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The adapter was constructed without credentials.
    #[error("{0} provider is disabled: no credentials configured")]
    Disabled(ProviderKind),

    /// The repository URL could not be parsed.
    #[error(transparent)]
    MalformedUrl(#[from] MalformedUrl),

    /// Repository or resource not found on the provider.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider rejected the configured credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimitExceeded(u64),

    /// The provider answered with an unexpected status.
    #[error("API request failed ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or description.
        message: String,
    },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProviderError {
    /// HTTP-like status code describing the failure.
    pub fn status(&self) -> u16 {
        match self {
            Self::Disabled(_) => 503,
            Self::MalformedUrl(_) => 400,
            Self::NotFound(_) => 404,
            Self::AuthenticationFailed(_) => 401,
            Self::RateLimitExceeded(_) => 429,
            Self::Api { status, .. } => *status,
            Self::Network(_) | Self::Decode(_) => 502,
            Self::InvalidConfig(_) => 500,
        }
    }

    /// Short human-readable status.
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::Disabled(_) => "disabled",
            Self::MalformedUrl(_) => "malformed url",
            Self::NotFound(_) => "not found",
            Self::AuthenticationFailed(_) => "unauthorized",
            Self::RateLimitExceeded(_) => "rate limited",
            _ => "error",
        }
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// A webhook delivery that cannot be turned into a canonical event.
///
/// Callers reject the delivery and must not trigger a build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The event name is not in the provider's lookup table.
    #[error("unsupported {provider} event: {event}")]
    UnsupportedEvent {
        /// Provider the delivery was routed to.
        provider: ProviderKind,
        /// Provider-native event name.
        event: String,
    },

    /// The body is not JSON or lacks the source repository.
    #[error("malformed {provider} payload: {reason}")]
    MalformedPayload {
        /// Provider the delivery was routed to.
        provider: ProviderKind,
        /// What was wrong with the payload.
        reason: String,
    },
}
