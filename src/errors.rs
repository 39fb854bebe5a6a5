use thiserror::Error;

use crate::json_path::PathError;
use crate::schema::SchemaError;

// anyhow stays inside configuration loading; callers match on AiError

/// Errors surfaced by every adapter and by the client façade
#[derive(Error, Debug)]
pub enum AiError {
    #[error("{provider} does not support {capability}: {detail}")]
    CapabilityUnsupported {
        provider: String,
        capability: String,
        detail: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed response from {provider}: {reason}")]
    MalformedResponse { provider: String, reason: String },

    #[error("No content in {provider} response at any of {paths:?}")]
    MissingContent {
        provider: String,
        paths: Vec<String>,
    },

    #[error("{provider} reported an error: {message}")]
    VendorError { provider: String, message: String },

    #[error("{provider} stopped at the token limit: {detail}")]
    TokenLimitExceeded { provider: String, detail: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    InvalidPath(#[from] PathError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AiError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn unsupported(
        provider: impl Into<String>,
        capability: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::CapabilityUnsupported {
            provider: provider.into(),
            capability: capability.into(),
            detail: detail.into(),
        }
    }

    pub fn malformed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn vendor(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::VendorError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn token_limit(provider: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TokenLimitExceeded {
            provider: provider.into(),
            detail: detail.into(),
        }
    }

    /// Classify a non-2xx response by status code.
    ///
    /// The message is the vendor's own when the body is an error envelope,
    /// otherwise the trimmed body. Unmapped codes become [`AiError::Http`].
    ///
    /// ```rust
    /// let err = ai_facade::AiError::from_status(429, r#"{"error":{"message":"slow down"}}"#);
    /// assert!(matches!(err, ai_facade::AiError::RateLimited(ref m) if m == "slow down"));
    /// ```
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| crate::providers::vendor_error_message(&json))
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            429 => Self::RateLimited(message),
            502..=504 => Self::Unavailable(message),
            _ => Self::Http {
                status,
                body: message,
            },
        }
    }

    /// Whether the caller may reasonably retry with a larger token budget
    pub fn is_token_limit(&self) -> bool {
        matches!(self, Self::TokenLimitExceeded { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Unavailable(_) | Self::Transport(_)
        )
    }
}

/// Convert from anyhow::Error to AiError for configuration failures
impl From<anyhow::Error> for AiError {
    fn from(err: anyhow::Error) -> Self {
        // Log the full error chain for debugging
        tracing::error!("Configuration error: {:?}", err);
        AiError::Config(format!("{:#}", err))
    }
}

/// Helper type for results surfaced by the façade
pub type AiResult<T> = Result<T, AiError>;
