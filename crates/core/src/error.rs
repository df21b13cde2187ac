//! Error types shared by the gateways and the reconciliation engine.

use thiserror::Error;

/// Failure of the retrying HTTP client.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Every attempt failed; carries the last failure observed.
    #[error("{method} {url} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// HTTP method of the request.
        method: reqwest::Method,
        /// Target URL with secrets stripped from the query string.
        url: String,
        /// Number of attempts made.
        attempts: usize,
        /// Description of the final failure.
        last_error: String,
    },
    /// The request could not be built (invalid URL, unclonable body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors surfaced by the Steam and Notion gateways.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure after retries.
    #[error(transparent)]
    Http(#[from] HttpError),
    /// A response arrived but did not have the expected shape.
    #[error("unexpected {service} response: {message}")]
    Decode {
        /// Remote service that produced the payload.
        service: &'static str,
        /// What was wrong with it.
        message: String,
    },
    /// The gateways could not be built from the given configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    pub(crate) fn decode(service: &'static str, message: impl Into<String>) -> Self {
        SyncError::Decode {
            service,
            message: message.into(),
        }
    }
}

/// Invalid or incomplete process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key had no value in any source.
    #[error("missing required configuration value {0}")]
    Missing(&'static str),
    /// A value was present but unusable.
    #[error("invalid configuration value {key}: {message}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// Reason it was rejected.
        message: String,
    },
    /// The layered sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
