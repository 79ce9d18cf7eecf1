use std::error::Error as StdError;
use thiserror::Error;
use url::Url;

/// Result type alias for Alertmanager operations
pub type Result<T> = std::result::Result<T, AlertmanagerError>;

/// Errors raised while resolving a [`ClientConfig`](crate::ClientConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured URL could not be parsed
    #[error("invalid Alertmanager URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The configured URL carries a port that is not a valid integer
    #[error("invalid port in Alertmanager URL {url:?}")]
    InvalidPort { url: String },

    /// The configured URL has no host component
    #[error("Alertmanager URL {url:?} has no host")]
    MissingHost { url: String },

    /// An endpoint URL assembled from the resolved configuration is invalid
    #[error("invalid endpoint URL {url:?}: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors that can occur when interacting with Alertmanager
#[derive(Debug, Error)]
pub enum AlertmanagerError {
    /// Client configuration could not be resolved
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to build HTTP client
    #[error("Failed to build HTTP client: {0}")]
    BuildHttpClient(#[source] reqwest::Error),

    /// HTTP request failed
    #[error("{operation}: HTTP request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest_middleware::Error,
    },

    /// Reading the response body failed
    #[error("{operation}: failed to read response body: {source}")]
    Body {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The response body is not the expected JSON shape
    #[error("{operation}: failed to decode response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Alertmanager API returned an error response
    #[error("Alertmanager API error ({operation}): HTTP {status} - {message}")]
    Api {
        /// Operation that received the response
        operation: &'static str,
        /// HTTP status code
        status: u16,
        /// Error message from Alertmanager
        message: String,
    },

    /// A field the API documents as required was absent
    #[error("{entity} is missing required field `{field}`")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    /// A field carried a value outside its documented set
    #[error("{entity} has invalid `{field}` value {value:?}")]
    InvalidField {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// The call's context was cancelled
    #[error("{operation}: cancelled")]
    Cancelled { operation: &'static str },

    /// The call's context deadline passed
    #[error("{operation}: deadline exceeded")]
    DeadlineExceeded { operation: &'static str },

    /// A replicated write failed on one peer.
    ///
    /// Peers listed in `delivered` already accepted the write.
    #[error("fan-out to {target} failed after {} peer(s) accepted the write: {source}", .delivered.len())]
    Fanout {
        /// Peer whose write failed
        target: Url,
        /// Peers that accepted the write before the failure
        delivered: Vec<Url>,
        #[source]
        source: Box<AlertmanagerError>,
    },
}

impl AlertmanagerError {
    /// Check if the error is retryable
    ///
    /// Returns `true` for:
    /// - Network/connection errors
    /// - Timeout errors, including an expired context deadline
    /// - Server errors (5xx status codes)
    /// - Fan-out failures whose underlying error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request { source, .. } => {
                if let reqwest_middleware::Error::Reqwest(err) = source {
                    return err.is_connect() || err.is_timeout();
                }
                if let Some(reqwest_err) = StdError::source(source) {
                    if let Some(err) = reqwest_err.downcast_ref::<reqwest::Error>() {
                        return err.is_connect() || err.is_timeout();
                    }
                }
                false
            }
            Self::Api { status, .. } => *status >= 500,
            Self::DeadlineExceeded { .. } => true,
            Self::Fanout { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Peers that already accepted a write before this error, if any.
    pub fn delivered_peers(&self) -> &[Url] {
        match self {
            Self::Fanout { delivered, .. } => delivered,
            _ => &[],
        }
    }
}
