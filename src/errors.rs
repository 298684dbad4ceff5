use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while fetching a page of price history.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connection refused, timeout, TLS, ...).
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-success HTTP status.
    #[error("unexpected HTTP status: {0}")]
    Status(StatusCode),

    /// The provider throttled us, either via HTTP 429 or an error message.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider reported an error in the response body (e.g. invalid API key).
    #[error("API error: {0}")]
    Api(String),

    /// The response body could not be turned into price points.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request(e) => !e.is_decode() && !e.is_builder(),
            FetchError::Status(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            FetchError::RateLimited(_) => true,
            FetchError::Api(_) | FetchError::Decode(_) => false,
        }
    }
}

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A config value is outside the range the pipeline can work with.
    #[error("Invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
