use serde::Serialize;
use thiserror::Error;

/// Classification of a failed fetch, or of a record that was rejected.
#[derive(Debug, Clone, Copy, Error, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential expired, missing or rejected by the upstream.
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("rate limited")]
    RateLimited,

    #[error("network error")]
    NetworkError,

    #[error("timed out")]
    Timeout,

    /// A single record was dropped during validation. Recovered locally, never surfaced.
    #[error("record failed validation")]
    ValidationFailure,

    #[error("unknown error")]
    Unknown,
}

impl ErrorKind {
    /// Whether another attempt against the same key can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkError | ErrorKind::Timeout | ErrorKind::RateLimited
        )
    }

    /// Failures after which every later request on the key will fail the same way.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ErrorKind::Unauthorized | ErrorKind::NotFound)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "The data provider rejected our credentials, check API key",
            ErrorKind::NotFound => "The requested item does not exist upstream",
            ErrorKind::RateLimited => "The data provider is rate limiting requests, try again later",
            ErrorKind::NetworkError => "The data provider could not be reached",
            ErrorKind::Timeout => "The data provider took too long to respond",
            ErrorKind::ValidationFailure => "The data provider returned malformed records",
            ErrorKind::Unknown => "Something went wrong while loading data",
        }
    }

    /// Maps an HTTP status code to a failure kind. Only meaningful for non-success codes.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Unauthorized,
            404 => ErrorKind::NotFound,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::NetworkError,
            _ => ErrorKind::Unknown,
        }
    }
}

impl From<reqwest::Error> for ErrorKind {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ErrorKind::Timeout
        } else if let Some(status) = error.status() {
            ErrorKind::from_status(status.as_u16())
        } else if error.is_connect() || error.is_request() {
            ErrorKind::NetworkError
        } else {
            ErrorKind::Unknown
        }
    }
}

/// Errors raised outside the resolution path: configuration, bundled data, post submission.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid record: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_classified() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::NetworkError);
        assert_eq!(ErrorKind::from_status(418), ErrorKind::Unknown);
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::NetworkError.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::Unauthorized.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn unauthorized_message_is_actionable() {
        assert!(ErrorKind::Unauthorized.user_message().contains("check API key"));
    }
}
