//! Error taxonomy shared by remote sources, the store and the sync engine.
//!
//! Two failure kinds never surface here: a missing optional field degrades to
//! its default inside the field mapping, and a unique-key conflict on insert
//! means another run already stored the item, which counts as success.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// An identity, item or collection does not resolve on the remote.
    #[error("not found on remote: {0}")]
    RemoteNotFound(String),

    /// Network failure, rate limiting or a temporary server error.
    #[error("transient remote error: {0}")]
    RemoteTransient(String),

    /// Any other remote failure (auth, bad request, malformed payload).
    #[error("remote API error: {0}")]
    RemoteApi(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl SyncError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::RemoteNotFound(what.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::RemoteTransient(message.into())
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::RemoteApi(message.into())
    }

    /// Only transient remote errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteTransient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RemoteNotFound(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            return Self::RemoteTransient(err.to_string());
        }
        if let Some(status) = err.status() {
            if status.as_u16() == 429 || status.is_server_error() {
                return Self::RemoteTransient(err.to_string());
            }
            if status.as_u16() == 404 {
                return Self::RemoteNotFound(err.to_string());
            }
        }
        if err.is_decode() {
            return Self::RemoteApi(format!("malformed response: {err}"));
        }
        Self::RemoteApi(err.to_string())
    }
}

/// Classify a non-success HTTP status returned by a remote API.
pub fn from_status(status: reqwest::StatusCode, context: &str, body: &str) -> SyncError {
    let message = format!("{context}: HTTP {status}: {body}");
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SyncError::RemoteTransient(message)
    } else if status == reqwest::StatusCode::NOT_FOUND {
        SyncError::RemoteNotFound(message)
    } else {
        SyncError::RemoteApi(message)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_classification() {
        assert!(from_status(StatusCode::TOO_MANY_REQUESTS, "x", "").is_retryable());
        assert!(from_status(StatusCode::BAD_GATEWAY, "x", "").is_retryable());
        assert!(from_status(StatusCode::NOT_FOUND, "x", "").is_not_found());
        let err = from_status(StatusCode::UNAUTHORIZED, "tweets", "nope");
        assert!(matches!(err, SyncError::RemoteApi(ref m) if m.contains("tweets") && m.contains("nope")));
        assert!(!err.is_retryable());
    }
}
