use reqwest::StatusCode;
use thiserror::Error;

use crate::relay::crypto::CryptoError;

/// Application-wide error types
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Connection-level failure (DNS, refused, timeout). Distinct from any
    /// HTTP status the remote server may return.
    #[error("Communication problem with the remote server: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote server answered, but with a non-success status.
    #[error("Error {0}: communication problem with the remote server")]
    RemoteStatus(StatusCode),

    #[error("Decryption error: {0}")]
    Decryption(#[from] CryptoError),

    /// Token missing, expired, or already consumed. All three are
    /// indistinguishable by design.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// A remote status the protocol does not model (e.g. a 5xx from
    /// `onetime_link`).
    #[error("Unexpected error from the remote server (status {0})")]
    Unexpected(StatusCode),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// True for the failures a caller may sensibly retry with a fresh
    /// command (the relay itself never retries).
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RemoteStatus(_))
    }
}

/// Result type alias using RelayError
pub type RelayResult<T> = Result<T, RelayError>;
