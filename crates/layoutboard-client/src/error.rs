use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while setting up or running a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Board(#[from] layoutboard_core::ConfigError),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("login rejected: {message}")]
    LoginRejected { message: String },

    #[error("session expired and could not be re-established")]
    SessionExpired,

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ClientError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
