use thiserror::Error;

/// Code reported when the server could not be reached at all.
pub const CONNECTION_ERROR_CODE: i32 = 99;

/// Message paired with [`CONNECTION_ERROR_CODE`].
pub const CONNECTION_ERROR_MESSAGE: &str = "Unable to connect with binance server";

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API error: {code} - {message}")]
    ApiError { code: i32, message: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl ExchangeError {
    /// The uniform error raised for any transport-level REST failure.
    pub fn connection_failure() -> Self {
        Self::ApiError {
            code: CONNECTION_ERROR_CODE,
            message: CONNECTION_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ApiError { code, .. } if *code == CONNECTION_ERROR_CODE)
    }

    /// Exchange-reported error code, if this is an API error.
    pub fn api_code(&self) -> Option<i32> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }
}
