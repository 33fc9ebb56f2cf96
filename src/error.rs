use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the calendar client
///
/// Every payload is a plain string so the error can be cloned and handed
/// to each caller waiting on the same remote request.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum Error {
    #[error("Invalid input: {0}")]
    #[diagnostic(code(kalenteri::validation))]
    Validation(String),

    #[error("Not authorized: {0}")]
    #[diagnostic(
        code(kalenteri::auth),
        help("The session is no longer valid, log in again")
    )]
    Auth(String),

    #[error("Remote store error (HTTP {status}): {message}")]
    #[diagnostic(code(kalenteri::remote))]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    #[diagnostic(code(kalenteri::network))]
    Network(String),

    #[error("No month is loaded: {0}")]
    #[diagnostic(code(kalenteri::not_ready))]
    NotReady(String),

    #[error("Event {0} is not in the loaded month")]
    #[diagnostic(code(kalenteri::not_resident))]
    NotResident(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(kalenteri::config))]
    Config(String),

    #[error("Token storage error: {0}")]
    #[diagnostic(code(kalenteri::storage))]
    Storage(String),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(kalenteri::serialization))]
    Serialization(String),

    #[error("Component error: {0}")]
    #[diagnostic(code(kalenteri::component))]
    Component(String),
}

impl Error {
    /// True for 401/403 style failures that end the session
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Serialization(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// Implement From for TOML deserialization errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("Invalid URL: {}", err))
    }
}

/// Type alias for Result with our Error type
pub type CalResult<T> = Result<T, Error>;

/// Helper to create validation errors
pub fn validation_error(message: &str) -> Error {
    Error::Validation(message.to_string())
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create component errors
pub fn component_error(message: &str) -> Error {
    Error::Component(message.to_string())
}

/// Helper to create remote store errors
pub fn remote_error(status: u16, message: &str) -> Error {
    Error::Remote {
        status,
        message: message.to_string(),
    }
}

/// Helper to create token storage errors
pub fn storage_error(message: &str) -> Error {
    Error::Storage(message.to_string())
}
