//! Error types for the Brunata to InfluxDB2 forwarder.
//!
//! Each component gets its own error enum so callers can tell a rejected
//! password apart from a flaky network or a changed login page.

use thiserror::Error;

/// Result type alias using our custom error types.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type that encompasses all application errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// A refresh cycle failed
    #[error(transparent)]
    Refresh(#[from] RefreshFailed),

    /// InfluxDB storage errors
    #[error("storage error")]
    Storage(#[from] StorageError),

    /// Generic errors that don't fit other categories
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable parsing failed
    #[error("failed to parse environment variables: {0}")]
    EnvParse(String),

    /// Configuration value is invalid
    #[error("invalid configuration value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Connection-level failures. Retryable on the scheduler's next tick.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request could not be sent or the body could not be read
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A URL could not be built from configuration
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// A header value contained characters HTTP does not allow
    #[error("invalid header value for {name}")]
    InvalidHeader { name: String },
}

/// Failures while reading the identity broker's login page.
#[derive(Error, Debug)]
pub enum ParseError {
    /// No script assigns the settings variable
    #[error("no script assigns '{variable}'")]
    ScriptNotFound { variable: String },

    /// The settings object never closes
    #[error("settings literal for '{variable}' is not balanced")]
    UnbalancedLiteral { variable: String },

    /// The settings object is not valid JSON
    #[error("settings literal is not valid JSON: {0}")]
    InvalidLiteral(#[from] serde_json::Error),

    /// A required settings field is missing
    #[error("settings literal has no '{0}' field")]
    MissingField(&'static str),

    /// The anti-forgery cookie was not set
    #[error("cookie '{0}' missing from authorize response")]
    MissingCookie(&'static str),

    /// The authorize page answered with an unexpected status
    #[error("authorize page returned status {0}")]
    UnexpectedStatus(u16),
}

/// Authentication handshake failures, one variant per failure kind.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Network or timeout while talking to the identity broker
    #[error("transport error during authentication")]
    Transport(#[from] TransportError),

    /// The authorize page could not be understood
    #[error("failed to parse handshake page")]
    HandshakeParse(#[from] ParseError),

    /// The provider rejected the username or password
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The post-login redirect carried no authorization code
    #[error("authorization code missing: {0}")]
    AuthorizationCodeMissing(String),

    /// The token endpoint did not issue an access token
    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),
}

/// Failures while fetching meters or consumption.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network or timeout
    #[error("transport error while fetching {endpoint}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: TransportError,
    },

    /// The access token was rejected
    #[error("access token rejected by {endpoint}")]
    Unauthorized { endpoint: &'static str },

    /// Server returned an error status
    #[error("{endpoint} returned status {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: u16,
        message: String,
    },

    /// The payload did not have the expected shape
    #[error("failed to decode {endpoint} payload")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Why a refresh cycle produced no snapshot.
#[derive(Error, Debug)]
pub enum RefreshCause {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The cycle exceeded its time budget
    #[error("refresh cycle timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Another refresh is still running
    #[error("a refresh is already in progress")]
    InProgress,
}

/// The single failure signal handed to the host for a failed cycle.
#[derive(Error, Debug)]
#[error("refresh failed: {cause}")]
pub struct RefreshFailed {
    #[source]
    pub cause: RefreshCause,
}

/// InfluxDB storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// InfluxDB client error
    #[error("InfluxDB error: {0}")]
    Client(#[from] influxdb2::RequestError),

    /// Invalid data point
    #[error("invalid data point: {0}")]
    InvalidDataPoint(String),
}

impl ConfigError {
    /// Creates a new environment parse error.
    pub fn env_parse(err: impl std::fmt::Display) -> Self {
        Self::EnvParse(err.to_string())
    }

    /// Creates a new invalid configuration error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl TransportError {
    pub fn invalid_url(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: err.to_string(),
        }
    }
}

impl AuthError {
    /// Whether retrying with the same credentials can ever succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InvalidCredentials(_))
    }
}

impl FetchError {
    /// Creates an error from a non-success status and response body.
    pub fn from_status(endpoint: &'static str, status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            Self::Unauthorized { endpoint }
        } else {
            Self::Status {
                endpoint,
                status: status.as_u16(),
                message: body,
            }
        }
    }
}

impl RefreshFailed {
    pub fn new(cause: impl Into<RefreshCause>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// True when the provider rejected the stored credentials.
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(&self.cause, RefreshCause::Auth(err) if err.is_terminal())
    }

    /// True when the access token was rejected mid-cycle.
    pub fn is_unauthorized(&self) -> bool {
        matches!(&self.cause, RefreshCause::Fetch(FetchError::Unauthorized { .. }))
    }
}
