use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum ParlorError {
    // Admission errors
    InvalidClientAddress(String),

    // Auth errors
    Unauthorized,
    AuthError(String),

    // Connection errors
    ConnectionError(String),
    ConnectionClosed,

    // Frame errors
    MessageParseError(String),
    MessageTooLarge(usize),

    // Validation errors
    ValidationError(String),

    // Collaborator errors
    UnknownUser(i64),
    StorageError(String),

    // Configuration errors
    ConfigError(String),
}

impl ParlorError {
    /// Whether the error is scoped to a single operation, leaving the
    /// connection that triggered it open.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MessageParseError(_)
                | Self::MessageTooLarge(_)
                | Self::ValidationError(_)
                | Self::UnknownUser(_)
                | Self::StorageError(_)
        )
    }
}

impl fmt::Display for ParlorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidClientAddress(addr) => write!(f, "Invalid client address: {}", addr),
            Self::Unauthorized => write!(f, "Unauthorized access"),
            Self::AuthError(msg) => write!(f, "Authentication error: {}", msg),
            Self::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            Self::ConnectionClosed => write!(f, "Connection closed unexpectedly"),
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::MessageTooLarge(size) => write!(f, "Message too large: {} bytes", size),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::UnknownUser(id) => write!(f, "Unknown user: {}", id),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for ParlorError {}

// Generic result type for Parlor
pub type Result<T> = std::result::Result<T, ParlorError>;
