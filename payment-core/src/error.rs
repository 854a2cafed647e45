//! Error types for the payment ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every variant carries owned text so the task controller can log a failed
/// task and still hand the same error back to a waiting caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Rejected input (non-positive amount, missing customer id, currency mismatch)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Account number does not match the identifier pattern
    #[error("Invalid account number format: {0:?}")]
    InvalidFormat(String),

    /// Special account, customer bucket or account entry is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Account exists but is blocked
    #[error("Account unavailable: {0}")]
    UnavailableAccount(String),

    /// Malformed transfer payload or snapshot
    #[error("Decode error: {0}")]
    Decode(String),

    /// Snapshot could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Controller queue is at capacity
    #[error("Task queue is full (capacity {0})")]
    QueueFull(usize),

    /// Concurrency error (worker already running, mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Short stable label, used as a metrics/log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::InvalidFormat(_) => "invalid_format",
            Error::NotFound(_) => "not_found",
            Error::UnavailableAccount(_) => "unavailable_account",
            Error::Decode(_) => "decode",
            Error::Encode(_) => "encode",
            Error::QueueFull(_) => "queue_full",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidFormat("NOT_VALID".to_string());
        assert_eq!(err.to_string(), "Invalid account number format: \"NOT_VALID\"");
        assert_eq!(err.kind(), "invalid_format");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.toml");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(ref msg) if msg.contains("missing.toml")));
    }
}
