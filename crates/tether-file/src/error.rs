//! Error types for file entities.

use thiserror::Error;

/// Errors raised by file entity operations.
///
/// A missing file is not an error: reads resolve to `None` and existence checks to
/// `false`.
#[derive(Error, Debug)]
pub enum Error {
    /// The named character encoding is not supported.
    #[error("Unsupported encoding: {0}")]
    EncodingUnsupported(String),

    /// IO error during a read or write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Watch backend error.
    #[error(transparent)]
    Watch(#[from] tether_watch::Error),

    /// Invalid entity settings.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for file entity operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn watch_errors_are_transparent() {
        let err: Error = tether_watch::Error::Config("bad table".to_string()).into();
        assert_eq!(err.to_string(), "Configuration error: bad table");
    }
}
