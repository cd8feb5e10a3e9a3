//! Error types for the Cartograph SOM engine.

use thiserror::Error;

/// The main error type for Cartograph operations.
#[derive(Error, Debug)]
pub enum SomError {
    /// Invalid configuration (rejected before training starts).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed serialized map.
    #[error("Invalid SOM file format: {0}")]
    InvalidFormat(String),

    /// A vector does not have the dimensionality the map was built for.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimensionality of the map's reference vectors.
        expected: usize,
        /// Dimensionality of the offending vector.
        found: usize,
    },

    /// Empty input.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Input data that cannot be parsed.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Cartograph operations.
pub type Result<T> = std::result::Result<T, SomError>;

impl From<bincode::Error> for SomError {
    fn from(err: bincode::Error) -> Self {
        SomError::Serialization(err.to_string())
    }
}

impl SomError {
    /// Shorthand for a format error carrying the offending detail.
    pub(crate) fn format(detail: impl Into<String>) -> Self {
        SomError::InvalidFormat(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message() {
        let err = SomError::format("expected <width=");
        assert_eq!(err.to_string(), "Invalid SOM file format: expected <width=");
    }

    #[test]
    fn test_input_message() {
        let err = SomError::InvalidInput("data.txt:3: bad number".to_string());
        assert_eq!(err.to_string(), "Invalid input data: data.txt:3: bad number");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SomError = io.into();
        assert!(matches!(err, SomError::Io(_)));
    }
}
