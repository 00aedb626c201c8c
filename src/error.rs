//! # Error Types
//!
//! Custom error types for Link Budget Monitor using `thiserror`.

use thiserror::Error;

/// Main error type for Link Budget Monitor
#[derive(Debug, Error)]
pub enum LinkMonitorError {
    /// Serial transport errors (open, read, enumerate)
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the requested serial ports could be opened
    #[error("No serial port could be opened (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Operator supplied a link parameter outside its documented range
    #[error("Invalid parameter {name}: {value} (allowed {min}..={max})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Link Budget Monitor
pub type Result<T> = std::result::Result<T, LinkMonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message() {
        let err = LinkMonitorError::InvalidParameter {
            name: "frequency_mhz",
            value: 5000.0,
            min: 100.0,
            max: 3000.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("frequency_mhz"));
        assert!(msg.contains("5000"));
        assert!(msg.contains("3000"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: LinkMonitorError = io.into();
        assert!(matches!(err, LinkMonitorError::Io(_)));
        assert!(err.to_string().starts_with("I/O error"));
    }
}
