//! Error types for the clicker core.
//!
//! Four failure classes are surfaced to callers: bad configuration, commands
//! that are not valid in the current phase, a broken click capability and a
//! hotkey listener that could not be brought up.

use std::io;
use thiserror::Error;

/// Main error type for autoclicky operations.
#[derive(Error, Debug)]
pub enum ClickError {
    /// Interval, jitter, duration, button or hotkey input was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The command is not allowed in the scheduler's current phase.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The mouse injection capability failed or could not be acquired.
    #[error("input unavailable: {0}")]
    InputUnavailable(String),

    /// The global key listener failed to start; hotkeys are disabled.
    #[error("hotkey listener unavailable: {0}")]
    ListenerFault(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for autoclicky operations.
pub type Result<T> = std::result::Result<T, ClickError>;

impl ClickError {
    /// Create a new InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a new InvalidOperation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Create a new InputUnavailable error.
    pub fn input_unavailable(message: impl Into<String>) -> Self {
        Self::InputUnavailable(message.into())
    }

    /// Create a new ListenerFault error.
    pub fn listener_fault(message: impl Into<String>) -> Self {
        Self::ListenerFault(message.into())
    }

    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClickError::invalid_config("interval must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration: interval must be positive"
        );

        let err = ClickError::invalid_operation("cannot reset count while running");
        assert_eq!(
            err.to_string(),
            "invalid operation: cannot reset count while running"
        );

        let err = ClickError::listener_fault("no display");
        assert_eq!(err.to_string(), "hotkey listener unavailable: no display");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "no access");
        let err: ClickError = io_err.into();
        assert!(matches!(err, ClickError::Io(_)));
        assert!(!err.is_invalid_config());
    }
}
