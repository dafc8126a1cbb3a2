//! Error types for vela-core.
//!
//! Faults raised by a service implementation are converted into these
//! variants at the harness boundary and logged. Only construction,
//! configuration and I/O errors, plus pre-flight startup failures, reach the
//! caller.

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Error type for harness and service operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The harness was built without a host context.
    #[error("host context is required to construct a harness")]
    MissingHostContext,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Startup (mandatory or regular) failed.
    #[error("startup failed: {0}")]
    Startup(String),

    /// A single loop iteration failed.
    #[error("loop iteration failed: {0}")]
    LoopIteration(String),

    /// Shutdown logic failed.
    #[error("shutdown failed: {0}")]
    Shutdown(String),

    /// Service code panicked inside an isolated call.
    #[error("service panicked: {0}")]
    Panicked(String),

    /// An isolated call was cancelled before it completed.
    #[error("task aborted: {0}")]
    Aborted(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a startup error.
    #[must_use]
    pub fn startup(msg: impl Into<String>) -> Self {
        Self::Startup(msg.into())
    }

    /// Creates a loop iteration error.
    #[must_use]
    pub fn loop_iteration(msg: impl Into<String>) -> Self {
        Self::LoopIteration(msg.into())
    }

    /// Creates a shutdown error.
    #[must_use]
    pub fn shutdown(msg: impl Into<String>) -> Self {
        Self::Shutdown(msg.into())
    }

    /// Returns true if the error came from a panic in service code.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HarnessError::config("negative delay");
        assert_eq!(err.to_string(), "configuration error: negative delay");
    }

    #[test]
    fn test_missing_host_context_display() {
        let err = HarnessError::MissingHostContext;
        assert!(err.to_string().contains("host context"));
    }

    #[test]
    fn test_error_is_panic() {
        assert!(HarnessError::Panicked("boom".into()).is_panic());
        assert!(!HarnessError::Aborted("cancelled".into()).is_panic());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: HarnessError = io.into();
        assert!(matches!(err, HarnessError::Io(_)));
    }
}
