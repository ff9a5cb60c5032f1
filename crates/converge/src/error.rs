//! Error types for convergence operations.
//!
//! Every failure a resource module can surface falls into one of four
//! categories: the target legitimately does not exist (`NotFound`), the
//! caller's options record was rejected (`Validation`), an external
//! command could not run or reported failure (`Execution`), or output did
//! not have the shape a fixed-arity parse demanded (`Parse`). Callers
//! pattern-match the variants instead of inspecting error strings.

use thiserror::Error;

/// Errors that can occur while converging a resource.
#[derive(Debug, Error)]
pub enum Error {
    /// The targeted entity does not exist.
    ///
    /// This is a sentinel, not a bug: [`crate::Resource::exists`] converts
    /// it to `Ok(false)`, and any other caller may treat it as the
    /// `Absent` lifecycle state.
    #[error("{resource_type} {name} not found")]
    NotFound {
        /// Resource type label, e.g. "AptPkg" or "FileLine"
        resource_type: String,
        /// Identity of the instance that was looked up
        name: String,
    },

    /// An options record failed validation.
    ///
    /// Surfaced before any side effect occurs.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An external command could not be started, or its output was
    /// interpreted as failure by the calling module.
    #[error("execution failed: {message}")]
    Execution {
        /// What failed
        message: String,
        /// Captured stderr, when the failure came from a finished command
        stderr: String,
    },

    /// Output did not match an expected fixed-arity shape.
    ///
    /// Most extraction treats a non-match as "field absent"; this variant
    /// is reserved for places where the shape is load-bearing (a four
    /// token source entry, a seven token cron line).
    #[error("parse error: {message}")]
    Parse {
        /// Description of the malformed input
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a not-found sentinel for a resource instance.
    pub fn not_found(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Create an execution error with no captured stderr.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            stderr: String::new(),
        }
    }

    /// Create an execution error carrying the command's stderr.
    pub fn execution_with_stderr(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a hard parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Whether this error is the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised while validating an options record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A field tagged required was left at its zero value.
    #[error("missing input: {field}")]
    MissingField {
        /// Name of the offending field
        field: &'static str,
    },
}

/// Result type for convergence operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found("AptPkg", "vim");
        assert_eq!(err.to_string(), "AptPkg vim not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_validation_is_not_not_found() {
        let err = Error::from(ValidationError::MissingField { field: "Name" });
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "missing input: Name");
    }

    #[test]
    fn test_execution_with_stderr() {
        let err = Error::execution_with_stderr("unable to add key", "gpg: keyserver timed out");
        match err {
            Error::Execution { message, stderr } => {
                assert_eq!(message, "unable to add key");
                assert_eq!(stderr, "gpg: keyserver timed out");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
