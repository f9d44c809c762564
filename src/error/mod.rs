//! Error types for tmstats.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! Errors fall into four categories:
//! - **Network**: connection, timeout, or HTTP-level failures against the
//!   telemetry or geocoding APIs
//! - **Configuration**: config file parsing, validation, or missing values
//! - **Storage**: SQLite open/migration/query failures
//! - **Internal**: unexpected errors or unclassified issues

use thiserror::Error;

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network issues (timeout, DNS, connection refused, bad HTTP status).
    Network,
    /// Configuration issues (parse errors, invalid values, missing files).
    Configuration,
    /// Local database issues.
    Storage,
    /// Internal errors (bugs, unexpected state, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network error",
            Self::Configuration => "Configuration error",
            Self::Storage => "Storage error",
            Self::Internal => "Internal error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Parse/format errors, malformed responses
    ParseError = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for tmstats operations.
#[derive(Error, Debug)]
pub enum TmsError {
    /// Request timed out after the given number of seconds.
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// Network-level failure (DNS, connection, non-2xx status).
    #[error("network error: {0}")]
    Network(String),

    /// Remote response could not be parsed.
    #[error("failed to parse response: {0}")]
    ParseResponse(String),

    /// Configuration problem.
    #[error("config error: {0}")]
    Config(String),

    /// Local database problem.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem problem.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TmsError {
    /// Map the error to a process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Timeout(_) => ExitCode::Timeout,
            Self::ParseResponse(_) => ExitCode::ParseError,
            Self::Network(_) | Self::Config(_) | Self::Storage(_) | Self::Io(_) | Self::Other(_) => {
                ExitCode::GeneralError
            }
        }
    }

    /// Classify the error into a category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout(_) | Self::Network(_) => ErrorCategory::Network,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::ParseResponse(_) | Self::Io(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Whether retrying the same operation later could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }
}

impl From<rusqlite::Error> for TmsError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_have_descriptions() {
        assert_eq!(ErrorCategory::Network.description(), "Network error");
        assert_eq!(ErrorCategory::Storage.description(), "Storage error");
    }

    #[test]
    fn timeout_maps_to_timeout_exit_code() {
        let err = TmsError::Timeout(30);
        assert_eq!(err.exit_code(), ExitCode::Timeout);
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.is_retryable());
    }

    #[test]
    fn parse_maps_to_parse_exit_code() {
        let err = TmsError::ParseResponse("bad json".into());
        assert_eq!(err.exit_code(), ExitCode::ParseError);
        assert!(!err.is_retryable());
    }

    #[test]
    fn sqlite_errors_become_storage() {
        let err: TmsError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(err.category(), ErrorCategory::Storage);
    }
}
