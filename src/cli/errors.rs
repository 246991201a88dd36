//! CLI-specific error types
//!
//! All CLI errors are fatal: the process prints the error and exits non-zero.

use std::fmt;
use std::io;

use crate::error::RouterError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error
    IoError,
    /// Route compilation or adapter setup failed
    BootFailed,
    /// Server stopped with an error
    ServeFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::BootFailed => "AERO_CLI_BOOT_FAILED",
            Self::ServeFailed => "AERO_CLI_SERVE_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    /// Serve failed
    pub fn serve_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ServeFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<RouterError> for CliError {
    fn from(e: RouterError) -> Self {
        Self::boot_failed(format!("[{}] {}", e.code(), e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::config_error("no routes");
        assert_eq!(err.to_string(), "AERO_CLI_CONFIG_ERROR: no routes");
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_router_error_is_boot_failure() {
        let err = CliError::from(RouterError::AuthResolverMissing("GET /me".to_string()));
        assert_eq!(err.code_str(), "AERO_CLI_BOOT_FAILED");
        assert!(err.message().contains("AUTH_RESOLVER_MISSING"));
        assert!(err.message().contains("GET /me"));
    }
}
