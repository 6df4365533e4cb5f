// src/utils/errors.rs
//! Error types for the interposition shim
//!
//! Internal failures never surface to the intercepted caller as new return
//! values; the hooks translate them to the nearest standard error code for
//! the call being replaced and report details via diagnostics only.

use thiserror::Error;

/// Shim error type
#[derive(Debug, Error)]
pub enum ShimError {
    /// No next-in-chain implementation exists for an intercepted symbol
    #[error("no next-in-chain implementation for symbol `{0}`")]
    SymbolNotFound(&'static str),

    /// The policy service failed to initialize a socket context
    #[error("policy service failed to initialize context: {0}")]
    ContextInit(String),

    /// Invalid or inconsistent configuration
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl ShimError {
    /// Errno value a hook should report for this failure, when the call
    /// convention is errno-based.
    pub fn errno(&self) -> libc::c_int {
        match self {
            ShimError::SymbolNotFound(_) => libc::ENOSYS,
            ShimError::ContextInit(_) => libc::ENOMEM,
            ShimError::ConfigError(_) => libc::EINVAL,
        }
    }
}

/// Result type alias for shim operations
pub type Result<T> = std::result::Result<T, ShimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(ShimError::SymbolNotFound("socket").errno(), libc::ENOSYS);
        assert_eq!(
            ShimError::ContextInit("out of memory".to_string()).errno(),
            libc::ENOMEM
        );
    }

    #[test]
    fn test_display() {
        let err = ShimError::SymbolNotFound("connect");
        assert!(err.to_string().contains("connect"));
    }
}
