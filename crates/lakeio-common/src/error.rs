//! Error types for LakeIO
//!
//! This module defines the common error types used throughout the system.

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for LakeIO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for LakeIO
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config not found: {path}")]
    NotFound { path: PathBuf },

    #[error("config already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

impl Error {
    /// Create an invalid config error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Check if this is a not found error
    ///
    /// Covers both the taxonomy variant and a raw I/O error of the same
    /// kind, so callers can branch without caring which layer raised it.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Check if this is a validation failure
    #[must_use]
    pub fn is_invalid_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::ChecksumMismatch { .. }
        )
    }
}
