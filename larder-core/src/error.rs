//! Error types for Larder operations

use crate::LocationId;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Failed to open storage environment: {reason}")]
    EnvOpen { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Source unavailable: {reason}")]
    SourceUnavailable { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },

    #[error("Circular reference detected in location hierarchy: {ids:?}")]
    CircularReference { ids: Vec<LocationId> },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all Larder errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LarderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Larder operations.
pub type LarderResult<T> = Result<T, LarderError>;

// =============================================================================
// TESTS
// =============================================================================
