//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.
//!
//! Every failure aborts the whole traversal at the point of detection:
//! nothing is retried internally and no partial output is returned.

use thiserror::Error;

/// Main error type for varwalk operations
#[derive(Error, Debug)]
pub enum VarwalkError {
    /// A node's rank or extents do not match its declared shape class
    #[error("invalid dimension of '{path}'")]
    InvalidDimension { path: String },

    /// A mandatory length-index node is absent (genotype and format attributes)
    #[error("'{path}' is missing")]
    MissingCompanionIndex { path: String },

    /// A selection's length disagrees with the store's declared axis count
    #[error("{axis} selection has length {actual}, expected {expected}")]
    SelectionSizeMismatch {
        axis: &'static str,
        expected: u64,
        actual: usize,
    },

    /// Attribute cursors disagree on traversal position (programming-logic fault)
    #[error("cursor lockstep violation: {message}")]
    LockstepViolation { message: String },

    /// Window size, shift size, or selection out of range
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// An attribute name that does not resolve to a storage node
    #[error(
        "'{name}' is not a standard attribute name; accepted forms: \
         sample.id, variant.id, position, chromosome, allele, annotation/id, \
         annotation/qual, annotation/filter, genotype, phase, \
         annotation/info/NAME, annotation/format/NAME"
    )]
    UnknownAttribute { name: String },

    /// Failure reported by the backing array store
    #[error("storage error: {message}")]
    Store { message: String },
}

/// Type alias for Results using VarwalkError
pub type Result<T> = std::result::Result<T, VarwalkError>;

impl VarwalkError {
    /// Create an invalid-dimension error naming the offending path
    pub fn invalid_dimension(path: impl Into<String>) -> Self {
        Self::InvalidDimension { path: path.into() }
    }

    /// Create a missing-companion-index error naming the absent path
    pub fn missing_index(path: impl Into<String>) -> Self {
        Self::MissingCompanionIndex { path: path.into() }
    }

    /// Create a lockstep-violation error
    pub fn lockstep(message: impl Into<String>) -> Self {
        Self::LockstepViolation {
            message: message.into(),
        }
    }

    /// Create an invalid-parameter error
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}
