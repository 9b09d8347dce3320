//! Error and Result types for UMB operations.

use crate::index::StateIndex;
use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` type for UMB operations.
pub type Result<T> = std::result::Result<T, UmbError>;

/// The error type for UMB operations.
#[derive(Debug, Error)]
pub enum UmbError {
    /// A vector could not be packed into its binary form.
    #[error("Encode error: {0}")]
    Encode(String),

    /// A binary buffer could not be unpacked into a vector.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The archive could not be opened or its tar structure is corrupt.
    #[error("Failed to read archive {path}: {reason}")]
    ArchiveRead {
        /// Path of the archive.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// The archive could not be written.
    #[error("Failed to write archive {path}: {reason}")]
    ArchiveWrite {
        /// Path of the archive.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// `index.json` is missing a required field or carries an invalid one.
    #[error("Schema error in field `{field}`: {reason}")]
    Schema {
        /// JSON key of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A required archive member is absent.
    #[error("Missing archive member: {0}")]
    MissingMember(String),

    /// A structural invariant of the transition system does not hold.
    #[error("Validation failed for `{field}`: {reason}")]
    Validation {
        /// Model field that violates the invariant.
        field: String,
        /// Description of the violation.
        reason: String,
    },

    /// Ranges handed to the row-start encoder do not touch each other.
    #[error("Ranges are not contiguous at position {position}: range ends at {end}, next starts at {next_start}")]
    NonContiguousRanges {
        /// Position of the range whose end does not meet its successor.
        position: usize,
        /// Exclusive end of that range.
        end: usize,
        /// Start of the following range.
        next_start: usize,
    },

    /// A typed index lies outside of its index space.
    #[error("{kind} index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// Name of the index space.
        kind: &'static str,
        /// The offending index.
        index: usize,
        /// Size of the index space.
        len: usize,
    },

    /// The state owns no choice to sample from.
    #[error("{0} has no choices")]
    EmptyChoiceSet(StateIndex),

    /// A path was requested without a start state and the model has no initial states.
    #[error("Model has no initial states")]
    NoInitialStates,

    /// The model carries no branch values.
    #[error("Model has no branch values")]
    NoWeights,

    /// Branch values of a choice do not form a distribution.
    #[error("Invalid weights for choice {choice}: {reason}")]
    InvalidWeights {
        /// Raw choice index.
        choice: usize,
        /// Why sampling rejected the weights.
        reason: String,
    },
}
