//! Error types for the locusgraph library.

use thiserror::Error;

/// Errors that can occur while mutating or persisting a locus set.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocusError {
    /// A structural assertion over the container failed.
    ///
    /// Invariant violations are logic bugs, not recoverable conditions;
    /// callers should treat the container as poisoned and abort.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A filesystem operation failed during save or load.
    #[error("I/O failure: {0}")]
    Io(String),

    /// Encoding or decoding the on-disk stream failed.
    #[error("serialization failure: {0}")]
    Serialization(String),

    /// A nested locus merge failed while folding in another container.
    #[error("merge of locus {locus} from '{source_id}' failed: {cause}")]
    MergeFailure {
        /// Identifier of the container the offending locus came from.
        source_id: String,
        /// Slot of the offending locus in the source container.
        locus: usize,
        /// The underlying failure.
        cause: Box<LocusError>,
    },
}

/// Result type alias for locusgraph operations.
pub type Result<T> = std::result::Result<T, LocusError>;
