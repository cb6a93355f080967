//! Error types for par2-driver
//!
//! The repair entry points report their result through the closed
//! [`RepairOutcome`](crate::RepairOutcome) taxonomy rather than through errors;
//! this module covers the surfaces that can genuinely fail before an engine
//! run starts (recovery-set location) and the optional conversion of an
//! outcome into a `Result` for callers that want `?` ergonomics.

use std::path::PathBuf;
use thiserror::Error;

use crate::repairer::RepairOutcome;

/// Result type alias for par2-driver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for par2-driver
#[derive(Debug, Error)]
pub enum Error {
    /// No recovery-set file was found in the scanned directory
    #[error("no recovery set found in {}", dir.display())]
    NoRecoverySet {
        /// The directory that was scanned for `.par2` files
        dir: PathBuf,
    },

    /// A repair run ended in a non-success outcome
    #[error("repair engine reported {outcome:?}: {reason}")]
    Repair {
        /// The outcome the engine run was mapped to
        outcome: RepairOutcome,
        /// Human-readable description of the failure
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
