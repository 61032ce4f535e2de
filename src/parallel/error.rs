use std::io;
use std::path::PathBuf;

use thiserror::Error;

// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Error type for the conversion pipeline
#[derive(Error, Debug)]
pub enum ProcessError {
    /// No input files were given
    #[error("No input files provided")]
    NoInputs,

    /// Invalid number of threads specified
    #[error("Invalid thread count specified")]
    InvalidThreadCount,

    /// Invalid number of outputs specified
    #[error("Invalid output count specified, expected at least one output")]
    InvalidOutputCount,

    /// An input file could not be opened or decoded
    #[error("Error decoding {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: crate::Error,
    },

    /// An output file could not be created
    #[error("Error creating {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: crate::Error,
    },

    /// Writing to an output file failed
    #[error("Error writing to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The writer of a shard stopped before the input was exhausted
    #[error("Writer for output {0} stopped accepting records")]
    ShardClosed(usize),

    /// Error joining threads
    #[error("Thread join error.")]
    JoinError,
}
