use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid start character ({0:?}), expected either '>' or '@'")]
    UnsupportedFormat(char),

    #[error("Input stream is empty, expected a FASTA or FASTQ record")]
    EmptyInput,

    #[error("Error setting up decompression: {0}")]
    Niffler(#[from] niffler::Error),

    #[error("Malformed compressed stream: {0}")]
    Decompression(#[source] io::Error),

    #[error("Invalid header: ({0:?}): expected ({1:?})")]
    InvalidHeader(char, char),

    #[error("Error reading from buffer: {0}")]
    Io(#[from] io::Error),

    #[error("No current record, advance() has not returned true yet")]
    NotStarted,

    #[error("Sequence of the current record was already consumed by sequence_bytes()")]
    SequenceStreamed,
}

impl Error {
    /// Classify a read error, separating corrupt compressed data from other I/O failures.
    pub(crate) fn from_read(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof => Self::Decompression(err),
            _ => Self::Io(err),
        }
    }
}
