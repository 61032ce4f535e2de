#![doc = include_str!("../README.md")]

pub mod config;
mod error;
pub mod fasta;
pub mod fastq;
pub mod fastx;
mod lines;
pub mod parallel;
pub mod progress;
mod record;
pub mod writer;

pub use config::ConvertConfig;
pub use error::Error;
pub use fastx::{Decoder, Format};
pub use lines::SequenceBytes;
pub use parallel::{convert, ConversionSummary, Converter, ProcessError};
pub use record::{Record, SequenceRecord};
pub use writer::FastaWriter;

/// Default size of the read-ahead buffer of a decoder.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
