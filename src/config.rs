use std::time::Duration;

use crate::writer::DEFAULT_LINE_WIDTH;
use crate::DEFAULT_BUFFER_SIZE;

/// Default capacity of the channel shared by all ingress workers
pub const DEFAULT_RECORD_CHANNEL_CAPACITY: usize = 1024;

/// Default capacity of the buffer in front of each output writer
pub const DEFAULT_SHARD_BUFFER_CAPACITY: usize = 5;

/// Default capacity of the progress side channel
pub const DEFAULT_PROGRESS_CHANNEL_CAPACITY: usize = 1024;

/// Tuning knobs of a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Number of ingress workers, defaults to the available parallelism.
    /// Never more than the number of input files.
    pub threads: Option<usize>,
    /// Size of the read-ahead buffer of each decoder
    pub read_buffer_size: usize,
    pub record_channel_capacity: usize,
    pub shard_buffer_capacity: usize,
    pub progress_channel_capacity: usize,
    /// Column width of written sequence lines
    pub line_width: usize,
    /// Render a status line on stderr while converting
    pub progress: bool,
    pub progress_interval: Duration,
    /// Compression level of gzip outputs
    pub compression_level: flate2::Compression,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            threads: None,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            record_channel_capacity: DEFAULT_RECORD_CHANNEL_CAPACITY,
            shard_buffer_capacity: DEFAULT_SHARD_BUFFER_CAPACITY,
            progress_channel_capacity: DEFAULT_PROGRESS_CHANNEL_CAPACITY,
            line_width: DEFAULT_LINE_WIDTH,
            progress: false,
            progress_interval: Duration::from_secs(1),
            compression_level: flate2::Compression::default(),
        }
    }
}
