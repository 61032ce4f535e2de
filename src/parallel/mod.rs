mod abort;
mod egress;
mod error;
mod ingress;
mod pipeline;

pub use abort::AbortSignal;
pub use egress::{shard_index, write_shard, ShardStats, Sharder};
pub use error::{ProcessError, Result};
pub use ingress::{IngressPool, IngressStats};
pub use pipeline::{convert, ConversionSummary, Converter};
