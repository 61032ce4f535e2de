use std::io::{self, Write};

use crossbeam_channel::{Receiver, Sender};
use log::info;

use crate::writer::{FastaWriter, Output};
use crate::SequenceRecord;

use super::abort::AbortSignal;
use super::error::{ProcessError, Result};

/// Shard receiving the record with global index `index` among `shards` outputs
#[inline]
pub fn shard_index(index: u64, shards: usize) -> usize {
    (index % shards as u64) as usize
}

/// Records routed by the sharder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Records received from the shared channel
    pub routed: u64,
    /// Records handed to each shard
    pub per_shard: Vec<u64>,
}

/// Distributes records round-robin over the writer tasks.
///
/// The record counter is global over all inputs and owned by the sharder alone.
pub struct Sharder {
    shards: Vec<Sender<SequenceRecord>>,
    abort: AbortSignal,
}

impl Sharder {
    pub fn new(shards: Vec<Sender<SequenceRecord>>, abort: AbortSignal) -> Self {
        Self { shards, abort }
    }

    /// Route every record until the input channel closes, then close all shard buffers
    pub fn run(self, records: Receiver<SequenceRecord>) -> Result<ShardStats> {
        if self.shards.is_empty() {
            return Err(ProcessError::InvalidOutputCount);
        }

        let mut stats = ShardStats {
            routed: 0,
            per_shard: vec![0; self.shards.len()],
        };
        for record in records.iter() {
            let shard = shard_index(stats.routed, self.shards.len());
            if self.shards[shard].send(record).is_err() {
                self.abort.raise();
                return Err(ProcessError::ShardClosed(shard));
            }
            stats.per_shard[shard] += 1;
            stats.routed += 1;
        }

        // writers flush and finish once their buffer is closed
        drop(self.shards);
        info!("Split {} sequences.", stats.routed);
        Ok(stats)
    }
}

/// Drain one shard buffer into `writer`, in arrival order, then finish the output.
///
/// Returns the number of records written. The count is only returned once the
/// output, including any gzip trailer, has been written and flushed.
pub fn write_shard<W: Write>(
    mut writer: FastaWriter<Output<W>>,
    records: Receiver<SequenceRecord>,
) -> io::Result<u64> {
    for record in records.iter() {
        writer.write_record(&record)?;
    }
    let written = writer.written();
    writer.finish()?.finish()?;
    Ok(written)
}
