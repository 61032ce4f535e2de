use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;

use crossbeam_channel::Receiver;
use log::{info, warn};

use crate::config::ConvertConfig;
use crate::progress::{ProgressAggregator, ProgressSample};
use crate::writer::{create_output, FastaWriter};
use crate::SequenceRecord;

use super::abort::AbortSignal;
use super::egress::{write_shard, Sharder};
use super::error::{ProcessError, Result};
use super::ingress::IngressPool;

/// Record counts of a finished conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Number of ingress workers used
    pub workers: usize,
    /// Input files decoded
    pub files: usize,
    /// Records produced by each ingress worker
    pub records_read: Vec<u64>,
    /// Records routed by the sharder
    pub records_routed: u64,
    /// Records written to each output, indexed like the outputs
    pub records_written: Vec<u64>,
    pub outputs: Vec<PathBuf>,
}

impl ConversionSummary {
    pub fn total_read(&self) -> u64 {
        self.records_read.iter().sum()
    }

    pub fn total_written(&self) -> u64 {
        self.records_written.iter().sum()
    }
}

/// Converts a set of FASTA/FASTQ inputs into `output_count` FASTA outputs.
///
/// `namer` maps an output index (`0..output_count`) to its path. Outputs whose
/// name ends in `gz` are gzip-compressed.
pub struct Converter<F> {
    files: Vec<PathBuf>,
    output_count: usize,
    namer: F,
    config: ConvertConfig,
}

impl<F> Converter<F>
where
    F: Fn(usize) -> PathBuf,
{
    pub fn new<P: AsRef<Path>>(files: &[P], output_count: usize, namer: F) -> Self {
        Self {
            files: files.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            output_count,
            namer,
            config: ConvertConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ConvertConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.config.threads = Some(threads);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.config.progress = progress;
        self
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Run the conversion to completion.
    ///
    /// The first failing task stops the others; its error is returned once every
    /// task has reached a stopping point and every output has been flushed.
    pub fn run(self) -> Result<ConversionSummary> {
        if self.files.is_empty() {
            return Err(ProcessError::NoInputs);
        }
        if self.output_count == 0 {
            return Err(ProcessError::InvalidOutputCount);
        }
        if self.config.threads == Some(0) {
            return Err(ProcessError::InvalidThreadCount);
        }

        let config = &self.config;
        let workers = IngressPool::worker_count(config.threads, self.files.len());
        let outputs: Vec<PathBuf> = (0..self.output_count).map(&self.namer).collect();
        info!(
            "Splitting {} inputs into {} outputs with {workers} workers",
            self.files.len(),
            outputs.len()
        );

        let abort = AbortSignal::new();
        let (record_tx, record_rx) = crossbeam_channel::bounded(config.record_channel_capacity);

        thread::scope(|scope| -> Result<ConversionSummary> {
            let mut shard_txs = Vec::with_capacity(outputs.len());
            let mut writer_handles = Vec::with_capacity(outputs.len());
            for path in &outputs {
                let (tx, rx) = crossbeam_channel::bounded(config.shard_buffer_capacity);
                shard_txs.push(tx);
                let abort = abort.clone();
                writer_handles.push(scope.spawn(move || {
                    write_destination(path, rx, config).inspect_err(|_| abort.raise())
                }));
            }

            let sharder = Sharder::new(shard_txs, abort.clone());
            let sharder_handle = scope.spawn(move || sharder.run(record_rx));

            let (progress_tx, aggregator_handle) = if config.progress {
                let (tx, rx) = crossbeam_channel::bounded(config.progress_channel_capacity);
                let interval = config.progress_interval;
                let handle = scope.spawn(move || render_progress(workers, rx, interval));
                (Some(tx), Some(handle))
            } else {
                (None, None)
            };

            let ingress = IngressPool::new(workers)
                .with_read_buffer_size(config.read_buffer_size)
                .run(&self.files, record_tx, progress_tx, &abort);

            let sharded = join(sharder_handle);
            let written: Vec<Result<u64>> = writer_handles.into_iter().map(join).collect();
            if let Some(handle) = aggregator_handle {
                if handle.join().is_err() {
                    warn!("progress renderer panicked");
                }
            }

            // report the root cause: input errors, then output errors, then the sharder
            let ingress = ingress?;
            let records_written = written.into_iter().collect::<Result<Vec<u64>>>()?;
            let sharded = sharded?;

            info!(
                "Wrote {} records to {} outputs",
                records_written.iter().sum::<u64>(),
                records_written.len()
            );
            Ok(ConversionSummary {
                workers,
                files: ingress.files,
                records_read: ingress.per_worker,
                records_routed: sharded.routed,
                records_written,
                outputs: outputs.clone(),
            })
        })
    }
}

/// Convert `files` into `output_count` FASTA outputs named by `namer`, with default settings
pub fn convert<P, F>(files: &[P], output_count: usize, namer: F) -> Result<ConversionSummary>
where
    P: AsRef<Path>,
    F: Fn(usize) -> PathBuf,
{
    Converter::new(files, output_count, namer).run()
}

fn join<T>(handle: ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle.join().unwrap_or(Err(ProcessError::JoinError))
}

/// Writer task owning one output file
fn write_destination(
    path: &Path,
    records: Receiver<SequenceRecord>,
    config: &ConvertConfig,
) -> Result<u64> {
    let output =
        create_output(path, config.compression_level).map_err(|source| ProcessError::Create {
            path: path.to_path_buf(),
            source,
        })?;
    let writer = FastaWriter::with_line_width(output, config.line_width);
    write_shard(writer, records).map_err(|source| ProcessError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn render_progress(
    workers: usize,
    samples: Receiver<ProgressSample>,
    interval: Duration,
) {
    if let Err(e) = ProgressAggregator::new(workers).run(samples, interval, io::stderr()) {
        warn!("could not render progress: {e}");
    }
}
