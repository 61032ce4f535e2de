use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use log::debug;

use crate::fastx::Decoder;
use crate::progress::ProgressSample;
use crate::{SequenceRecord, DEFAULT_BUFFER_SIZE};

use super::abort::AbortSignal;
use super::error::{ProcessError, Result};

/// Records produced by the ingress pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressStats {
    /// Input files read to completion
    pub files: usize,
    /// Records sent by each worker, indexed by slot
    pub per_worker: Vec<u64>,
}

impl IngressStats {
    pub fn records(&self) -> u64 {
        self.per_worker.iter().sum()
    }
}

/// A fixed set of workers decoding input files in parallel.
///
/// Files are handed out through a shared queue, one file per worker at a time.
/// Records of one file are sent in file order; records of different files
/// interleave arbitrarily.
#[derive(Debug, Clone)]
pub struct IngressPool {
    workers: usize,
    read_buffer_size: usize,
}

impl IngressPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn with_read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of workers for `files` inputs: the requested or available parallelism,
    /// capped by the number of files
    pub fn worker_count(requested: Option<usize>, files: usize) -> usize {
        let parallelism = requested.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        parallelism.min(files)
    }

    /// Decode every file, sending records and progress samples downstream.
    ///
    /// Returns once every worker has finished; the record channel is closed at
    /// that point unless the caller holds other senders. A decode error raises
    /// `abort` and is returned after the other workers have stopped.
    ///
    /// One progress sample is offered per record with `try_send`. Samples are
    /// dropped while the progress channel is full; they only feed the status
    /// line and never affect the records sent.
    pub fn run(
        &self,
        files: &[PathBuf],
        records: Sender<SequenceRecord>,
        progress: Option<Sender<ProgressSample>>,
        abort: &AbortSignal,
    ) -> Result<IngressStats> {
        if self.workers == 0 {
            return Err(ProcessError::InvalidThreadCount);
        }

        let (queue_tx, queue) = crossbeam_channel::bounded(files.len());
        for path in files {
            // the queue holds every file, sending cannot block
            if queue_tx.send(path.clone()).is_err() {
                break;
            }
        }
        drop(queue_tx);

        thread::scope(|scope| -> Result<IngressStats> {
            let handles: Vec<_> = (0..self.workers)
                .map(|slot| {
                    let worker = IngressWorker {
                        slot,
                        queue: queue.clone(),
                        records: records.clone(),
                        progress: progress.clone(),
                        abort: abort.clone(),
                        read_buffer_size: self.read_buffer_size,
                    };
                    scope.spawn(move || worker.run())
                })
                .collect();

            // the channels close once the last worker drops its senders
            drop(records);
            drop(progress);

            let mut stats = IngressStats {
                files: 0,
                per_worker: vec![0; self.workers],
            };
            let mut first_error = None;
            for (slot, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(worker)) => {
                        stats.files += worker.files;
                        stats.per_worker[slot] = worker.records;
                    }
                    Ok(Err(e)) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        } else {
                            debug!("worker {slot} also failed: {e}");
                        }
                    }
                    Err(_) => {
                        abort.raise();
                        first_error.get_or_insert(ProcessError::JoinError);
                    }
                }
            }

            match first_error {
                Some(e) => Err(e),
                None => Ok(stats),
            }
        })
    }
}

#[derive(Debug, Default)]
struct WorkerStats {
    files: usize,
    records: u64,
}

struct IngressWorker {
    slot: usize,
    queue: Receiver<PathBuf>,
    records: Sender<SequenceRecord>,
    progress: Option<Sender<ProgressSample>>,
    abort: AbortSignal,
    read_buffer_size: usize,
}

impl IngressWorker {
    fn run(self) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();
        for path in self.queue.iter() {
            if self.abort.is_raised() {
                break;
            }
            match self.decode_file(&path, &mut stats) {
                Ok(true) => stats.files += 1,
                Ok(false) => break,
                Err(source) => {
                    self.abort.raise();
                    return Err(ProcessError::Decode { path, source });
                }
            }
        }
        debug!(
            "worker {} finished: {} files, {} records",
            self.slot, stats.files, stats.records
        );
        Ok(stats)
    }

    /// Returns `Ok(false)` when the run was aborted or downstream stopped listening
    fn decode_file(&self, path: &Path, stats: &mut WorkerStats) -> std::result::Result<bool, crate::Error> {
        let mut decoder = Decoder::from_path_with_capacity(path, self.read_buffer_size)?;
        debug!(
            "worker {} decoding {} as {:?}",
            self.slot,
            path.display(),
            decoder.format()
        );

        while decoder.advance()? {
            if self.abort.is_raised() {
                return Ok(false);
            }
            let record = decoder.record()?;
            if let Some(progress) = &self.progress {
                // samples are dropped while the aggregator lags behind
                let _ = progress.try_send(ProgressSample::new(self.slot, decoder.progress()));
            }
            if self.records.send(record).is_err() {
                return Ok(false);
            }
            stats.records += 1;
        }
        Ok(true)
    }
}
