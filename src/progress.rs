//! Per-file progress tracking and the aggregated status line.
//!
//! Progress is measured on the raw bytes pulled from the file, before any
//! decompression. For compressed inputs it is therefore an approximation that
//! can lag behind the decoded position by the decompressor's read-ahead.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, tick, Receiver};

/// Wraps a reader and counts the bytes pulled through it.
pub struct CountingReader<R> {
    inner: R,
    position: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Read-only view on the byte position of a [`CountingReader`].
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    position: Arc<AtomicU64>,
    total: Option<u64>,
}

impl ProgressTracker {
    /// Wrap `reader`, measuring progress against `total` bytes (if known)
    pub fn wrap<R: Read>(reader: R, total: Option<u64>) -> (CountingReader<R>, Self) {
        let position = Arc::new(AtomicU64::new(0));
        let counting = CountingReader {
            inner: reader,
            position: Arc::clone(&position),
        };
        (counting, Self { position, total })
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Percentage of the input consumed, `None` when the total size is unknown or zero
    pub fn percent(&self) -> Option<f64> {
        let total = self.total.filter(|&total| total > 0)?;
        Some((self.position() as f64 * 100.0 / total as f64).min(100.0))
    }
}

/// A progress sample sent by an ingress worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Index of the reporting worker
    pub slot: usize,
    pub percent: Option<f64>,
}

impl ProgressSample {
    pub fn new(slot: usize, percent: Option<f64>) -> Self {
        Self { slot, percent }
    }
}

/// Width of a single slot in the status line, chosen from the worker count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStyle {
    /// `100.00% `
    Decimal,
    /// `100% `
    Integer,
    /// `00`-`99`
    TwoDigit,
    /// `a`-`z`
    Letter,
}

impl SlotStyle {
    pub fn for_workers(workers: usize) -> Self {
        match workers {
            0..=10 => Self::Decimal,
            11..=16 => Self::Integer,
            17..=40 => Self::TwoDigit,
            _ => Self::Letter,
        }
    }

    pub fn format(self, percent: Option<f64>) -> String {
        let Some(pct) = percent.filter(|pct| (0.0..=100.0).contains(pct)) else {
            return self.placeholder().to_string();
        };
        match self {
            Self::Decimal => format!("{pct:6.2}% "),
            Self::Integer => format!("{:3}% ", pct as u32),
            Self::TwoDigit if pct > 99.0 => "99".to_string(),
            Self::TwoDigit => format!("{:02}", pct as u32),
            Self::Letter if pct > 90.0 => "z".to_string(),
            Self::Letter => char::from(b'a' + (26.0 * pct / 100.0) as u8).to_string(),
        }
    }

    fn placeholder(self) -> &'static str {
        match self {
            Self::Decimal => "   -    ",
            Self::Integer => "  -  ",
            Self::TwoDigit => "--",
            Self::Letter => "-",
        }
    }
}

/// Collects progress samples into one slot per worker and renders them as a status line.
#[derive(Debug)]
pub struct ProgressAggregator {
    slots: Vec<Option<f64>>,
    style: SlotStyle,
}

impl ProgressAggregator {
    pub fn new(workers: usize) -> Self {
        Self {
            slots: vec![Some(0.0); workers],
            style: SlotStyle::for_workers(workers),
        }
    }

    pub fn update(&mut self, sample: ProgressSample) {
        if let Some(slot) = self.slots.get_mut(sample.slot) {
            *slot = sample.percent;
        }
    }

    pub fn slots(&self) -> &[Option<f64>] {
        &self.slots
    }

    pub fn render(&self) -> String {
        self.slots
            .iter()
            .map(|&pct| self.style.format(pct))
            .collect()
    }

    /// Consume samples until every sender is gone, redrawing the status line every `interval`.
    ///
    /// A final line (with a trailing newline) is written once the channel disconnects.
    pub fn run<W: Write>(
        mut self,
        samples: Receiver<ProgressSample>,
        interval: Duration,
        mut sink: W,
    ) -> io::Result<()> {
        let ticker = tick(interval);
        loop {
            select! {
                recv(samples) -> msg => match msg {
                    Ok(sample) => self.update(sample),
                    Err(_) => break,
                },
                recv(ticker) -> _ => {
                    write!(sink, "\r{}", self.render())?;
                    sink.flush()?;
                }
            }
        }
        writeln!(sink, "\r{}", self.render())?;
        sink.flush()
    }
}
