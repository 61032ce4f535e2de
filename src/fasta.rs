use std::io;
use std::path::Path;

use crate::fastx::{detect, open_lines, Format};
use crate::lines::{BlockState, LineReader, SequenceBlock, SequenceBytes};
use crate::progress::ProgressTracker;
use crate::{Error, SequenceRecord, DEFAULT_BUFFER_SIZE};

/// Record marker of a FASTA header line
pub const MARKER: u8 = b'>';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    NotStarted,
    Reading,
    Exhausted,
    Failed,
}

/// Streaming FASTA decoder.
///
/// The sequence of each record is read lazily: either buffered with
/// [`sequence`](Self::sequence) or pulled byte by byte with
/// [`sequence_bytes`](Self::sequence_bytes). Reading the sequence also reads the
/// header of the following record, which is kept until the next
/// [`advance`](Self::advance).
pub struct FastaDecoder<R: io::Read> {
    lines: LineReader<R>,
    state: State,
    /// Header line of the current record
    header: Vec<u8>,
    /// Header line of the following record, found while reading the sequence
    next_header: Vec<u8>,
    /// Sequence buffer of the current record
    seq: Vec<u8>,
    block: SequenceBlock,
    tracker: Option<ProgressTracker>,
}

impl FastaDecoder<Box<dyn io::Read + Send>> {
    /// Open a (possibly compressed) FASTA file, failing if it holds another format
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let (mut lines, tracker) = open_lines(path.as_ref(), DEFAULT_BUFFER_SIZE)?;
        match detect(&mut lines)? {
            Format::Fasta => Ok(Self::from_lines(lines, Some(tracker))),
            Format::Fastq => Err(Error::InvalidHeader(
                crate::fastq::MARKER.into(),
                MARKER.into(),
            )),
        }
    }
}

impl<R: io::Read> FastaDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, reader)
    }

    /// Create a decoder with a read-ahead buffer of `capacity` bytes
    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self::from_lines(LineReader::with_capacity(capacity, reader), None)
    }

    pub(crate) fn from_lines(lines: LineReader<R>, tracker: Option<ProgressTracker>) -> Self {
        Self {
            lines,
            state: State::NotStarted,
            header: Vec::with_capacity(256),
            next_header: Vec::with_capacity(256),
            seq: Vec::with_capacity(64 * 1024),
            block: SequenceBlock::default(),
            tracker,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Move to the next record.
    ///
    /// Returns `Ok(false)` once the stream holds no further record. After an
    /// error the decoder is failed and every later call returns `Ok(false)`.
    pub fn advance(&mut self) -> Result<bool, Error> {
        match self.state {
            State::Exhausted | State::Failed => return Ok(false),
            _ if self.block.state == BlockState::Failed => {
                self.state = State::Failed;
                return Ok(false);
            }
            _ => {}
        }
        match self.next_record() {
            Ok(true) => {
                self.state = State::Reading;
                Ok(true)
            }
            Ok(false) => {
                self.state = State::Exhausted;
                Ok(false)
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    fn next_record(&mut self) -> Result<bool, Error> {
        if self.state == State::NotStarted {
            return self.read_first_header();
        }

        self.finish_block()?;
        if !self.block.ended_at_stop {
            return Ok(false);
        }
        std::mem::swap(&mut self.header, &mut self.next_header);
        self.seq.clear();
        self.block.reset();
        Ok(true)
    }

    fn read_first_header(&mut self) -> Result<bool, Error> {
        loop {
            if self.lines.read_line(&mut self.header)? == 0 {
                return Ok(false);
            }
            if !self.header.is_empty() {
                break;
            }
        }
        match self.header[0] {
            MARKER => {
                self.block.reset();
                Ok(true)
            }
            other => Err(Error::InvalidHeader(other.into(), MARKER.into())),
        }
    }

    /// Read whatever remains of the current sequence block
    fn finish_block(&mut self) -> Result<(), Error> {
        match self.block.state {
            BlockState::Unread => self.buffer_block(),
            BlockState::Streaming => {
                for byte in SequenceBytes::new(
                    &mut self.lines,
                    &mut self.block,
                    MARKER,
                    &mut self.next_header,
                ) {
                    byte?;
                }
                Ok(())
            }
            BlockState::Buffered | BlockState::Streamed | BlockState::Failed => Ok(()),
        }
    }

    fn buffer_block(&mut self) -> Result<(), Error> {
        self.seq.clear();
        let found = self
            .lines
            .read_block(MARKER, &mut self.seq, &mut self.next_header)?;
        self.block.buffered(self.seq.len(), found);
        Ok(())
    }

    fn ensure_reading(&self) -> Result<(), Error> {
        match self.state {
            State::Reading => Ok(()),
            _ => Err(Error::NotStarted),
        }
    }

    /// Identifier of the current record (header line without the marker)
    pub fn identifier(&self) -> Result<&[u8], Error> {
        self.ensure_reading()?;
        Ok(&self.header[1..])
    }

    /// Sequence of the current record with line wrapping removed
    pub fn sequence(&mut self) -> Result<&[u8], Error> {
        self.ensure_reading()?;
        match self.block.state {
            BlockState::Unread => {
                if let Err(e) = self.buffer_block() {
                    self.state = State::Failed;
                    return Err(e);
                }
            }
            BlockState::Buffered => {}
            BlockState::Streaming | BlockState::Streamed | BlockState::Failed => {
                return Err(Error::SequenceStreamed)
            }
        }
        Ok(&self.seq)
    }

    /// Iterate over the sequence bytes of the current record without buffering them.
    ///
    /// Yields nothing if the sequence was already buffered by [`sequence`](Self::sequence).
    pub fn sequence_bytes(&mut self) -> Result<SequenceBytes<'_, R>, Error> {
        self.ensure_reading()?;
        Ok(SequenceBytes::new(
            &mut self.lines,
            &mut self.block,
            MARKER,
            &mut self.next_header,
        ))
    }

    /// Copy the current record out of the decoder
    pub fn record(&mut self) -> Result<SequenceRecord, Error> {
        let seq = self.sequence()?.to_vec();
        Ok(SequenceRecord::new(self.identifier()?, seq))
    }

    /// Percentage of the underlying file consumed, if known
    pub fn progress(&self) -> Option<f64> {
        self.tracker.as_ref().and_then(ProgressTracker::percent)
    }
}
