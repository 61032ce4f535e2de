use std::io::{self, BufRead, BufReader, Read};

use memchr::memchr;

use crate::Error;

/// Buffered line access shared by the FASTA and FASTQ decoders.
///
/// Lines are returned without their terminator (`\n` or `\r\n`). A line longer
/// than the read-ahead buffer is accumulated across refills.
pub(crate) struct LineReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> LineReader<R> {
    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity.max(1), reader),
        }
    }

    /// Ensure the read-ahead buffer holds data (empty only at end of stream)
    fn fill(&mut self) -> Result<&[u8], Error> {
        loop {
            match self.reader.fill_buf() {
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from_read(e)),
            }
        }
        Ok(self.reader.buffer())
    }

    /// Look at the next byte without consuming it
    pub fn peek(&mut self) -> Result<Option<u8>, Error> {
        Ok(self.fill()?.first().copied())
    }

    pub fn consume(&mut self, amount: usize) {
        self.reader.consume(amount);
    }

    /// Read one line into `line`, replacing its contents.
    ///
    /// Returns the number of raw bytes consumed, zero at end of stream.
    pub fn read_line(&mut self, line: &mut Vec<u8>) -> Result<usize, Error> {
        line.clear();
        self.append_line(line)
    }

    /// Append one line to `buf` without its terminator
    pub fn append_line(&mut self, buf: &mut Vec<u8>) -> Result<usize, Error> {
        let start = buf.len();
        let n = self
            .reader
            .read_until(b'\n', buf)
            .map_err(Error::from_read)?;
        if buf.len() > start && buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.len() > start && buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(n)
    }

    /// Consume the remainder of the current line without storing it
    pub fn skip_line(&mut self) -> Result<usize, Error> {
        let mut skipped = 0;
        loop {
            let (newline, available) = {
                let buf = self.fill()?;
                (memchr(b'\n', buf), buf.len())
            };
            match newline {
                Some(pos) => {
                    self.consume(pos + 1);
                    return Ok(skipped + pos + 1);
                }
                None if available == 0 => return Ok(skipped),
                None => {
                    self.consume(available);
                    skipped += available;
                }
            }
        }
    }

    /// Discard `count` bytes that are not line terminators, whatever the line wrapping.
    ///
    /// Stops right after the last discarded byte. Returns how many bytes were
    /// still missing when the stream ended (zero on success).
    pub fn skip_residues(&mut self, mut count: usize) -> Result<usize, Error> {
        while count > 0 {
            let (consumed, remaining) = {
                let buf = self.fill()?;
                if buf.is_empty() {
                    break;
                }
                let mut consumed = 0;
                let mut remaining = count;
                for &byte in buf {
                    if remaining == 0 {
                        break;
                    }
                    consumed += 1;
                    if byte != b'\n' && byte != b'\r' {
                        remaining -= 1;
                    }
                }
                (consumed, remaining)
            };
            self.consume(consumed);
            count = remaining;
        }
        Ok(count)
    }

    /// Append sequence lines to `seq` until end of stream or a line starting with `stop`.
    ///
    /// The stop line is read into `stop_line`. Must be called at the start of a line.
    /// Returns whether a stop line was found.
    pub fn read_block(
        &mut self,
        stop: u8,
        seq: &mut Vec<u8>,
        stop_line: &mut Vec<u8>,
    ) -> Result<bool, Error> {
        loop {
            match self.peek()? {
                None => return Ok(false),
                Some(byte) if byte == stop => {
                    self.read_line(stop_line)?;
                    return Ok(true);
                }
                Some(_) => {
                    self.append_line(seq)?;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockState {
    /// Nothing of the sequence block has been read yet
    Unread,
    /// Fully read into the decoder's sequence buffer
    Buffered,
    /// Partially consumed through `SequenceBytes`
    Streaming,
    /// Fully consumed through `SequenceBytes`
    Streamed,
    /// A read error occurred while streaming
    Failed,
}

/// Bookkeeping for the sequence block of the current record.
#[derive(Debug)]
pub(crate) struct SequenceBlock {
    pub state: BlockState,
    /// Number of sequence bytes read so far (terminators excluded)
    pub len: usize,
    /// Whether the block ended at a stop line rather than at end of stream
    pub ended_at_stop: bool,
    at_line_start: bool,
}

impl Default for SequenceBlock {
    fn default() -> Self {
        Self {
            state: BlockState::Unread,
            len: 0,
            ended_at_stop: false,
            at_line_start: true,
        }
    }
}

impl SequenceBlock {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn buffered(&mut self, len: usize, ended_at_stop: bool) {
        self.state = BlockState::Buffered;
        self.len = len;
        self.ended_at_stop = ended_at_stop;
    }

    fn streamed(&mut self, ended_at_stop: bool) {
        self.state = BlockState::Streamed;
        self.ended_at_stop = ended_at_stop;
    }
}

/// Pull-based iterator over the sequence bytes of the current record.
///
/// Bytes are taken straight from the decoder's read-ahead buffer; no
/// intermediate sequence buffer is built. Line terminators are skipped and
/// iteration stops at the line that closes the block (`>` for FASTA, `+` for
/// FASTQ), which is consumed and kept by the decoder.
///
/// Dropping the iterator early is fine, the decoder skips the remainder on the
/// next `advance()`.
pub struct SequenceBytes<'a, R: Read> {
    lines: &'a mut LineReader<R>,
    block: &'a mut SequenceBlock,
    stop: u8,
    stop_line: &'a mut Vec<u8>,
}

impl<'a, R: Read> SequenceBytes<'a, R> {
    pub(crate) fn new(
        lines: &'a mut LineReader<R>,
        block: &'a mut SequenceBlock,
        stop: u8,
        stop_line: &'a mut Vec<u8>,
    ) -> Self {
        Self {
            lines,
            block,
            stop,
            stop_line,
        }
    }

    /// Number of sequence bytes yielded for the current record so far
    pub fn emitted(&self) -> usize {
        self.block.len
    }

    fn fail(&mut self, err: Error) -> Option<Result<u8, Error>> {
        self.block.state = BlockState::Failed;
        Some(Err(err))
    }
}

impl<R: Read> Iterator for SequenceBytes<'_, R> {
    type Item = Result<u8, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.block.state {
            BlockState::Unread => self.block.state = BlockState::Streaming,
            BlockState::Streaming => {}
            BlockState::Buffered | BlockState::Streamed | BlockState::Failed => return None,
        }

        loop {
            let byte = match self.lines.peek() {
                Ok(Some(byte)) => byte,
                Ok(None) => {
                    self.block.streamed(false);
                    return None;
                }
                Err(e) => return self.fail(e),
            };

            if self.block.at_line_start && byte == self.stop {
                return match self.lines.read_line(self.stop_line) {
                    Ok(_) => {
                        self.block.streamed(true);
                        None
                    }
                    Err(e) => self.fail(e),
                };
            }

            self.lines.consume(1);
            match byte {
                b'\n' => self.block.at_line_start = true,
                b'\r' => {}
                _ => {
                    self.block.at_line_start = false;
                    self.block.len += 1;
                    return Some(Ok(byte));
                }
            }
        }
    }
}
