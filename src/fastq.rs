use std::io;
use std::path::Path;

use log::{debug, warn};

use crate::fastx::{detect, open_lines, Format};
use crate::lines::{BlockState, LineReader, SequenceBlock, SequenceBytes};
use crate::progress::ProgressTracker;
use crate::{Error, SequenceRecord, DEFAULT_BUFFER_SIZE};

/// Record marker of a FASTQ header line
pub const MARKER: u8 = b'@';

/// Marker of the line separating sequence and quality blocks
pub const SEPARATOR: u8 = b'+';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    NotStarted,
    /// Positioned on a header, the sequence block is next
    ReadingHeader,
    /// Part of the sequence block was streamed
    ReadingSequence,
    /// Discarding the quality block of the previous record
    SkippingQuality,
    Exhausted,
    Failed,
}

/// Streaming FASTQ decoder.
///
/// Quality scores are not decoded: after the `+` separator the decoder skips as
/// many quality bytes as the sequence had, however the two blocks are wrapped,
/// and then looks for the next `@` header line.
pub struct FastqDecoder<R: io::Read> {
    lines: LineReader<R>,
    state: State,
    /// Header line of the current record
    header: Vec<u8>,
    /// Separator line, read when the sequence block ends
    separator: Vec<u8>,
    /// Sequence buffer of the current record
    seq: Vec<u8>,
    block: SequenceBlock,
    tracker: Option<ProgressTracker>,
}

impl FastqDecoder<Box<dyn io::Read + Send>> {
    /// Open a (possibly compressed) FASTQ file, failing if it holds another format
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let (mut lines, tracker) = open_lines(path.as_ref(), DEFAULT_BUFFER_SIZE)?;
        match detect(&mut lines)? {
            Format::Fastq => Ok(Self::from_lines(lines, Some(tracker))),
            Format::Fasta => Err(Error::InvalidHeader(
                crate::fasta::MARKER.into(),
                MARKER.into(),
            )),
        }
    }
}

impl<R: io::Read> FastqDecoder<R> {
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
            separator: Vec::with_capacity(256),
            seq: Vec::with_capacity(1024),
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
                self.state = State::ReadingHeader;
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
            warn!(
                "FASTQ record {} ends without a '+' separator",
                String::from_utf8_lossy(&self.header[1..])
            );
            return Ok(false);
        }

        self.state = State::SkippingQuality;
        if self.block.len > 0 {
            let missing = self.lines.skip_residues(self.block.len)?;
            if missing > 0 {
                warn!(
                    "FASTQ record {} is missing {missing} quality scores at end of stream",
                    String::from_utf8_lossy(&self.header[1..])
                );
                return Ok(false);
            }
            // remainder of the last quality line
            self.lines.skip_line()?;
        }
        self.find_header()
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

    /// Consume lines until one starts with the header marker
    fn find_header(&mut self) -> Result<bool, Error> {
        let mut skipped = 0usize;
        loop {
            if self.lines.read_line(&mut self.header)? == 0 {
                if skipped > 0 {
                    debug!("skipped {skipped} trailing lines after the last FASTQ record");
                }
                return Ok(false);
            }
            if self.header.first() == Some(&MARKER) {
                if skipped > 0 {
                    debug!("skipped {skipped} lines to resynchronise on a FASTQ header");
                }
                self.seq.clear();
                self.block.reset();
                return Ok(true);
            }
            skipped += 1;
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
                    SEPARATOR,
                    &mut self.separator,
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
            .read_block(SEPARATOR, &mut self.seq, &mut self.separator)?;
        self.block.buffered(self.seq.len(), found);
        Ok(())
    }

    fn ensure_reading(&self) -> Result<(), Error> {
        match self.state {
            State::ReadingHeader | State::ReadingSequence => Ok(()),
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
    /// The number of yielded bytes is tracked so the quality block can be skipped.
    /// Yields nothing if the sequence was already buffered by [`sequence`](Self::sequence).
    pub fn sequence_bytes(&mut self) -> Result<SequenceBytes<'_, R>, Error> {
        self.ensure_reading()?;
        self.state = State::ReadingSequence;
        Ok(SequenceBytes::new(
            &mut self.lines,
            &mut self.block,
            SEPARATOR,
            &mut self.separator,
        ))
    }

    /// Length of the current sequence block as read so far
    pub fn sequence_len(&self) -> usize {
        self.block.len
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Record;
    use std::io::Cursor;

    fn create_test_record(id: &str, seq: &str, sep: &str, qual: &str) -> String {
        format!("@{}\n{}\n{}\n{}\n", id, seq, sep, qual)
    }

    fn decoder(data: &str) -> FastqDecoder<Cursor<Vec<u8>>> {
        FastqDecoder::new(Cursor::new(data.as_bytes().to_vec()))
    }

    fn collect_records<R: io::Read>(decoder: &mut FastqDecoder<R>) -> Vec<SequenceRecord> {
        let mut records = Vec::new();
        while decoder.advance().unwrap() {
            records.push(decoder.record().unwrap());
        }
        records
    }

    #[test]
    fn test_basic_record_parsing() {
        let mut reader = decoder(&create_test_record("test1", "ACTG", "+", "IIII"));

        assert!(reader.advance().unwrap());
        assert_eq!(reader.identifier().unwrap(), b"test1");
        assert_eq!(reader.sequence().unwrap(), b"ACTG");
        assert!(!reader.advance().unwrap());
        assert_eq!(reader.state(), State::Exhausted);
    }

    #[test]
    fn test_two_records_in_order() {
        let records = collect_records(&mut decoder("@r1\nACGT\n+\n!!!!\n@r2\nGGGG\n+\nIIII\n"));
        assert_eq!(
            records,
            vec![
                SequenceRecord::new("r1", "ACGT"),
                SequenceRecord::new("r2", "GGGG"),
            ]
        );
    }

    #[test]
    fn test_quality_starting_with_markers() {
        // quality lines may legally start with '@' or '+'
        let input = [
            create_test_record("r1", "ACGT", "+r1", "@III"),
            create_test_record("r2", "GG", "+", "+@"),
            create_test_record("r3", "T", "+", "@"),
        ]
        .join("");
        let records = collect_records(&mut decoder(&input));

        let ids: Vec<_> = records.iter().map(|r| r.id_str().into_owned()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_wrapped_sequence_and_quality() {
        // sequence wrapped at 4, quality wrapped at 3
        let input = "@r1\nACGT\nACGT\nAC\n+\n@@@\n@@@\n@@@\n@\n@r2\nTT\n+\nII\n";
        let records = collect_records(&mut decoder(input));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq(), b"ACGTACGTAC");
        assert_eq!(records[1], SequenceRecord::new("r2", "TT"));
    }

    #[test]
    fn test_resynchronise_after_stray_lines() {
        let input = "@r1\nACGT\n+\nIIII\n\nstray line\n@r2\nGG\n+\nII\n";
        let records = collect_records(&mut decoder(input));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id(), b"r2");
    }

    #[test]
    fn test_long_quality_line_is_tolerated() {
        let input = "@r1\nAC\n+\nIIIIII\n@r2\nGG\n+\nII\n";
        let records = collect_records(&mut decoder(input));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].seq(), b"GG");
    }

    #[test]
    fn test_crlf_input() {
        let input = "@r1\r\nACGT\r\n+\r\nIIII\r\n@r2\r\nGG\r\n+\r\nII\r\n";
        let records = collect_records(&mut decoder(input));
        assert_eq!(records[0], SequenceRecord::new("r1", "ACGT"));
        assert_eq!(records[1], SequenceRecord::new("r2", "GG"));
    }

    #[test]
    fn test_empty_sequence() {
        let input = "@r1\n\n+\n\n@r2\nAC\n+\nII\n";
        let records = collect_records(&mut decoder(input));
        assert_eq!(records.len(), 2);
        assert!(records[0].is_empty());
        assert_eq!(records[1].seq(), b"AC");
    }

    #[test]
    fn test_truncated_record() {
        let mut reader = decoder("@r1\nACGT\n+\nII");
        assert!(reader.advance().unwrap());
        assert_eq!(reader.sequence().unwrap(), b"ACGT");
        assert!(!reader.advance().unwrap());

        let mut reader = decoder("@r1\nACGT\n");
        assert!(reader.advance().unwrap());
        assert_eq!(reader.sequence().unwrap(), b"ACGT");
        assert!(!reader.advance().unwrap());
    }

    #[test]
    fn test_invalid_header() {
        let mut reader = decoder("r1\nACGT\n+\nIIII\n");
        assert!(matches!(
            reader.advance(),
            Err(Error::InvalidHeader('r', '@'))
        ));
        assert!(!reader.advance().unwrap());
    }

    #[test]
    fn test_not_started() {
        let mut reader = decoder(&create_test_record("r1", "ACGT", "+", "IIII"));
        assert!(matches!(reader.identifier(), Err(Error::NotStarted)));
        assert!(matches!(reader.record(), Err(Error::NotStarted)));
    }

    #[test]
    fn test_sequence_bytes_tracks_length() {
        let input = "@r1\nAC\nGT\n+\nIII\nI\n@r2\nGG\n+\nII\n";
        let mut reader = decoder(input);

        assert!(reader.advance().unwrap());
        let bytes: Vec<u8> = reader
            .sequence_bytes()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(bytes, b"ACGT");
        assert_eq!(reader.sequence_len(), 4);

        assert!(reader.advance().unwrap());
        assert_eq!(reader.record().unwrap(), SequenceRecord::new("r2", "GG"));
    }

    #[test]
    fn test_partially_streamed_sequence() {
        let input = "@r1\nACGTACGT\n+\n@@@@@@@@\n@r2\nGG\n+\nII\n";
        let mut reader = decoder(input);

        assert!(reader.advance().unwrap());
        assert_eq!(reader.sequence_bytes().unwrap().take(2).count(), 2);
        assert_eq!(reader.state(), State::ReadingSequence);

        assert!(reader.advance().unwrap());
        assert_eq!(reader.identifier().unwrap(), b"r2");
    }

    #[test]
    fn test_skipped_quality_matches_sequence_length() {
        // quality wrapping differs per record; every record must still be found
        let mut input = String::new();
        let mut expected = Vec::new();
        for i in 1..=20 {
            let seq = "A".repeat(i * 7);
            let qual = "I".repeat(i * 7);
            let wrapped: Vec<&str> = qual
                .as_bytes()
                .chunks(i + 2)
                .map(|c| std::str::from_utf8(c).unwrap())
                .collect();
            input.push_str(&format!("@r{i}\n{seq}\n+\n{}\n", wrapped.join("\n")));
            expected.push(SequenceRecord::new(format!("r{i}"), seq));
        }
        let records = collect_records(&mut FastqDecoder::with_capacity(5, Cursor::new(input)));
        assert_eq!(records, expected);
    }

    #[test]
    fn test_sequence_longer_than_buffer() {
        let long = "ACGT".repeat(500);
        let qual = "I".repeat(long.len());
        let input = create_test_record("long", &long, "+", &qual);
        let mut reader = FastqDecoder::with_capacity(16, Cursor::new(input));

        assert!(reader.advance().unwrap());
        assert_eq!(reader.sequence().unwrap(), long.as_bytes());
        assert!(!reader.advance().unwrap());
    }

    #[test]
    fn test_from_path_rejects_fasta() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        io::Write::write_all(&mut file, b">s1\nACGT\n").unwrap();

        assert!(matches!(
            FastqDecoder::from_path(file.path()),
            Err(Error::InvalidHeader('>', '@'))
        ));
    }
}
