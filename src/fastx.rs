use std::fs::File;
use std::io;
use std::path::Path;

use log::debug;

use crate::lines::{LineReader, SequenceBytes};
use crate::progress::ProgressTracker;
use crate::{fasta, fastq, Error, SequenceRecord, DEFAULT_BUFFER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Fasta,
    Fastq,
}

/// Open `path`, select a decompression transform and wrap the result in a line reader.
///
/// Progress is tracked on the raw bytes read from the file.
pub(crate) fn open_lines(
    path: &Path,
    capacity: usize,
) -> Result<(LineReader<Box<dyn io::Read + Send>>, ProgressTracker), Error> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let total = file.metadata().ok().map(|meta| meta.len());
    let (counting, tracker) = ProgressTracker::wrap(file, total);
    let (reader, compression) = niffler::send::get_reader(Box::new(counting))?;
    debug!("opened {} (compression: {compression:?})", path.display());
    Ok((LineReader::with_capacity(capacity, reader), tracker))
}

/// Determine the format from the first byte of the stream, without consuming it
pub(crate) fn detect<R: io::Read>(lines: &mut LineReader<R>) -> Result<Format, Error> {
    match lines.peek()? {
        Some(fasta::MARKER) => Ok(Format::Fasta),
        Some(fastq::MARKER) => Ok(Format::Fastq),
        Some(other) => Err(Error::UnsupportedFormat(other.into())),
        None => Err(Error::EmptyInput),
    }
}

/// A FASTA or FASTQ decoder, the variant being fixed when the stream is opened.
pub enum Decoder<R: io::Read> {
    Fasta(fasta::FastaDecoder<R>),
    Fastq(fastq::FastqDecoder<R>),
}

impl Decoder<Box<dyn io::Read + Send>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_path_with_capacity(path, DEFAULT_BUFFER_SIZE)
    }

    /// Open a file with a read-ahead buffer of `capacity` bytes
    pub fn from_path_with_capacity<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, Error> {
        let (lines, tracker) = open_lines(path.as_ref(), capacity)?;
        Self::from_lines(lines, Some(tracker))
    }
}

impl<R: io::Read> Decoder<R> {
    pub fn new(reader: R) -> Result<Self, Error> {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, reader)
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Result<Self, Error> {
        Self::from_lines(LineReader::with_capacity(capacity, reader), None)
    }

    fn from_lines(mut lines: LineReader<R>, tracker: Option<ProgressTracker>) -> Result<Self, Error> {
        match detect(&mut lines)? {
            Format::Fasta => Ok(Self::Fasta(fasta::FastaDecoder::from_lines(lines, tracker))),
            Format::Fastq => Ok(Self::Fastq(fastq::FastqDecoder::from_lines(lines, tracker))),
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Self::Fasta(_) => Format::Fasta,
            Self::Fastq(_) => Format::Fastq,
        }
    }

    pub fn advance(&mut self) -> Result<bool, Error> {
        match self {
            Self::Fasta(inner) => inner.advance(),
            Self::Fastq(inner) => inner.advance(),
        }
    }

    pub fn identifier(&self) -> Result<&[u8], Error> {
        match self {
            Self::Fasta(inner) => inner.identifier(),
            Self::Fastq(inner) => inner.identifier(),
        }
    }

    pub fn sequence(&mut self) -> Result<&[u8], Error> {
        match self {
            Self::Fasta(inner) => inner.sequence(),
            Self::Fastq(inner) => inner.sequence(),
        }
    }

    pub fn sequence_bytes(&mut self) -> Result<SequenceBytes<'_, R>, Error> {
        match self {
            Self::Fasta(inner) => inner.sequence_bytes(),
            Self::Fastq(inner) => inner.sequence_bytes(),
        }
    }

    pub fn record(&mut self) -> Result<SequenceRecord, Error> {
        match self {
            Self::Fasta(inner) => inner.record(),
            Self::Fastq(inner) => inner.record(),
        }
    }

    pub fn progress(&self) -> Option<f64> {
        match self {
            Self::Fasta(inner) => inner.progress(),
            Self::Fastq(inner) => inner.progress(),
        }
    }
}

impl<R: io::Read> Iterator for Decoder<R> {
    type Item = Result<SequenceRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => Some(self.record()),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use std::io::{Cursor, Write};

    const FASTA: &str = ">s1\nACGTACGT\n>s2\nTTTT\n";
    const FASTQ: &str = "@r1\nACGT\n+\n!!!!\n@r2\nGGGG\n+\nIIII\n";

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        let format = if name.ends_with(".gz") {
            niffler::send::compression::Format::Gzip
        } else if name.ends_with(".bz2") {
            niffler::send::compression::Format::Bzip
        } else {
            niffler::send::compression::Format::No
        };
        let mut writer =
            niffler::send::get_writer(Box::new(file), format, niffler::Level::Six).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
        drop(writer);
        path
    }

    #[test]
    fn test_detects_fasta() {
        let decoder = Decoder::new(Cursor::new(FASTA)).unwrap();
        assert_eq!(decoder.format(), Format::Fasta);
    }

    #[test]
    fn test_detects_fastq() {
        let decoder = Decoder::new(Cursor::new(FASTQ)).unwrap();
        assert_eq!(decoder.format(), Format::Fastq);
    }

    #[test]
    fn test_peeked_byte_is_not_lost() {
        let records: Vec<_> = Decoder::new(Cursor::new(FASTA))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records[0], SequenceRecord::new("s1", "ACGTACGT"));
        assert_eq!(records[1], SequenceRecord::new("s2", "TTTT"));
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(
            Decoder::new(Cursor::new("ACGT\n")),
            Err(Error::UnsupportedFormat('A'))
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            Decoder::new(Cursor::new("")),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Decoder::from_path(dir.path().join("missing.fa")),
            Err(Error::Open { .. })
        ));
    }

    #[test]
    fn test_from_path_compressed() {
        let dir = tempfile::tempdir().unwrap();
        for (name, content, format) in [
            ("plain.fasta", FASTA, Format::Fasta),
            ("plain.fastq", FASTQ, Format::Fastq),
            ("reads.fasta.gz", FASTA, Format::Fasta),
            ("reads.fastq.gz", FASTQ, Format::Fastq),
            ("reads.fastq.bz2", FASTQ, Format::Fastq),
        ] {
            let path = write_file(&dir, name, content);
            let decoder = Decoder::from_path(&path).unwrap();
            assert_eq!(decoder.format(), format, "{name}");

            let records: Vec<_> = decoder.collect::<Result<_, _>>().unwrap();
            assert_eq!(records.len(), 2, "{name}");
        }
    }

    #[test]
    fn test_progress_reaches_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "reads.fastq", FASTQ);

        let mut decoder = Decoder::from_path_with_capacity(&path, 8).unwrap();
        let mut samples = Vec::new();
        while decoder.advance().unwrap() {
            decoder.record().unwrap();
            samples.push(decoder.progress().unwrap());
        }
        assert_eq!(samples.len(), 2);
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
        assert!(samples.iter().all(|pct| (0.0..=100.0).contains(pct)));
    }

    #[test]
    fn test_progress_unknown_for_streams() {
        let mut decoder = Decoder::new(Cursor::new(FASTA)).unwrap();
        assert!(decoder.advance().unwrap());
        assert_eq!(decoder.progress(), None);
    }

    #[test]
    fn test_corrupt_gzip_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.fasta.gz");
        // valid gzip magic followed by garbage
        let mut bytes = vec![0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03];
        bytes.extend_from_slice(&[0xff; 64]);
        std::fs::write(&path, bytes).unwrap();

        let result = Decoder::from_path(&path).and_then(|decoder| {
            decoder.collect::<Result<Vec<_>, _>>()
        });
        assert!(matches!(result, Err(Error::Decompression(_))));
    }

    #[test]
    fn test_truncated_gzip_stream() {
        let dir = tempfile::tempdir().unwrap();
        let content: String = (0..500)
            .map(|i| format!(">s{i}\n{}\n", "ACGTTGCA".repeat(i % 13 + 1)))
            .collect();
        let full = write_file(&dir, "full.fasta.gz", &content);
        let bytes = std::fs::read(&full).unwrap();

        let path = dir.path().join("truncated.fasta.gz");
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let result = Decoder::from_path(&path).and_then(|decoder| {
            decoder.collect::<Result<Vec<_>, _>>()
        });
        assert!(matches!(result, Err(Error::Decompression(_))));
    }
}
