use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::{Error, Record};

/// Column width of sequence lines in written FASTA
pub const DEFAULT_LINE_WIDTH: usize = 80;

/// Whether an output path asks for gzip compression: its name ends in `gz`
pub fn is_gzip_path(path: &Path) -> bool {
    path.as_os_str().as_encoded_bytes().ends_with(b"gz")
}

/// An output stream, plain or gzip-compressed.
///
/// Gzip streams are only complete after [`Output::finish`]; dropping one
/// discards any error raised while writing the trailer.
pub enum Output<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Output<W> {
    pub fn plain(inner: W) -> Self {
        Self::Plain(inner)
    }

    pub fn gzip(inner: W, level: Compression) -> Self {
        Self::Gzip(GzEncoder::new(inner, level))
    }

    /// Write any pending compressed data and the trailer, then flush the underlying writer
    pub fn finish(self) -> io::Result<W> {
        let mut inner = match self {
            Self::Plain(inner) => inner,
            Self::Gzip(encoder) => encoder.finish()?,
        };
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for Output<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(inner) => inner.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(inner) => inner.flush(),
            Self::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Create an output file, gzip-compressed when its name ends in `gz`.
pub fn create_output(path: &Path, level: Compression) -> Result<Output<BufWriter<File>>, Error> {
    let file = BufWriter::new(File::create(path)?);
    if is_gzip_path(path) {
        Ok(Output::gzip(file, level))
    } else {
        Ok(Output::plain(file))
    }
}

/// Writes records as FASTA with the sequence wrapped at a fixed width.
pub struct FastaWriter<W: Write> {
    inner: W,
    line_width: usize,
    written: u64,
}

impl<W: Write> FastaWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_line_width(inner, DEFAULT_LINE_WIDTH)
    }

    pub fn with_line_width(inner: W, line_width: usize) -> Self {
        Self {
            inner,
            line_width,
            written: 0,
        }
    }

    pub fn write_record<Rf: Record>(&mut self, record: &Rf) -> io::Result<()> {
        record.write_fasta(&mut self.inner, self.line_width)?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Flush and hand back the underlying writer.
    ///
    /// A gzip [`Output`] still needs its own `finish` afterwards.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SequenceRecord;
    use std::io::Read;

    /// Accepts writes until it has been flushed once
    #[derive(Default)]
    struct FailAfterFlush {
        data: Vec<u8>,
        flushed: bool,
    }

    impl Write for FailAfterFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.flushed {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed = true;
            Ok(())
        }
    }

    #[test]
    fn test_gzip_path_detection() {
        assert!(is_gzip_path(Path::new("out.fasta.gz")));
        assert!(is_gzip_path(Path::new("outgz")));
        assert!(is_gzip_path(Path::new("dir/part_01.fa.tgz")));
        assert!(!is_gzip_path(Path::new("out.fasta")));
        assert!(!is_gzip_path(Path::new("out.gz.fasta")));
    }

    #[test]
    fn test_writer_counts_records() {
        let mut writer = FastaWriter::new(Vec::new());
        writer
            .write_record(&SequenceRecord::new("s1", "ACGTACGT"))
            .unwrap();
        writer.write_record(&SequenceRecord::new("s2", "TTTT")).unwrap();
        assert_eq!(writer.written(), 2);

        let out = writer.finish().unwrap();
        assert_eq!(out, b">s1\nACGTACGT\n>s2\nTTTT\n");
    }

    #[test]
    fn test_flush_reaches_inner_writer() {
        let mut writer = FastaWriter::new(FailAfterFlush::default());
        writer.write_record(&SequenceRecord::new("s1", "AC")).unwrap();
        writer.flush().unwrap();
        assert!(writer.write_record(&SequenceRecord::new("s2", "AC")).is_err());
    }

    #[test]
    fn test_custom_line_width() {
        let mut writer = FastaWriter::with_line_width(Vec::new(), 3);
        writer
            .write_record(&SequenceRecord::new("s1", "ACGTACG"))
            .unwrap();
        assert_eq!(writer.finish().unwrap(), b">s1\nACG\nTAC\nG\n");
    }

    #[test]
    fn test_create_gzip_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.fasta.gz");

        let output = create_output(&path, Compression::default()).unwrap();
        assert!(matches!(output, Output::Gzip(_)));
        let mut writer = FastaWriter::new(output);
        writer.write_record(&SequenceRecord::new("s1", "ACGT")).unwrap();
        writer.finish().unwrap().finish().unwrap();

        let (mut reader, format) = niffler::send::from_path(&path).unwrap();
        assert_eq!(format, niffler::send::compression::Format::Gzip);
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, ">s1\nACGT\n");
    }

    #[test]
    fn test_create_plain_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.fasta");

        let output = create_output(&path, Compression::default()).unwrap();
        assert!(matches!(output, Output::Plain(_)));
        let mut writer = FastaWriter::new(output);
        writer.write_record(&SequenceRecord::new("s1", "AC")).unwrap();
        writer.finish().unwrap().finish().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), ">s1\nAC\n");
    }

    #[test]
    fn test_gzip_trailer_failure_is_reported() {
        let mut output = Output::gzip(FailAfterFlush::default(), Compression::default());
        output.write_all(b">s1\nACGT\n").unwrap();
        output.flush().unwrap();
        assert!(output.finish().is_err());
    }
}
