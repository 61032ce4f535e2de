use std::borrow::Cow;
use std::io::Write;

pub trait Record {
    /// Returns the identifier of the record, without the leading marker.
    fn id(&self) -> &[u8];

    /// Returns the sequence of the record.
    ///
    /// Line wrapping of the input is removed, the sequence contains no newlines.
    fn seq(&self) -> &[u8];

    /// Convert ID to string (UTF-8), replacing invalid bytes
    fn id_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.id())
    }

    /// Convert sequence to string (UTF-8), replacing invalid bytes
    fn seq_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.seq())
    }

    /// Writes the record in FASTA format, wrapping the sequence every `line_width` bytes.
    ///
    /// Every sequence line is newline terminated, including a partial final line.
    /// An empty sequence is written as an empty line. A width of zero disables wrapping.
    fn write_fasta<W: Write>(&self, writer: &mut W, line_width: usize) -> std::io::Result<()> {
        writer.write_all(b">")?;
        writer.write_all(self.id())?;
        writer.write_all(b"\n")?;

        let seq = self.seq();
        if seq.is_empty() || line_width == 0 {
            writer.write_all(seq)?;
            writer.write_all(b"\n")?;
            return Ok(());
        }
        for line in seq.chunks(line_width) {
            writer.write_all(line)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// An owned sequence record, as passed between the pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceRecord {
    id: Vec<u8>,
    seq: Vec<u8>,
}

impl SequenceRecord {
    pub fn new(id: impl Into<Vec<u8>>, seq: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            seq: seq.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.id, self.seq)
    }
}

impl Record for SequenceRecord {
    fn id(&self) -> &[u8] {
        &self.id
    }

    fn seq(&self) -> &[u8] {
        &self.seq
    }
}
