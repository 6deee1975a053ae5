//! Sparse patch stream for incremental frames.
//!
//! The stream is a sequence of runs, each introduced by a 16-bit
//! little-endian count. With the high bit set, the low 15 bits give the
//! number of 16-bit values that follow: non-zero values overwrite the
//! destination cursor position, zeros leave it untouched, and the cursor
//! advances either way. With the high bit clear, the count is a run length
//! followed by a single value: non-zero fills the run, zero skips it.

use anyhow::{ensure, Result};
use byteorder::{ByteOrder, LittleEndian};

/// High bit of the run count selects the sparse-overwrite form.
pub const SPARSE_RUN_FLAG: u16 = 0x8000;

/// Longest run either form can carry.
pub const MAX_RUN_LEN: usize = 0x7FFF;

/// One decoded run from a patch stream.
#[derive(Debug, Clone, Copy)]
pub enum PatchRun<'a> {
    /// `len` destination positions filled with `value`, or skipped
    /// entirely when `value` is zero.
    Fill { len: usize, value: u16 },
    /// Per-position overwrite values; zeros preserve the destination.
    Sparse(SparseValues<'a>),
}

/// Borrowed view over the value block of a sparse run.
#[derive(Debug, Clone, Copy)]
pub struct SparseValues<'a> {
    bytes: &'a [u8],
}

impl<'a> SparseValues<'a> {
    pub fn len(&self) -> usize {
        self.bytes.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + 'a {
        self.bytes
            .chunks_exact(2)
            .map(|chunk| LittleEndian::read_u16(chunk))
    }
}

/// Cursor over an encoded patch stream.
pub struct PatchReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PatchReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        PatchReader { data, pos: 0 }
    }

    /// Next run, or `None` once the input is cleanly exhausted. A dangling
    /// byte or a run promising more values than remain is an error.
    pub fn next_run(&mut self) -> Result<Option<PatchRun<'a>>> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            return Ok(None);
        }
        ensure!(
            remaining >= 2,
            "patch stream ends with a dangling byte at offset {}",
            self.pos
        );

        let count = LittleEndian::read_u16(&self.data[self.pos..self.pos + 2]);
        self.pos += 2;

        if count & SPARSE_RUN_FLAG != 0 {
            let len = (count & 0x7FFF) as usize;
            let byte_len = len * 2;
            ensure!(
                self.pos + byte_len <= self.data.len(),
                "sparse run of {len} values truncated at offset {}",
                self.pos
            );
            let bytes = &self.data[self.pos..self.pos + byte_len];
            self.pos += byte_len;
            Ok(Some(PatchRun::Sparse(SparseValues { bytes })))
        } else {
            ensure!(
                self.pos + 2 <= self.data.len(),
                "fill run missing its value at offset {}",
                self.pos
            );
            let value = LittleEndian::read_u16(&self.data[self.pos..self.pos + 2]);
            self.pos += 2;
            Ok(Some(PatchRun::Fill {
                len: count as usize,
                value,
            }))
        }
    }
}

/// Builds an encoded patch stream run by run.
#[derive(Debug, Default)]
pub struct PatchWriter {
    buf: Vec<u8>,
}

impl PatchWriter {
    pub fn new() -> Self {
        PatchWriter::default()
    }

    /// Fill `len` positions with `value`. A zero value encodes a skip.
    pub fn fill(&mut self, len: usize, value: u16) -> &mut Self {
        assert!(len <= MAX_RUN_LEN, "fill run of {len} exceeds {MAX_RUN_LEN}");
        self.push_u16(len as u16);
        self.push_u16(value);
        self
    }

    /// Advance the destination cursor without writing.
    pub fn skip(&mut self, len: usize) -> &mut Self {
        self.fill(len, 0)
    }

    /// Per-position overwrite run; zeros preserve the destination.
    pub fn sparse(&mut self, values: &[u16]) -> &mut Self {
        assert!(
            values.len() <= MAX_RUN_LEN,
            "sparse run of {} values exceeds {MAX_RUN_LEN}",
            values.len()
        );
        self.push_u16(SPARSE_RUN_FLAG | values.len() as u16);
        for &value in values {
            self.push_u16(value);
        }
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn push_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_written_runs() {
        let mut writer = PatchWriter::new();
        writer.fill(5, 0x00AA).skip(3).sparse(&[1, 0, 2]);
        let bytes = writer.into_bytes();

        let mut reader = PatchReader::new(&bytes);
        match reader.next_run().unwrap() {
            Some(PatchRun::Fill { len, value }) => {
                assert_eq!(len, 5);
                assert_eq!(value, 0x00AA);
            }
            other => panic!("expected fill run, got {other:?}"),
        }
        match reader.next_run().unwrap() {
            Some(PatchRun::Fill { len, value }) => {
                assert_eq!(len, 3);
                assert_eq!(value, 0);
            }
            other => panic!("expected skip run, got {other:?}"),
        }
        match reader.next_run().unwrap() {
            Some(PatchRun::Sparse(values)) => {
                assert_eq!(values.len(), 3);
                assert_eq!(values.iter().collect::<Vec<_>>(), vec![1, 0, 2]);
            }
            other => panic!("expected sparse run, got {other:?}"),
        }
        assert!(reader.next_run().unwrap().is_none());
    }

    #[test]
    fn empty_stream_yields_no_runs() {
        let mut reader = PatchReader::new(&[]);
        assert!(reader.next_run().unwrap().is_none());
    }

    #[test]
    fn dangling_byte_is_an_error() {
        let mut reader = PatchReader::new(&[0x01]);
        assert!(reader.next_run().is_err());
    }

    #[test]
    fn truncated_sparse_run_is_an_error() {
        // Sparse run promising 4 values but carrying only 1.
        let mut writer = PatchWriter::new();
        writer.sparse(&[7]);
        let mut bytes = writer.into_bytes();
        bytes[0] = 0x04; // keep the high bit via byte 1
        bytes[1] = 0x80;
        let mut reader = PatchReader::new(&bytes);
        assert!(reader.next_run().is_err());
    }

    #[test]
    fn fill_run_missing_value_is_an_error() {
        let mut reader = PatchReader::new(&[0x10, 0x00]);
        assert!(reader.next_run().is_err());
    }
}
