//! Record-framed byte stream reading: sync detection, resynchronization after corruption, and
//! length-prefixed payload extraction.
//!
//! The whole input is read into memory once and then sliced by a running offset, the same way
//! [`crate::byte_codec`]'s `get_*`/`put_*` helpers operate on `(slice, offset)` rather than a
//! live `Read`. Survey files this engine targets are bounded, so this trades streaming-arbitrary-length input for a framer simple enough
//! to get resync and offset bookkeeping right. Each format module supplies its own notion of
//! "label" (a 2-byte type code, an 8-byte ASCII tag, ...) via a closure; the framer only knows
//! how to slide forward a byte at a time until that closure is satisfied.

use std::io::Read;

use crate::error::{Error, Result};

/// Wraps a fully-buffered byte source with sync/resync and cursor bookkeeping.
pub struct Framer {
    data: Vec<u8>,
    offset: usize,
    resync_limit: u64,
}

impl Framer {
    /// Wraps an already-in-memory buffer.
    pub fn new(data: Vec<u8>, resync_limit: u64) -> Self {
        Framer {
            data,
            offset: 0,
            resync_limit,
        }
    }

    /// Reads `reader` to completion and wraps the result.
    pub fn from_reader<R: Read>(mut reader: R, resync_limit: u64) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Framer::new(data, resync_limit))
    }

    /// Current byte offset from the start of the stream.
    pub fn offset(&self) -> u64 {
        self.offset as u64
    }

    /// True if every byte has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    /// Looks at the next `len` bytes without consuming them.
    pub fn peek(&self, len: usize) -> Result<&[u8]> {
        if self.offset >= self.data.len() {
            return Err(Error::EndOfInput);
        }
        let end = self.offset.checked_add(len).ok_or(Error::UnexpectedEof {
            offset: self.offset as u64,
        })?;
        if end > self.data.len() {
            return Err(Error::UnexpectedEof {
                offset: self.offset as u64,
            });
        }
        Ok(&self.data[self.offset..end])
    }

    /// Consumes and returns the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&[u8]> {
        let slice = self.peek(len)?;
        let end = self.offset + len;
        self.offset = end;
        Ok(&self.data[end - len..end])
    }

    /// Consumes `len` bytes without returning them (used to skip a declared-but-unparsed tail).
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Validates a `label_width`-byte label at the current offset against `is_known`. If it
    /// does not validate, slides forward one byte at a time in resync mode until a
    /// valid label is found, `resync_limit` bytes have been scanned, or the input ends.
    ///
    /// Returns the number of bytes skipped to reach a valid label (`0` if none were needed).
    /// The caller is expected to turn a non-zero count into a `DataSkipped` warning and a
    /// `debug!`/`warn!` log line; this function only does the scanning.
    pub fn sync_to_label(
        &mut self,
        label_width: usize,
        is_known: impl Fn(&[u8]) -> bool,
    ) -> Result<u64> {
        let start = self.offset;
        loop {
            if self.offset >= self.data.len() {
                return Err(Error::EndOfInput);
            }
            if self.offset + label_width > self.data.len() {
                return Err(Error::UnexpectedEof {
                    offset: self.offset as u64,
                });
            }
            let window = &self.data[self.offset..self.offset + label_width];
            if is_known(window) {
                return Ok((self.offset - start) as u64);
            }
            let scanned = (self.offset - start) as u64;
            if scanned >= self.resync_limit {
                return Err(Error::BadSync {
                    offset: start as u64,
                    scanned,
                });
            }
            self.offset += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: &[[u8; 2]] = &[[0xAB, 0xCD], [0x12, 0x34]];

    fn known(bytes: &[u8]) -> bool {
        LABELS.iter().any(|l| l == bytes)
    }

    #[test]
    fn no_resync_needed_when_label_is_immediately_valid() {
        let mut framer = Framer::new(vec![0xAB, 0xCD, 0xFF], 1024);
        let skipped = framer.sync_to_label(2, known).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(framer.offset(), 0);
    }

    #[test]
    fn resync_skips_garbage_and_lands_on_label() {
        let mut garbage = vec![0x00u8; 137];
        garbage.extend_from_slice(&[0x12, 0x34]);
        let mut framer = Framer::new(garbage, 1024);
        let skipped = framer.sync_to_label(2, known).unwrap();
        assert_eq!(skipped, 137);
        assert_eq!(framer.offset(), 137);
        assert_eq!(framer.peek(2).unwrap(), &[0x12, 0x34]);
    }

    #[test]
    fn resync_gives_up_past_the_limit() {
        let garbage = vec![0x00u8; 20];
        let mut framer = Framer::new(garbage, 10);
        let err = framer.sync_to_label(2, known).unwrap_err();
        assert!(matches!(err, Error::BadSync { scanned: 10, .. }));
    }

    #[test]
    fn take_advances_offset_and_detects_truncation() {
        let mut framer = Framer::new(vec![1, 2, 3, 4], 1024);
        assert_eq!(framer.take(2).unwrap(), &[1, 2]);
        assert_eq!(framer.offset(), 2);
        assert!(framer.take(10).is_err());
    }

    #[test]
    fn end_of_input_when_exhausted() {
        let mut framer = Framer::new(vec![0xAB, 0xCD], 1024);
        framer.take(2).unwrap();
        assert!(matches!(
            framer.sync_to_label(2, known),
            Err(Error::EndOfInput)
        ));
    }
}
