//! Endian-aware primitive reads and writes into byte slices, plus the sonar-model-based
//! byte-order negotiation used by the binary format modules.
//!
//! This mirrors the low-level `raw::Header::read_from`/`write_to` style of field-by-field
//! (de)serialization used throughout the teacher crate, except operating on in-memory slices
//! rather than a `Read`/`Write`, since the [`crate::framer::Framer`] already owns buffering.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

/// Byte order of a wire record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Least-significant byte first.
    Little,
    /// Most-significant byte first.
    Big,
}

impl Endian {
    /// Returns the other endianness.
    pub fn flip(self) -> Endian {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        }
    }
}

macro_rules! getter {
    ($name:ident, $ty:ty, $read_be:path, $read_le:path) => {
        /// Reads a value out of `bytes[offset..]`.
        pub fn $name(bytes: &[u8], offset: usize, order: Endian) -> Result<$ty> {
            let width = std::mem::size_of::<$ty>();
            let end = offset
                .checked_add(width)
                .ok_or_else(|| malformed(offset as u64, "offset overflow"))?;
            if end > bytes.len() {
                return Err(Error::UnexpectedEof {
                    offset: offset as u64,
                });
            }
            let slice = &bytes[offset..end];
            Ok(match order {
                Endian::Big => $read_be(slice),
                Endian::Little => $read_le(slice),
            })
        }
    };
}

macro_rules! putter {
    ($name:ident, $ty:ty, $write_be:path, $write_le:path) => {
        /// Writes a value into `bytes[offset..]`, which must already have room for it.
        pub fn $name(bytes: &mut [u8], offset: usize, value: $ty, order: Endian) {
            let width = std::mem::size_of::<$ty>();
            let slice = &mut bytes[offset..offset + width];
            match order {
                Endian::Big => $write_be(slice, value),
                Endian::Little => $write_le(slice, value),
            }
        }
    };
}

fn malformed(offset: u64, reason: &str) -> Error {
    Error::Malformed {
        offset,
        reason: reason.to_string(),
    }
}

getter!(get_u16, u16, BigEndian::read_u16, LittleEndian::read_u16);
getter!(get_i16, i16, BigEndian::read_i16, LittleEndian::read_i16);
getter!(get_u32, u32, BigEndian::read_u32, LittleEndian::read_u32);
getter!(get_i32, i32, BigEndian::read_i32, LittleEndian::read_i32);
getter!(get_u64, u64, BigEndian::read_u64, LittleEndian::read_u64);
getter!(get_f32, f32, BigEndian::read_f32, LittleEndian::read_f32);
getter!(get_f64, f64, BigEndian::read_f64, LittleEndian::read_f64);

putter!(put_u16, u16, BigEndian::write_u16, LittleEndian::write_u16);
putter!(put_i16, i16, BigEndian::write_i16, LittleEndian::write_i16);
putter!(put_u32, u32, BigEndian::write_u32, LittleEndian::write_u32);
putter!(put_i32, i32, BigEndian::write_i32, LittleEndian::write_i32);
putter!(put_u64, u64, BigEndian::write_u64, LittleEndian::write_u64);
putter!(put_f32, f32, BigEndian::write_f32, LittleEndian::write_f32);
putter!(put_f64, f64, BigEndian::write_f64, LittleEndian::write_f64);

/// Reads a single byte. Endian-independent, provided for symmetry with the other getters.
pub fn get_u8(bytes: &[u8], offset: usize) -> Result<u8> {
    bytes.get(offset).copied().ok_or(Error::UnexpectedEof {
        offset: offset as u64,
    })
}

/// Reads a single signed byte.
pub fn get_i8(bytes: &[u8], offset: usize) -> Result<i8> {
    get_u8(bytes, offset).map(|b| b as i8)
}

/// Writes a single byte.
pub fn put_u8(bytes: &mut [u8], offset: usize, value: u8) {
    bytes[offset] = value;
}

/// Writes a single signed byte.
pub fn put_i8(bytes: &mut [u8], offset: usize, value: i8) {
    bytes[offset] = value as u8;
}

/// Parses an ASCII integer token of exactly `len` bytes starting at `offset`.
///
/// Used by SIMRAD-class parameter blocks and HYSWEEP-class line tokens, both of which embed
/// plain-decimal ASCII numbers in an otherwise binary or line-oriented stream.
pub fn get_ascii_int(bytes: &[u8], offset: usize, len: usize) -> Result<i64> {
    let token = ascii_token(bytes, offset, len)?;
    token
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::ParseInt { token })
}

/// Parses an ASCII floating-point token (`C` locale: `.` decimal point) of exactly `len` bytes.
pub fn get_ascii_double(bytes: &[u8], offset: usize, len: usize) -> Result<f64> {
    let token = ascii_token(bytes, offset, len)?;
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::ParseFloat { token })
}

fn ascii_token(bytes: &[u8], offset: usize, len: usize) -> Result<String> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| malformed(offset as u64, "ascii token length overflow"))?;
    if end > bytes.len() {
        return Err(Error::UnexpectedEof {
            offset: offset as u64,
        });
    }
    std::str::from_utf8(&bytes[offset..end])
        .map(|s| s.to_string())
        .map_err(Error::from)
}

/// Resolves the byte order of a binary record stream from a 2-byte sonar model identifier.
///
/// Reads the identifier both as-is and byte-swapped; the interpretation whose value falls
/// within `known_models` wins. If both or neither interpretation is valid, falls back to
/// `sticky`, the session's previously-resolved byte order.
pub fn resolve_endian(raw: u16, known_models: &[u16], sticky: Option<Endian>) -> Option<Endian> {
    let as_is = raw;
    let swapped = raw.swap_bytes();
    let as_is_valid = known_models.contains(&as_is);
    let swapped_valid = known_models.contains(&swapped);
    match (as_is_valid, swapped_valid) {
        (true, false) => Some(Endian::Little),
        (false, true) => Some(Endian::Big),
        _ => sticky,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_u16() {
        let mut buf = [0u8; 2];
        put_u16(&mut buf, 0, 0x1234, Endian::Big);
        assert_eq!(get_u16(&buf, 0, Endian::Big).unwrap(), 0x1234);
        put_u16(&mut buf, 0, 0x1234, Endian::Little);
        assert_eq!(get_u16(&buf, 0, Endian::Little).unwrap(), 0x1234);
        assert_ne!(
            get_u16(&buf, 0, Endian::Big).unwrap(),
            get_u16(&buf, 0, Endian::Little).unwrap()
        );
    }

    #[test]
    fn roundtrip_f64() {
        let mut buf = [0u8; 8];
        put_f64(&mut buf, 0, 3.5, Endian::Little);
        assert_eq!(get_f64(&buf, 0, Endian::Little).unwrap(), 3.5);
    }

    #[test]
    fn truncated_read_is_unexpected_eof() {
        let buf = [0u8; 1];
        assert!(matches!(
            get_u16(&buf, 0, Endian::Big),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn ascii_int_parses_with_whitespace() {
        let buf = b"  42";
        assert_eq!(get_ascii_int(buf, 0, 4).unwrap(), 42);
    }

    #[test]
    fn ascii_double_uses_c_locale() {
        let buf = b"12.50";
        assert_eq!(get_ascii_double(buf, 0, 5).unwrap(), 12.5);
    }

    #[test]
    fn endian_negotiation_prefers_valid_interpretation() {
        let known = [3000u16, 710, 122];
        // 3000 as-is is valid, swapped (0xB80B -> 0x0BB8 = 3000 bytes swapped differently)
        let raw: u16 = 3000;
        assert_eq!(resolve_endian(raw, &known, None), Some(Endian::Little));
        let raw_swapped = raw.swap_bytes();
        assert_eq!(resolve_endian(raw_swapped, &known, None), Some(Endian::Big));
    }

    #[test]
    fn endian_negotiation_falls_back_to_sticky() {
        let known = [3000u16];
        let raw: u16 = 1; // neither interpretation (1 or 256) is a known model
        assert_eq!(resolve_endian(raw, &known, Some(Endian::Big)), Some(Endian::Big));
    }
}
