//! Crate-wide error taxonomy.

use thiserror::Error;

/// Errors produced while decoding, encoding, or assembling sonar records.
#[derive(Debug, Error)]
pub enum Error {
    /// Clean end of input at a record boundary. Not a failure; callers see this as the end of
    /// iteration rather than a propagated error.
    #[error("end of input")]
    EndOfInput,

    /// The byte source ran out of data in the middle of a record.
    #[error("unexpected end of input at byte offset {offset}")]
    UnexpectedEof {
        /// Byte offset, relative to the start of the session, where truncation was detected.
        offset: u64,
    },

    /// A field failed validation (size, range, monotonicity, ...).
    #[error("malformed field at byte offset {offset}: {reason}")]
    Malformed {
        /// Byte offset of the record containing the bad field.
        offset: u64,
        /// Human-readable description of what failed.
        reason: String,
    },

    /// No valid record label was found after scanning the resync limit.
    #[error("no valid record label found after {scanned} bytes of resync starting at offset {offset}")]
    BadSync {
        /// Byte offset where resync began.
        offset: u64,
        /// Number of bytes scanned before giving up.
        scanned: u64,
    },

    /// A record's checksum did not match. The record is still returned to the caller; this is
    /// surfaced so recoverable problems aren't silently swallowed.
    #[error("checksum mismatch in record at byte offset {offset}: expected {expected:#x}, computed {computed:#x}")]
    ChecksumError {
        /// Byte offset of the record.
        offset: u64,
        /// Checksum as read from the wire.
        expected: u64,
        /// Checksum computed over the payload.
        computed: u64,
    },

    /// Resynchronization skipped `count` bytes of garbage before locking onto a valid label.
    #[error("skipped {count} bytes of unrecognized data around offset {offset}")]
    DataSkipped {
        /// Number of bytes skipped.
        count: u64,
        /// Byte offset where the skipped span started.
        offset: u64,
    },

    /// Sub-records observed for one ping disagree in a way the assembler cannot reconcile
    /// (e.g. conflicting sonar kinds under one ping number). The partial ping is discarded.
    #[error("unintelligible ping {ping_number}: {reason}")]
    Unintelligible {
        /// The ping number whose sub-records disagreed.
        ping_number: u32,
        /// Description of the disagreement.
        reason: String,
    },

    /// The output sink rejected a write.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The caller asked to encode a record kind the target format module does not support.
    #[error("record kind {kind:?} is not supported for writing by this format")]
    BadKind {
        /// The unsupported record kind.
        kind: crate::record::RecordKind,
    },

    /// The underlying byte source was interrupted. State is preserved; the caller may retry.
    #[error("read was cancelled")]
    Cancelled,

    /// Wraps `std::io::Error` from the byte source/sink boundary.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An ASCII integer token could not be parsed.
    #[error("invalid ASCII integer token {token:?}")]
    ParseInt {
        /// The offending token.
        token: String,
    },

    /// An ASCII floating-point token could not be parsed.
    #[error("invalid ASCII floating point token {token:?}")]
    ParseFloat {
        /// The offending token.
        token: String,
    },

    /// A HYSWEEP-class line was not valid UTF-8.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

impl Error {
    /// True if this error corresponds to the clean end of the stream at a record boundary.
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, Error::EndOfInput)
    }

    /// True for errors that the framer surfaces as warnings and recovers from: the record (or
    /// the next one) is still delivered to the caller.
    pub fn is_recoverable_warning(&self) -> bool {
        matches!(self, Error::ChecksumError { .. } | Error::DataSkipped { .. })
    }
}

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;
