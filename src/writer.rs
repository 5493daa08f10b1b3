//! The generic ping write path: the mirror image of
//! [`crate::reader::PingReader`], encoding already-built [`Record`]s through a format's
//! [`RecordCodec`].
//!
//! Unlike reading, writing never needs an assembler or sensor interpolators: the caller hands
//! over one already-complete `Record` at a time (a `Bathymetry` sub-record per head, a
//! `Sidescan`, ancillary sensor samples, ...) and this module's job is only to track session
//! state (byte order, continuation bookkeeping) across the sequence of `encode` calls.

use crate::error::Result;
use crate::formats::{FormatHandle, RecordCodec};
use crate::record::Record;
use crate::session::SessionState;

/// Encodes a sequence of [`Record`]s for one registered format into a byte sink.
///
/// Ping-level concerns (pairing a `Ping`'s heads and sidescan back into sub-records) are the
/// caller's job — see [`crate::ping::Ping`] and its constituent records; this writer only knows
/// how to turn one [`Record`] into wire bytes at a time.
pub struct PingWriter<C: RecordCodec> {
    codec: C,
    format: FormatHandle,
    session: SessionState,
    out: Vec<u8>,
}

impl<C: RecordCodec> PingWriter<C> {
    /// Starts a writer for `format`, with an empty output buffer.
    pub fn new(codec: C, format: FormatHandle) -> Self {
        PingWriter {
            codec,
            format,
            session: SessionState::new(),
            out: Vec::new(),
        }
    }

    /// The format this writer was constructed for.
    pub fn format(&self) -> &FormatHandle {
        &self.format
    }

    /// Encodes one record onto the end of the internal buffer.
    ///
    /// Returns `Error::BadKind` if this format's codec does not support writing `record`'s kind.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        self.codec.encode(record, &mut self.out, &mut self.session)
    }

    /// Writes every sub-record that makes up one assembled ping: each head's `Bathymetry`
    /// followed, if present, by a `Sidescan`.
    ///
    /// This is a convenience built on [`write_record`](Self::write_record); formats that split a
    /// head across multiple wire sub-records (raw beams, continuation lines) are not modeled here
    /// since none of this crate's format modules require it on the write side.
    pub fn write_ping(&mut self, ping: &crate::ping::Ping) -> Result<()> {
        for half in &ping.halves {
            self.write_record(&Record::Bathymetry(crate::record::BathymetryRecord {
                time: ping.time,
                ping_number: ping.ping_number,
                serial: half.serial,
                heading: ping.heading,
                ssv: 0.0,
                xducer_depth: ping.draft,
                beams_max: half.beam_count() as u16,
                sample_rate: 0.0,
                depth: half.depth.clone(),
                across: half.across.clone(),
                along: half.along.clone(),
                depression: half.take_off_angle.clone(),
                azimuth: half.azimuthal_angle.clone(),
                range: half.range.clone(),
                quality: half.quality.clone(),
                window: vec![0; half.beam_count()],
                amplitude: half.amplitude.clone(),
                beam_num: (0..half.beam_count() as u32).map(|n| n as u8).collect(),
            }))?;
        }
        if ping.pixel_count > 0 {
            self.write_record(&Record::Sidescan(crate::record::SidescanRecord {
                time: ping.time,
                ping_number: ping.ping_number,
                port: ping.port.clone(),
                starboard: ping.starboard.clone(),
                sample_rate: ping.sample_rate,
            }))?;
        }
        Ok(())
    }

    /// Returns the bytes written so far, without consuming the writer.
    pub fn bytes(&self) -> &[u8] {
        &self.out
    }

    /// Consumes the writer, returning the fully encoded byte buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::register_format;
    use crate::formats::simrad::{self, SimradCodec};
    use crate::framer::Framer;
    use crate::record::ParameterBlock;
    use chrono::{TimeZone, Utc};

    fn t(secs: i64) -> crate::record::Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn writes_and_reads_back_a_start_record() {
        let handle = register_format(simrad::format_info());
        let mut writer = PingWriter::new(SimradCodec, handle);
        writer
            .write_record(&Record::Start(ParameterBlock::default()))
            .unwrap();
        writer
            .write_record(&Record::Comment(t(0), "hello".to_string()))
            .unwrap();

        let bytes = writer.into_bytes();
        let mut framer = Framer::new(bytes, 1 << 20);
        let mut codec = SimradCodec;
        let mut session = SessionState::new();
        let first = codec.decode_next(&mut framer, &mut session).unwrap();
        assert_eq!(first, Record::Start(ParameterBlock::default()));
        let second = codec.decode_next(&mut framer, &mut session).unwrap();
        assert_eq!(second, Record::Comment(t(0), "hello".to_string()));
    }

    #[test]
    fn unsupported_record_kind_is_bad_kind() {
        let handle = register_format(simrad::format_info());
        let mut writer = PingWriter::new(SimradCodec, handle);
        let err = writer
            .write_record(&Record::Attitude(crate::record::AttitudeRecord {
                time: t(0),
                roll: 0.0,
                pitch: 0.0,
                heave: 0.0,
            }))
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::BadKind { .. }));
    }
}
