//! WASSP-class tagged little-endian binary codec, grounded in `mbr_wasspenl.c`'s
//! `GENBATHY` record layout.

use std::collections::VecDeque;

use crate::byte_codec::{self, Endian};
use crate::error::{Error, Result};
use crate::formats::{FormatInfo, FormatInfoBuilder, RecordCodec};
use crate::framer::Framer;
use crate::ping::SonarKind;
use crate::record::{
    AttitudeRecord, BathymetryRecord, HeadingRecord, NavigationRecord, Record, RecordKind,
    RawLineRecord, WaterColumnRecord, Timestamp,
};
use crate::session::SessionState;

/// Fixed record sync marker, little-endian. Not present in the filtered original source
/// (the header defining it was excluded from the retrieval pack); chosen to be recognizable and
/// documented as a stand-in in the grounding ledger.
const SYNC: u32 = 0x77AA_0011;
/// The original always emits this literal value rather than a computed checksum; this port preserves that quirk on write and never treats a mismatch as fatal on read.
const CHECKSUM_PLACEHOLDER: u32 = 0x8806_CBA5;

const GENBATHY: &[u8; 8] = b"GENBATHY";
const CORBATHY: &[u8; 8] = b"CORBATHY";
const RAWSONAR: &[u8; 8] = b"RAWSONAR";
const NVUPDATE: &[u8; 8] = b"NVUPDATE";
const MCOMMENT: &[u8; 8] = b"MCOMMENT";
const TAG_LEN: usize = 8;

/// Every tag `mbr_wasspenl.c` dispatches on, whether or not this codec decodes its body into a
/// structured [`Record`]. A tag outside this list is genuinely unrecognized, not just
/// unimplemented, and is preserved as [`Record::RawLine`] the same as any implemented-but-absent
/// tag would be — the distinction matters only for test coverage, not wire behavior.
const KNOWN_TAGS: &[&[u8; 8]] = &[
    GENBATHY, CORBATHY, RAWSONAR, b"GEN_SENS", NVUPDATE, b"WCD_NAVI", MCOMMENT,
];

/// Header width: `sync(4) + size(4) + tag(8)`.
const HEADER_LEN: usize = 16;

/// Builds this format's capability declaration.
pub fn format_info() -> FormatInfo {
    FormatInfoBuilder::new("wassp")
        .max_beams(512)
        .max_amplitude_beams(512)
        .beams_variable(true)
        .carries_travel_time(false)
        .default_beamwidths(1.5, 1.5)
        .sonar_kind(SonarKind::Single)
        .authoritative_nav(RecordKind::Navigation1)
        .authoritative_attitude(RecordKind::Attitude)
        .authoritative_heading(RecordKind::Heading)
        .authoritative_depth(RecordKind::Height)
        .authoritative_svp(RecordKind::SoundSpeedProfile)
        .authoritative_platform(RecordKind::Installation)
        .quality_threshold(2)
        .build()
}

/// The WASSP-class `RecordCodec` implementation. Always little-endian; unlike SIMRAD-class there
/// is no sonar-model field to negotiate byte order from.
///
/// `NVUPDATE` bundles navigation, attitude, and heading into one wire record, but `Record` has no
/// combined variant for that — `decode_next` returns the first and stashes the rest in `pending`
/// for the next call, the same queue-and-drain shape `PingReader` uses for its own multi-event
/// reads.
#[derive(Debug, Default)]
pub struct WasspCodec {
    pending: VecDeque<Record>,
}

fn is_sync_window(window: &[u8]) -> bool {
    window.len() >= 4 && u32::from_le_bytes([window[0], window[1], window[2], window[3]]) == SYNC
}

fn epoch(year: u16, month: u8, day: u8, msec: f64) -> Timestamp {
    let date = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
    let midnight = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
    midnight + chrono::Duration::milliseconds(msec as i64)
}

fn to_epoch_parts(time: Timestamp) -> (u16, u8, u8, f64) {
    use chrono::Datelike;
    let midnight = time.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    let msec = (time - midnight).num_milliseconds() as f64;
    (time.year() as u16, time.month() as u8, time.day() as u8, msec)
}

impl RecordCodec for WasspCodec {
    fn decode_next(&mut self, framer: &mut Framer, session: &mut SessionState) -> Result<Record> {
        if let Some(queued) = self.pending.pop_front() {
            return Ok(queued);
        }

        let skipped = framer.sync_to_label(4, is_sync_window)?;
        if skipped > 0 {
            log::warn!("wassp: skipped {skipped} bytes of unrecognized data before resync");
        }

        let header = framer.peek(HEADER_LEN)?;
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&header[8..16]);
        framer.take(HEADER_LEN)?;

        let body_len = size.checked_sub(HEADER_LEN).ok_or(Error::Malformed {
            offset: framer.offset(),
            reason: "record size smaller than header".to_string(),
        })?;
        let body = framer.take(body_len)?.to_vec();
        let record_start = framer.offset();

        if &tag == GENBATHY {
            let record = decode_genbathy(&body, record_start)?;
            session.last_time = Some(record.time);
            Ok(Record::Bathymetry(record))
        } else if &tag == NVUPDATE {
            let mut records = decode_nvupdate(&body, session, record_start)?.into_iter();
            let first = records.next().expect("decode_nvupdate always yields three records");
            self.pending.extend(records);
            Ok(first)
        } else if &tag == MCOMMENT {
            decode_mcomment(&body, session, record_start)
        } else if &tag == RAWSONAR {
            decode_rawsonar(&body, session, record_start).map(Record::WaterColumn)
        } else {
            // CORBATHY is a real, known tag (confirmed in the original driver's dispatch table)
            // but its per-beam payload is georeferenced x/y/z, structurally incompatible with
            // BathymetryRecord's range/angle model; it, GEN_SENS, and WCD_NAVI pass through
            // losslessly rather than force a shape they don't have.
            Ok(Record::RawLine(RawLineRecord {
                tag: Some(String::from_utf8_lossy(&tag).trim_end().to_string()),
                bytes: {
                    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
                    bytes.extend_from_slice(&SYNC.to_le_bytes());
                    bytes.extend_from_slice(&(size as u32).to_le_bytes());
                    bytes.extend_from_slice(&tag);
                    bytes.extend_from_slice(&body);
                    bytes
                },
            }))
        }
    }

    fn encode(&self, record: &Record, out: &mut Vec<u8>, _session: &mut SessionState) -> Result<()> {
        match record {
            Record::Bathymetry(b) => {
                let body = encode_genbathy(b);
                out.extend_from_slice(&SYNC.to_le_bytes());
                out.extend_from_slice(&((HEADER_LEN + body.len()) as u32).to_le_bytes());
                out.extend_from_slice(GENBATHY);
                out.extend_from_slice(&body);
                Ok(())
            }
            Record::Comment(_, text) => {
                let body = encode_mcomment(text);
                out.extend_from_slice(&SYNC.to_le_bytes());
                out.extend_from_slice(&((HEADER_LEN + body.len()) as u32).to_le_bytes());
                out.extend_from_slice(MCOMMENT);
                out.extend_from_slice(&body);
                Ok(())
            }
            Record::RawLine(r) => {
                out.extend_from_slice(&r.bytes);
                Ok(())
            }
            other => Err(Error::BadKind { kind: other.kind() }),
        }
    }
}

/// Per-beam body width: `detection_point(f32) + rx_angle(f32) + flags(u32) + backscatter(f32)`.
const BEAM_WIDTH: usize = 16;
/// Fixed header fields before the per-beam arrays, up to and including `sound_velocity`, per
/// `mbr_wasspenl_rd_genbathy`: `version(4) msec(8) day(1) month(1) year(2) ping_number(4)
/// sonar_model(4) transducer_serial(8) number_beams(4) modeflags(4) sampling_frequency(4)
/// acoustic_frequency(4) tx_power(4) pulse_width(4) absorption_loss(4) spreading_loss(4)
/// sample_type(4) sound_velocity(4)`.
const FIXED_BODY_LEN: usize = 4 + 8 + 1 + 1 + 2 + 4 + 4 + 8 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 4;

fn decode_genbathy(body: &[u8], record_start: u64) -> Result<BathymetryRecord> {
    if body.len() < FIXED_BODY_LEN + 4 {
        return Err(Error::Malformed {
            offset: record_start,
            reason: "GENBATHY body shorter than fixed header".to_string(),
        });
    }
    let mut o = 0usize;
    let _version = byte_codec::get_u32(body, o, Endian::Little)?;
    o += 4;
    let msec = byte_codec::get_f64(body, o, Endian::Little)?;
    o += 8;
    let day = byte_codec::get_u8(body, o)?;
    o += 1;
    let month = byte_codec::get_u8(body, o)?;
    o += 1;
    let year = byte_codec::get_u16(body, o, Endian::Little)?;
    o += 2;
    let ping_number = byte_codec::get_u32(body, o, Endian::Little)?;
    o += 4;
    let _sonar_model = byte_codec::get_u32(body, o, Endian::Little)?;
    o += 4;
    let transducer_serial = byte_codec::get_u64(body, o, Endian::Little)?;
    o += 8;
    let number_beams = byte_codec::get_u32(body, o, Endian::Little)? as usize;
    o += 4;
    let _modeflags = byte_codec::get_u32(body, o, Endian::Little)?;
    o += 4;
    let sampling_frequency = byte_codec::get_f32(body, o, Endian::Little)?;
    o += 4;
    let _acoustic_frequency = byte_codec::get_f32(body, o, Endian::Little)?;
    o += 4;
    let _tx_power = byte_codec::get_f32(body, o, Endian::Little)?;
    o += 4;
    let _pulse_width = byte_codec::get_f32(body, o, Endian::Little)?;
    o += 4;
    let _absorption_loss = byte_codec::get_f32(body, o, Endian::Little)?;
    o += 4;
    let _spreading_loss = byte_codec::get_f32(body, o, Endian::Little)?;
    o += 4;
    let _sample_type = byte_codec::get_u32(body, o, Endian::Little)?;
    o += 4;
    let sound_velocity = byte_codec::get_f32(body, o, Endian::Little)?;
    o += 4;

    let needed = o + number_beams * BEAM_WIDTH + 4;
    if body.len() < needed {
        return Err(Error::Malformed {
            offset: record_start,
            reason: format!("GENBATHY body too short for {number_beams} beams"),
        });
    }

    let mut range = Vec::with_capacity(number_beams);
    let mut depression = Vec::with_capacity(number_beams);
    let mut flags = Vec::with_capacity(number_beams);
    let mut amplitude = Vec::with_capacity(number_beams);
    for i in 0..number_beams {
        let base = o + i * BEAM_WIDTH;
        range.push(byte_codec::get_f32(body, base, Endian::Little)? as f64);
        depression.push(byte_codec::get_f32(body, base + 4, Endian::Little)? as f64);
        let flag = byte_codec::get_u32(body, base + 8, Endian::Little)?;
        flags.push(if flag == 0 { 2u8 } else { 0u8 });
        let backscatter = byte_codec::get_f32(body, base + 12, Endian::Little)?;
        amplitude.push(backscatter as i16);
    }
    o += number_beams * BEAM_WIDTH;
    let checksum = byte_codec::get_u32(body, o, Endian::Little)?;
    if checksum != CHECKSUM_PLACEHOLDER {
        log::warn!(
            "wassp: GENBATHY checksum {checksum:#x} does not match the placeholder value; continuing"
        );
    }

    Ok(BathymetryRecord {
        time: epoch(year, month, day, msec),
        ping_number,
        serial: (transducer_serial & 0xffff) as u16,
        heading: 0.0,
        ssv: sound_velocity as f64,
        xducer_depth: 0.0,
        beams_max: number_beams as u16,
        sample_rate: sampling_frequency as f64,
        depth: vec![0.0; number_beams],
        across: vec![0.0; number_beams],
        along: vec![0.0; number_beams],
        depression,
        azimuth: vec![0.0; number_beams],
        range,
        quality: flags,
        window: vec![0; number_beams],
        amplitude,
        beam_num: (0..number_beams as u32).map(|n| n as u8).collect(),
    })
}

fn encode_genbathy(record: &BathymetryRecord) -> Vec<u8> {
    let beams = record.beam_count();
    let mut out = vec![0u8; FIXED_BODY_LEN + beams * BEAM_WIDTH + 4];
    let order = Endian::Little;
    let mut o = 0usize;
    byte_codec::put_u32(&mut out, o, 1, order);
    o += 4;
    let (year, month, day, msec) = to_epoch_parts(record.time);
    byte_codec::put_f64(&mut out, o, msec, order);
    o += 8;
    byte_codec::put_u8(&mut out, o, day);
    o += 1;
    byte_codec::put_u8(&mut out, o, month);
    o += 1;
    byte_codec::put_u16(&mut out, o, year, order);
    o += 2;
    byte_codec::put_u32(&mut out, o, record.ping_number, order);
    o += 4;
    byte_codec::put_u32(&mut out, o, 0, order);
    o += 4;
    byte_codec::put_u64(&mut out, o, record.serial as u64, order);
    o += 8;
    byte_codec::put_u32(&mut out, o, beams as u32, order);
    o += 4;
    byte_codec::put_u32(&mut out, o, 0, order);
    o += 4;
    byte_codec::put_f32(&mut out, o, record.sample_rate as f32, order);
    o += 4;
    byte_codec::put_f32(&mut out, o, 0.0, order);
    o += 4;
    byte_codec::put_f32(&mut out, o, 0.0, order);
    o += 4;
    byte_codec::put_f32(&mut out, o, 0.0, order);
    o += 4;
    byte_codec::put_f32(&mut out, o, 0.0, order);
    o += 4;
    byte_codec::put_f32(&mut out, o, 0.0, order);
    o += 4;
    byte_codec::put_u32(&mut out, o, 0, order);
    o += 4;
    byte_codec::put_f32(&mut out, o, record.ssv as f32, order);
    o += 4;

    for i in 0..beams {
        let base = o + i * BEAM_WIDTH;
        byte_codec::put_f32(&mut out, base, record.range.get(i).copied().unwrap_or(0.0) as f32, order);
        byte_codec::put_f32(
            &mut out,
            base + 4,
            record.depression.get(i).copied().unwrap_or(0.0) as f32,
            order,
        );
        let flagged = record.quality.get(i).copied().unwrap_or(0) == 2;
        byte_codec::put_u32(&mut out, base + 8, if flagged { 0 } else { 1 }, order);
        byte_codec::put_f32(
            &mut out,
            base + 12,
            record.amplitude.get(i).copied().unwrap_or(0) as f32,
            order,
        );
    }
    o += beams * BEAM_WIDTH;
    byte_codec::put_u32(&mut out, o, CHECKSUM_PLACEHOLDER, order);

    out
}

/// `NVUPDATE` body width per `mbr_wasspenl_rd_nvupdate`: `version(4) latitude(8) longitude(8)
/// sog(4) cog(4) heading(4) roll(4) pitch(4) heave(4) nadir_depth(4) checksum(4)`. Carries no
/// timestamp of its own.
const NVUPDATE_BODY_LEN: usize = 4 + 8 + 8 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 4;

/// Decodes an `NVUPDATE` body into the three sensor samples it bundles: navigation, attitude,
/// and heading, all stamped with `session.last_time` since the wire record has no timestamp of
/// its own.
fn decode_nvupdate(
    body: &[u8],
    session: &SessionState,
    record_start: u64,
) -> Result<[Record; 3]> {
    if body.len() < NVUPDATE_BODY_LEN {
        return Err(Error::Malformed {
            offset: record_start,
            reason: "NVUPDATE body shorter than expected".to_string(),
        });
    }
    let order = Endian::Little;
    let _version = byte_codec::get_u32(body, 0, order)?;
    let latitude = byte_codec::get_f64(body, 4, order)?;
    let longitude = byte_codec::get_f64(body, 12, order)?;
    let sog = byte_codec::get_f32(body, 20, order)? as f64;
    let _cog = byte_codec::get_f32(body, 24, order)?;
    let heading = byte_codec::get_f32(body, 28, order)? as f64;
    let roll = byte_codec::get_f32(body, 32, order)? as f64;
    let pitch = byte_codec::get_f32(body, 36, order)? as f64;
    let heave = byte_codec::get_f32(body, 40, order)? as f64;
    let _nadir_depth = byte_codec::get_f32(body, 44, order)?;
    let checksum = byte_codec::get_u32(body, 48, order)?;
    if checksum != CHECKSUM_PLACEHOLDER {
        log::warn!(
            "wassp: NVUPDATE checksum {checksum:#x} does not match the placeholder value; continuing"
        );
    }

    let time = fallback_time(session);
    Ok([
        Record::Navigation1(NavigationRecord {
            time,
            longitude,
            latitude,
            speed: Some(sog),
        }),
        Record::Attitude(AttitudeRecord { time, roll, pitch, heave }),
        Record::Heading(HeadingRecord { time, heading }),
    ])
}

/// Decodes an `MCOMMENT` body: a length-prefixed message, per `mbr_wasspenl_rd_mcomment`.
/// Carries no timestamp of its own.
fn decode_mcomment(body: &[u8], session: &SessionState, record_start: u64) -> Result<Record> {
    let len = byte_codec::get_u32(body, 0, Endian::Little)? as usize;
    let end = 4usize.checked_add(len).ok_or(Error::Malformed {
        offset: record_start,
        reason: "MCOMMENT message length overflow".to_string(),
    })?;
    if body.len() < end {
        return Err(Error::Malformed {
            offset: record_start,
            reason: "MCOMMENT body shorter than declared message length".to_string(),
        });
    }
    let message = String::from_utf8_lossy(&body[4..end])
        .trim_end_matches('\0')
        .to_string();
    Ok(Record::Comment(fallback_time(session), message))
}

fn encode_mcomment(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + text.len());
    out.extend_from_slice(&(text.len() as u32).to_le_bytes());
    out.extend_from_slice(text.as_bytes());
    out
}

/// Fixed `RAWSONAR` header width up to (and including) `sample_type`, per
/// `mbr_wasspenl_rd_rawsonar`: `version(4) msec(8) ping_number(4) sample_rate(4) n(4) m(4)
/// tx_power(4) pulse_width(4) sample_type(4)`. The per-beam/per-sample arrays and the raw data
/// matrix that follow are stored verbatim in `payload` rather than decoded, matching the
/// original driver's own `MB_DATA_WATER_COLUMN` classification for this tag.
const RAWSONAR_HEADER_LEN: usize = 4 + 8 + 4 + 4 + 4 + 4 + 4 + 4 + 4;

fn decode_rawsonar(
    body: &[u8],
    session: &SessionState,
    record_start: u64,
) -> Result<WaterColumnRecord> {
    if body.len() < RAWSONAR_HEADER_LEN + 4 {
        return Err(Error::Malformed {
            offset: record_start,
            reason: "RAWSONAR body shorter than fixed header".to_string(),
        });
    }
    let order = Endian::Little;
    let _version = byte_codec::get_u32(body, 0, order)?;
    let msec = byte_codec::get_f64(body, 4, order)?;
    let ping_number = byte_codec::get_u32(body, 12, order)?;

    let payload_end = body.len() - 4;
    let payload = body[RAWSONAR_HEADER_LEN..payload_end].to_vec();

    Ok(WaterColumnRecord {
        time: time_from_msec(session, msec),
        ping_number,
        payload,
    })
}

/// `NVUPDATE`/`MCOMMENT` carry no timestamp at all; stamp them with the last fully-timestamped
/// record this session has seen, or the Unix epoch if none has arrived yet.
fn fallback_time(session: &SessionState) -> Timestamp {
    session
        .last_time
        .unwrap_or_else(|| epoch(1970, 1, 1, 0.0))
}

/// `RAWSONAR` carries a relative `msec` but no calendar date; combines it with the date of the
/// last fully-timestamped record this session has seen (midnight UTC if none has arrived yet).
fn time_from_msec(session: &SessionState, msec: f64) -> Timestamp {
    let reference = fallback_time(session);
    let midnight = reference
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    midnight + chrono::Duration::milliseconds(msec as i64)
}
