//! HYSWEEP-class ASCII line-oriented codec.
//!
//! Lines are `\n`-terminated (a trailing `\r` is tolerated on read, never written); the first
//! three characters are the record tag. Multi-array records span several consecutive lines, one
//! array per line, the way the source format lays out a bathymetry ping as a header line
//! followed by one line per per-beam array.

use crate::error::{Error, Result};
use crate::formats::{FormatInfo, FormatInfoBuilder, RecordCodec};
use crate::framer::Framer;
use crate::ping::SonarKind;
use crate::record::{
    AttitudeRecord, BathymetryRecord, HeadingRecord, HeightRecord, NavigationRecord, Record,
    RecordKind, SoundSpeedRecord, TideRecord, Timestamp, RawLineRecord,
};
use crate::session::SessionState;

const KNOWN_TAGS: &[&str] = &[
    "RMB", "RSS", "MSS", "HCP", "GYR", "POS", "DFT", "EC1", "TID", "COM", "DEV", "DV2", "OF2",
    "PRI", "MBI", "SSI", "HVF", "INF", "TND", "PRJ", "FTP", "VER", "HSP", "HSX", "EOH", "EOL",
];

const IMPLEMENTED_TAGS: &[&str] = &["RMB", "HCP", "GYR", "POS", "DFT", "EC1", "TID", "COM"];

/// Builds this format's capability declaration.
pub fn format_info() -> FormatInfo {
    FormatInfoBuilder::new("hysweep")
        .max_beams(254)
        .max_amplitude_beams(0)
        .beams_variable(true)
        .carries_travel_time(false)
        .default_beamwidths(1.0, 1.0)
        .sonar_kind(SonarKind::Single)
        .authoritative_nav(RecordKind::Navigation1)
        .authoritative_attitude(RecordKind::Attitude)
        .authoritative_heading(RecordKind::Heading)
        .authoritative_depth(RecordKind::Height)
        .authoritative_svp(RecordKind::SoundSpeedProfile)
        .authoritative_platform(RecordKind::Installation)
        .build()
}

/// The HYSWEEP-class `RecordCodec` implementation.
#[derive(Debug)]
pub struct HysweepCodec {
    resync_limit: u64,
}

impl Default for HysweepCodec {
    fn default() -> Self {
        HysweepCodec {
            resync_limit: 1 << 20,
        }
    }
}

fn epoch(date_days: i64, msec: i64) -> Timestamp {
    let base =
        chrono::DateTime::<chrono::Utc>::from_timestamp(date_days * 86400, 0).unwrap_or_default();
    base + chrono::Duration::milliseconds(msec)
}

fn to_epoch_parts(time: Timestamp) -> (i64, i64) {
    let midnight = time.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    (
        midnight.timestamp() / 86400,
        (time - midnight).num_milliseconds(),
    )
}

fn parse_f64(token: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|_| Error::ParseFloat { token: token.to_string() })
}

fn parse_i64(token: &str) -> Result<i64> {
    token
        .parse::<i64>()
        .map_err(|_| Error::ParseInt { token: token.to_string() })
}

fn parse_f64_list(line: &str) -> Result<Vec<f64>> {
    line.split_whitespace().map(parse_f64).collect()
}

fn read_line(framer: &mut Framer) -> Result<String> {
    let remaining = framer.remaining();
    if remaining.is_empty() {
        return Err(Error::EndOfInput);
    }
    let (content_len, total_len) = match remaining.iter().position(|b| *b == b'\n') {
        Some(pos) => (pos, pos + 1),
        None => (remaining.len(), remaining.len()),
    };
    let mut content = &remaining[..content_len];
    if content.last() == Some(&b'\r') {
        content = &content[..content.len() - 1];
    }
    let text = std::str::from_utf8(content)?.to_string();
    framer.skip(total_len)?;
    Ok(text)
}

fn write_line(out: &mut Vec<u8>, line: &str) {
    out.extend_from_slice(line.as_bytes());
    out.push(b'\n');
}

impl RecordCodec for HysweepCodec {
    fn decode_next(&mut self, framer: &mut Framer, session: &mut SessionState) -> Result<Record> {
        let mut skipped = 0u64;
        loop {
            if framer.is_at_end() {
                return Err(Error::EndOfInput);
            }
            let line_start = framer.offset();
            let line = read_line(framer)?;
            let tag = if line.len() >= 3 { &line[0..3] } else { "" };

            if !KNOWN_TAGS.contains(&tag) {
                skipped += framer.offset() - line_start;
                if skipped >= self.resync_limit {
                    return Err(Error::BadSync {
                        offset: line_start,
                        scanned: skipped,
                    });
                }
                continue;
            }

            if skipped > 0 {
                log::warn!("hysweep: skipped {skipped} bytes of unrecognized lines before offset {line_start}");
            }

            return self.decode_line(tag, &line, framer, session);
        }
    }

    fn encode(&self, record: &Record, out: &mut Vec<u8>, _session: &mut SessionState) -> Result<()> {
        match record {
            Record::Bathymetry(b) => encode_bathymetry(b, out),
            Record::Attitude(a) => {
                let (date, msec) = to_epoch_parts(a.time);
                write_line(out, &format!("HCP {date} {msec} {} {} {}", a.roll, a.pitch, a.heave));
                Ok(())
            }
            Record::Heading(h) => {
                let (date, msec) = to_epoch_parts(h.time);
                write_line(out, &format!("GYR {date} {msec} {}", h.heading));
                Ok(())
            }
            Record::Navigation1(n) => {
                let (date, msec) = to_epoch_parts(n.time);
                write_line(
                    out,
                    &format!(
                        "POS {date} {msec} {} {} {}",
                        n.longitude,
                        n.latitude,
                        n.speed.unwrap_or(0.0)
                    ),
                );
                Ok(())
            }
            Record::Height(h) => {
                let (date, msec) = to_epoch_parts(h.time);
                write_line(out, &format!("DFT {date} {msec} {}", h.height));
                Ok(())
            }
            Record::SoundSpeed(s) => {
                let (date, msec) = to_epoch_parts(s.time);
                write_line(out, &format!("EC1 {date} {msec} {}", s.speed));
                Ok(())
            }
            Record::Tide(t) => {
                let (date, msec) = to_epoch_parts(t.time);
                write_line(out, &format!("TID {date} {msec} {}", t.height));
                Ok(())
            }
            Record::Comment(time, text) => {
                let (date, msec) = to_epoch_parts(*time);
                write_line(out, &format!("COM {date} {msec} {text}"));
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

impl HysweepCodec {
    fn decode_line(
        &mut self,
        tag: &str,
        line: &str,
        framer: &mut Framer,
        session: &mut SessionState,
    ) -> Result<Record> {
        let tokens: Vec<&str> = line.split_whitespace().skip(1).collect();
        match tag {
            "RMB" => decode_bathymetry(&tokens, framer).map(Record::Bathymetry),
            "HCP" => {
                if tokens.len() < 5 {
                    return Err(Error::Malformed {
                        offset: framer.offset(),
                        reason: "HCP line missing fields".to_string(),
                    });
                }
                let date = parse_i64(tokens[0])?;
                let msec = parse_i64(tokens[1])?;
                Ok(Record::Attitude(AttitudeRecord {
                    time: epoch(date, msec),
                    roll: parse_f64(tokens[2])?,
                    pitch: parse_f64(tokens[3])?,
                    heave: parse_f64(tokens[4])?,
                }))
            }
            "GYR" => {
                let date = parse_i64(tokens[0])?;
                let msec = parse_i64(tokens[1])?;
                Ok(Record::Heading(HeadingRecord {
                    time: epoch(date, msec),
                    heading: parse_f64(tokens[2])?,
                }))
            }
            "POS" => {
                let date = parse_i64(tokens[0])?;
                let msec = parse_i64(tokens[1])?;
                Ok(Record::Navigation1(NavigationRecord {
                    time: epoch(date, msec),
                    longitude: parse_f64(tokens[2])?,
                    latitude: parse_f64(tokens[3])?,
                    speed: tokens.get(4).map(|t| parse_f64(t)).transpose()?,
                }))
            }
            "DFT" => {
                let date = parse_i64(tokens[0])?;
                let msec = parse_i64(tokens[1])?;
                Ok(Record::Height(HeightRecord {
                    time: epoch(date, msec),
                    height: parse_f64(tokens[2])?,
                }))
            }
            "EC1" => {
                let date = parse_i64(tokens[0])?;
                let msec = parse_i64(tokens[1])?;
                Ok(Record::SoundSpeed(SoundSpeedRecord {
                    time: epoch(date, msec),
                    speed: parse_f64(tokens[2])?,
                }))
            }
            "TID" => {
                let date = parse_i64(tokens[0])?;
                let msec = parse_i64(tokens[1])?;
                Ok(Record::Tide(TideRecord {
                    time: epoch(date, msec),
                    height: parse_f64(tokens[2])?,
                }))
            }
            "COM" => {
                let date = parse_i64(tokens[0])?;
                let msec = parse_i64(tokens[1])?;
                let text = tokens.get(2..).map(|t| t.join(" ")).unwrap_or_default();
                Ok(Record::Comment(epoch(date, msec), text))
            }
            _ => {
                let _ = session;
                if IMPLEMENTED_TAGS.contains(&tag) {
                    Err(Error::Malformed {
                        offset: framer.offset(),
                        reason: format!("{tag} line missing required fields"),
                    })
                } else {
                    Ok(Record::RawLine(RawLineRecord {
                        tag: Some(tag.to_string()),
                        bytes: {
                            let mut bytes = line.as_bytes().to_vec();
                            bytes.push(b'\n');
                            bytes
                        },
                    }))
                }
            }
        }
    }
}

fn decode_bathymetry(tokens: &[&str], framer: &mut Framer) -> Result<BathymetryRecord> {
    if tokens.len() < 8 {
        return Err(Error::Malformed {
            offset: framer.offset(),
            reason: "RMB header missing fields".to_string(),
        });
    }
    let ping_number = parse_i64(tokens[0])? as u32;
    let date = parse_i64(tokens[1])?;
    let msec = parse_i64(tokens[2])?;
    let serial = parse_i64(tokens[3])? as u16;
    let heading = parse_f64(tokens[4])?;
    let ssv = parse_f64(tokens[5])?;
    let xducer_depth = parse_f64(tokens[6])?;
    let beams = parse_i64(tokens[7])? as usize;

    let range = parse_f64_list(&read_line(framer)?)?;
    let depression = parse_f64_list(&read_line(framer)?)?;
    let azimuth = parse_f64_list(&read_line(framer)?)?;
    let quality_line = read_line(framer)?;
    let quality: Vec<u8> = quality_line
        .split_whitespace()
        .map(|t| parse_i64(t).map(|v| v as u8))
        .collect::<Result<_>>()?;
    let beam_num_line = read_line(framer)?;
    let beam_num: Vec<u8> = beam_num_line
        .split_whitespace()
        .map(|t| parse_i64(t).map(|v| v as u8))
        .collect::<Result<_>>()?;

    for arr in [&range, &depression, &azimuth] {
        if arr.len() != beams {
            return Err(Error::Malformed {
                offset: framer.offset(),
                reason: format!("array length {} does not match declared beam count {beams}", arr.len()),
            });
        }
    }

    let mut prev = None;
    for (i, bn) in beam_num.iter().enumerate() {
        if let Some(p) = prev {
            if *bn < p {
                return Err(Error::Malformed {
                    offset: framer.offset(),
                    reason: format!("beam_num not monotonic at beam {i}"),
                });
            }
        }
        prev = Some(*bn);
    }

    Ok(BathymetryRecord {
        time: epoch(date, msec),
        ping_number,
        serial,
        heading,
        ssv,
        xducer_depth,
        beams_max: beams as u16,
        sample_rate: 0.0,
        depth: vec![0.0; beams],
        across: vec![0.0; beams],
        along: vec![0.0; beams],
        depression,
        azimuth,
        range,
        quality,
        window: vec![0; beams],
        amplitude: vec![0; beams],
        beam_num,
    })
}

fn encode_bathymetry(record: &BathymetryRecord, out: &mut Vec<u8>) -> Result<()> {
    let (date, msec) = to_epoch_parts(record.time);
    write_line(
        out,
        &format!(
            "RMB {} {date} {msec} {} {} {} {} {}",
            record.ping_number,
            record.serial,
            record.heading,
            record.ssv,
            record.xducer_depth,
            record.beam_count()
        ),
    );
    write_line(out, &join_f64(&record.range));
    write_line(out, &join_f64(&record.depression));
    write_line(out, &join_f64(&record.azimuth));
    write_line(out, &join_u8(&record.quality));
    write_line(out, &join_u8(&record.beam_num));
    Ok(())
}

fn join_f64(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_u8(values: &[u8]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_framer(text: &str) -> Framer {
        Framer::new(text.as_bytes().to_vec(), 1 << 20)
    }

    #[test]
    fn decodes_heading_line() {
        let mut framer = new_framer("GYR 19000 1234 180.5\n");
        let mut codec = HysweepCodec::default();
        let mut session = SessionState::new();
        let record = codec.decode_next(&mut framer, &mut session).unwrap();
        match record {
            Record::Heading(h) => assert_eq!(h.heading, 180.5),
            other => panic!("expected Heading, got {other:?}"),
        }
    }

    #[test]
    fn resyncs_past_unknown_garbage_line() {
        let mut framer = new_framer("this is not a tag\nGYR 19000 0 10.0\n");
        let mut codec = HysweepCodec::default();
        let mut session = SessionState::new();
        let record = codec.decode_next(&mut framer, &mut session).unwrap();
        assert!(matches!(record, Record::Heading(_)));
    }

    #[test]
    fn unimplemented_known_tag_round_trips_as_raw_line() {
        let mut framer = new_framer("VER 1.0 build\n");
        let mut codec = HysweepCodec::default();
        let mut session = SessionState::new();
        let record = codec.decode_next(&mut framer, &mut session).unwrap();
        match record {
            Record::RawLine(r) => assert_eq!(r.tag.as_deref(), Some("VER")),
            other => panic!("expected RawLine, got {other:?}"),
        }
    }

    #[test]
    fn bathymetry_round_trips_beam_arrays() {
        let record = BathymetryRecord {
            time: epoch(19000, 5000),
            ping_number: 9,
            serial: 1,
            heading: 10.0,
            ssv: 1500.0,
            xducer_depth: 0.5,
            beams_max: 3,
            sample_rate: 0.0,
            depth: vec![0.0; 3],
            across: vec![0.0; 3],
            along: vec![0.0; 3],
            depression: vec![10.0, 20.0, 30.0],
            azimuth: vec![90.0, 90.0, 90.0],
            range: vec![5.0, 6.0, 7.0],
            quality: vec![2, 2, 2],
            window: vec![0; 3],
            amplitude: vec![0; 3],
            beam_num: vec![0, 1, 2],
        };
        let mut out = Vec::new();
        encode_bathymetry(&record, &mut out).unwrap();
        let mut framer = Framer::new(out, 1 << 20);
        let mut codec = HysweepCodec::default();
        let mut session = SessionState::new();
        let decoded = codec.decode_next(&mut framer, &mut session).unwrap();
        match decoded {
            Record::Bathymetry(b) => {
                assert_eq!(b.ping_number, 9);
                assert_eq!(b.beam_num, vec![0, 1, 2]);
                assert_eq!(b.range, vec![5.0, 6.0, 7.0]);
            }
            other => panic!("expected Bathymetry, got {other:?}"),
        }
    }
}
