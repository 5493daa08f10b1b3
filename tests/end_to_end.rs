//! End-to-end scenarios driving the full read path — format codec, framer resync, ping
//! assembly, and bathymetry derivation together — rather than any one component in isolation.

use chrono::{TimeZone, Utc};

use swath::formats::simrad::{self, SimradCodec};
use swath::formats::register_format;
use swath::record::{BathymetryRecord, ParameterBlock, Record, SidescanRecord};
use swath::session::{SessionOptions, SessionState};
use swath::{Framer, PingReader, ReadEvent};

fn t(secs: i64) -> swath::record::Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn bathy(ping_number: u32, beams: usize, time: swath::record::Timestamp) -> BathymetryRecord {
    BathymetryRecord {
        time,
        ping_number,
        serial: 1,
        heading: 0.0,
        ssv: 1500.0,
        xducer_depth: 0.0,
        beams_max: beams as u16,
        sample_rate: 20_000.0,
        depth: vec![0.0; beams],
        across: vec![0.0; beams],
        along: vec![0.0; beams],
        depression: vec![20.0; beams],
        azimuth: vec![0.0; beams],
        range: vec![5.0; beams],
        quality: vec![2; beams],
        window: vec![0; beams],
        amplitude: vec![0; beams],
        beam_num: (0..beams as u8).collect(),
    }
}

fn sidescan(ping_number: u32, time: swath::record::Timestamp) -> SidescanRecord {
    SidescanRecord {
        time,
        ping_number,
        port: vec![1, 2, 3],
        starboard: vec![4, 5, 6],
        sample_rate: 10_000.0,
    }
}

fn reader_over(data: Vec<u8>) -> PingReader<SimradCodec> {
    let handle = register_format(simrad::format_info());
    let options = SessionOptions::default();
    let framer = Framer::new(data, options.resync_limit);
    PingReader::new(framer, SimradCodec, handle, &options)
}

fn drain(reader: &mut PingReader<SimradCodec>) -> Vec<ReadEvent> {
    let mut events = Vec::new();
    while let Some(event) = reader.read_next().unwrap() {
        events.push(event);
    }
    events
}

/// Scenario 1: Start | Bathy(42, 80 beams) | Sidescan(matching time) | Stop.
#[test]
fn single_ping_single_head() {
    let mut session = SessionState::new();
    session.byte_order = Some(swath::byte_codec::Endian::Little);
    let codec = SimradCodec;
    let mut out = Vec::new();
    codec
        .encode(&Record::Start(ParameterBlock::default()), &mut out, &mut session)
        .unwrap();
    codec
        .encode(&Record::Bathymetry(bathy(42, 80, t(0))), &mut out, &mut session)
        .unwrap();
    codec
        .encode(&Record::Sidescan(sidescan(42, t(0))), &mut out, &mut session)
        .unwrap();
    codec
        .encode(&Record::Stop(ParameterBlock::default()), &mut out, &mut session)
        .unwrap();

    let mut reader = reader_over(out);
    let events = drain(&mut reader);

    let pings: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ReadEvent::Ping(p) => Some(p.as_ref()),
            _ => None,
        })
        .collect();
    assert_eq!(pings.len(), 1);
    let ping = pings[0];
    assert_eq!(ping.ping_number, 42);
    assert_eq!(ping.beam_count, 80);
    assert!(ping.halves[0]
        .flags
        .iter()
        .all(|f| *f == swath::record::BeamFlag::None));
    assert_eq!(ping.pixel_count, 6);
}

/// Scenario 2: Sidescan(42) | Bathy(43). Ping 42 never appears; Ping 43 arrives with sidescan
/// zeroed.
#[test]
fn orphan_sidescan_is_dropped_and_logged() {
    let mut session = SessionState::new();
    session.byte_order = Some(swath::byte_codec::Endian::Little);
    let codec = SimradCodec;
    let mut out = Vec::new();
    codec
        .encode(&Record::Sidescan(sidescan(42, t(0))), &mut out, &mut session)
        .unwrap();
    codec
        .encode(&Record::Bathymetry(bathy(43, 4, t(5))), &mut out, &mut session)
        .unwrap();

    let mut reader = reader_over(out);
    let events = drain(&mut reader);

    let pings: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ReadEvent::Ping(p) => Some(p.as_ref()),
            _ => None,
        })
        .collect();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].ping_number, 43);
    assert_eq!(pings[0].pixel_count, 0);
}

/// Scenario 3: Bathy(10) | garbage | Bathy(11). Both pings survive the resync.
#[test]
fn midstream_garbage_does_not_lose_pings() {
    let mut session = SessionState::new();
    session.byte_order = Some(swath::byte_codec::Endian::Little);
    let codec = SimradCodec;
    let mut out = Vec::new();
    codec
        .encode(&Record::Bathymetry(bathy(10, 4, t(0))), &mut out, &mut session)
        .unwrap();
    out.extend(std::iter::repeat(0x00u8).take(137));
    codec
        .encode(&Record::Bathymetry(bathy(11, 4, t(1))), &mut out, &mut session)
        .unwrap();

    let mut reader = reader_over(out);
    let events = drain(&mut reader);

    let ping_numbers: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            ReadEvent::Ping(p) => Some(p.ping_number),
            _ => None,
        })
        .collect();
    assert_eq!(ping_numbers, vec![10, 11]);
}

/// Scenario 6: a Start record whose comment contains a literal comma round-trips through the
/// caret-escaped wire encoding to an identical parsed value.
#[test]
fn parameter_block_comment_with_comma_round_trips() {
    let mut session = SessionState::new();
    session.byte_order = Some(swath::byte_codec::Endian::Little);
    let codec = SimradCodec;
    let mut block = ParameterBlock::default();
    block.fields.insert("SPD".to_string(), "10".to_string());
    block.comment = Some("a,b,c".to_string());

    let mut out = Vec::new();
    codec
        .encode(&Record::Start(block.clone()), &mut out, &mut session)
        .unwrap();

    let mut reader = reader_over(out);
    let events = drain(&mut reader);
    match &events[0] {
        ReadEvent::Record(Record::Start(decoded)) => {
            assert_eq!(decoded.comment.as_deref(), Some("a,b,c"));
            assert_eq!(decoded.fields.get("SPD").map(String::as_str), Some("10"));
        }
        other => panic!("expected a Start record, got {other:?}"),
    }
}

/// Resync correctness: a long run of random-looking bytes between two valid records is fully
/// skipped without losing either record, regardless of exact length.
#[test]
fn resync_handles_large_garbage_spans() {
    let mut session = SessionState::new();
    session.byte_order = Some(swath::byte_codec::Endian::Little);
    let codec = SimradCodec;
    let mut out = Vec::new();
    codec
        .encode(&Record::Comment(t(0), "before".to_string()), &mut out, &mut session)
        .unwrap();
    // 0xFF repeated never satisfies the type-code window check (max known type is 19), so this
    // can't accidentally resemble a real record header.
    out.extend(std::iter::repeat(0xFFu8).take(4000));
    codec
        .encode(&Record::Comment(t(1), "after".to_string()), &mut out, &mut session)
        .unwrap();

    let mut reader = reader_over(out);
    let events = drain(&mut reader);
    let comments: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            ReadEvent::Record(Record::Comment(_, text)) => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(comments, vec!["before".to_string(), "after".to_string()]);
}
