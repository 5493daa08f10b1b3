use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use swath::formats::register_format;
use swath::formats::simrad::{self, SimradCodec};
use swath::record::{BathymetryRecord, Record};
use swath::session::{SessionOptions, SessionState};
use swath::{Framer, PingReader, ReadEvent};

fn t(secs: i64) -> swath::record::Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn bathy(ping_number: u32, beams: usize) -> BathymetryRecord {
    BathymetryRecord {
        time: t(ping_number as i64),
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

fn encoded_pings(count: u32, beams: usize) -> Vec<u8> {
    let mut session = SessionState::new();
    session.byte_order = Some(swath::byte_codec::Endian::Little);
    let codec = SimradCodec;
    let mut out = Vec::new();
    for ping_number in 0..count {
        codec
            .encode(&Record::Bathymetry(bathy(ping_number, beams)), &mut out, &mut session)
            .unwrap();
    }
    out
}

fn read_all(data: &[u8]) -> usize {
    let handle = register_format(simrad::format_info());
    let options = SessionOptions::default();
    let framer = Framer::new(data.to_vec(), options.resync_limit);
    let mut reader = PingReader::new(framer, SimradCodec, handle, &options);
    let mut pings = 0usize;
    while let Some(event) = reader.read_next().unwrap() {
        if let ReadEvent::Ping(_) = event {
            pings += 1;
        }
    }
    pings
}

fn bench_ping_stream(c: &mut Criterion) {
    let small = encoded_pings(200, 64);
    c.bench_function("read_200_pings_64_beams", |b| {
        b.iter(|| black_box(read_all(black_box(&small))))
    });

    let wide = encoded_pings(50, 400);
    c.bench_function("read_50_pings_400_beams", |b| {
        b.iter(|| black_box(read_all(black_box(&wide))))
    });
}

criterion_group!(benches, bench_ping_stream);
criterion_main!(benches);
