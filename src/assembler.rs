//! The ping assembler state machine.
//!
//! Gathers bathymetry, raw-beam, and sidescan sub-records for one ping number and emits a
//! completed [`Ping`] once its heads and sidescan (if any) have all arrived. Deliberately decoupled
//! from the framer and from bathymetry derivation/sensor interpolation, so it can be driven in
//! tests with a handful of hand-built records and no byte-level I/O at all; the geometry it
//! hands back is the as-received (uncorrected) arrays, with attitude correction and sensor
//! context filled in afterward by the reader.

use crate::record::{BathymetryRecord, BeamFlag, RawBeamRecord, SidescanRecord, Timestamp};
use crate::ping::{DataAvailable, Ping, PingBuilder, PingHalf, SonarFlags, SonarKind};

/// Something the assembler produced while processing one sub-record: either a completed ping
/// or a recoverable anomaly worth logging.
#[derive(Clone, Debug, PartialEq)]
pub enum AssemblerEvent {
    /// A ping has been fully assembled and is ready to hand to the bathymetry deriver.
    Ping(Ping),
    /// An anomaly that did not stop assembly but should be surfaced to the caller/log.
    Warning(AssemblerWarning),
}

/// A non-fatal anomaly encountered while assembling pings.
#[derive(Clone, Debug, PartialEq)]
pub enum AssemblerWarning {
    /// A sidescan record arrived with no bathymetry ever claiming its ping number.
    OrphanSidescan {
        /// The ping number the sidescan declared.
        ping_number: u32,
    },
    /// A sidescan record's ping number did not match the bathymetry ping it arrived alongside;
    /// the bathymetry ping was emitted with its sidescan fields zeroed.
    SidescanMismatch {
        /// The bathymetry ping's number.
        bathy_ping: u32,
        /// The sidescan record's ping number.
        sidescan_ping: u32,
    },
    /// A ping was flushed (end of stream, or superseded by the next ping header) before every
    /// expected head arrived.
    DiscardedPartial {
        /// The ping number that was discarded.
        ping_number: u32,
        /// Why it never completed.
        reason: String,
    },
}

/// Gathers sub-records into complete pings per the ping-completion decision table.
pub struct PingAssembler {
    sonar_kind: SonarKind,
    requires_raw_beams: bool,
    tolerance_ms: i64,
    current: Option<PingBuilder>,
    orphan_sidescan: Option<SidescanRecord>,
}

impl PingAssembler {
    /// Creates an assembler for the given sonar topology and sidescan-pairing tolerance
    /// (`0` for exact-equality pairing). `requires_raw_beams` comes from the format's
    /// [`crate::formats::FormatInfo`] and gates whether a head additionally needs its raw-beam
    /// sub-record before it counts as done.
    pub fn new(sonar_kind: SonarKind, sidescan_tolerance_ms: u32) -> Self {
        PingAssembler {
            sonar_kind,
            requires_raw_beams: false,
            tolerance_ms: sidescan_tolerance_ms as i64,
            current: None,
            orphan_sidescan: None,
        }
    }

    /// Same as [`PingAssembler::new`], additionally declaring whether a head needs its raw-beam
    /// sub-record before it counts as complete.
    pub fn with_raw_beam_requirement(
        sonar_kind: SonarKind,
        sidescan_tolerance_ms: u32,
        requires_raw_beams: bool,
    ) -> Self {
        PingAssembler {
            requires_raw_beams,
            ..PingAssembler::new(sonar_kind, sidescan_tolerance_ms)
        }
    }

    fn within_tolerance(&self, a: Timestamp, b: Timestamp) -> bool {
        (a - b).num_milliseconds().abs() <= self.tolerance_ms
    }

    /// Feeds one bathymetry sub-record, addressed to the transducer head `serial`.
    pub fn feed_bathy(&mut self, serial: u16, record: BathymetryRecord) -> Vec<AssemblerEvent> {
        let mut events = Vec::new();
        let ping_number = record.ping_number;

        if let Some(ss) = self.orphan_sidescan.clone() {
            if ss.ping_number == ping_number && self.within_tolerance(ss.time, record.time) {
                self.orphan_sidescan = None;
                let mut builder = PingBuilder::new(ping_number);
                builder.sidescan = Some(ss);
                builder.head_mut(serial).bathy = Some(record);
                self.current = Some(builder);
                events.extend(self.emit_if_complete());
                return events;
            } else {
                events.push(AssemblerEvent::Warning(AssemblerWarning::OrphanSidescan {
                    ping_number: ss.ping_number,
                }));
                self.orphan_sidescan = None;
            }
        }

        if let Some(builder) = &mut self.current {
            if builder.ping_number == ping_number {
                builder.head_mut(serial).bathy = Some(record);
                events.extend(self.emit_if_complete());
                return events;
            }
            events.extend(self.emit_current_forced("superseded by next ping header"));
        }

        let mut builder = PingBuilder::new(ping_number);
        builder.head_mut(serial).bathy = Some(record);
        self.current = Some(builder);
        events
    }

    /// Feeds one raw-beam sub-record, addressed to the transducer head `serial`. Ignored (with
    /// no event) if it does not belong to the ping currently under construction — the format
    /// modules are expected to emit raw beams immediately after the bathymetry header they pair
    /// with.
    pub fn feed_raw_beam(&mut self, serial: u16, record: RawBeamRecord) -> Vec<AssemblerEvent> {
        let matches_current = match &self.current {
            Some(builder) => builder.ping_number == record.ping_number,
            None => false,
        };
        if !matches_current {
            return Vec::new();
        }
        self.current.as_mut().expect("checked Some").head_mut(serial).raw_beam = Some(record);
        self.emit_if_complete().into_iter().collect()
    }

    /// Feeds one sidescan sub-record.
    pub fn feed_sidescan(&mut self, record: SidescanRecord) -> Vec<AssemblerEvent> {
        let mut events = Vec::new();

        if let Some(builder) = &self.current {
            if builder.ping_number == record.ping_number
                && self.within_tolerance(builder_time(builder), record.time)
            {
                let mut builder = self.current.take().expect("checked Some");
                builder.sidescan = Some(record);
                events.push(AssemblerEvent::Ping(finish_ping(builder, self.sonar_kind)));
                return events;
            } else {
                events.push(AssemblerEvent::Warning(AssemblerWarning::SidescanMismatch {
                    bathy_ping: builder.ping_number,
                    sidescan_ping: record.ping_number,
                }));
                events.extend(self.emit_current_forced("sidescan ping number mismatch"));
                self.orphan_sidescan = Some(record);
                return events;
            }
        }

        self.orphan_sidescan = Some(record);
        events
    }

    /// Flushes any ping still under construction at end-of-stream. Call once after the last
    /// record has been fed.
    pub fn finish(&mut self) -> Vec<AssemblerEvent> {
        let mut events = Vec::new();
        if self.current.is_some() {
            events.extend(self.emit_current_forced("end of stream"));
        }
        if let Some(ss) = self.orphan_sidescan.take() {
            events.push(AssemblerEvent::Warning(AssemblerWarning::OrphanSidescan {
                ping_number: ss.ping_number,
            }));
        }
        events
    }

    /// Emits the ping under construction as soon as every head required by `sonar_kind` (and, if
    /// declared, its raw-beam sub-record) has arrived and a sidescan has already been paired in —
    /// the decision table's actual completion condition, as opposed to the forced flush a later,
    /// unrelated record triggers. A ping with no sidescan ever expected still waits for one of
    /// the forcing paths, same as today, since the assembler has no way to know a format omits
    /// sidescan entirely.
    fn emit_if_complete(&mut self) -> Option<AssemblerEvent> {
        let builder = self.current.as_ref()?;
        if builder.sidescan.is_some() && builder.is_complete(self.sonar_kind, self.requires_raw_beams) {
            let builder = self.current.take().expect("checked Some");
            Some(AssemblerEvent::Ping(finish_ping(builder, self.sonar_kind)))
        } else {
            None
        }
    }

    /// Emits whatever ping is currently under construction, with null sidescan, clearing state.
    /// Used both when a new ping header supersedes the current one and at end-of-stream. If the
    /// builder had not reached [`PingBuilder::is_complete`] yet, also reports a
    /// [`AssemblerWarning::DiscardedPartial`] ahead of the `Ping` event — the decision table
    /// treats these two outcomes differently even though both still hand back whatever arrived.
    fn emit_current_forced(&mut self, reason: &str) -> Vec<AssemblerEvent> {
        let builder = self.current.take().expect("caller checked Some");
        let mut events = Vec::new();
        if !builder.is_complete(self.sonar_kind, self.requires_raw_beams) {
            events.push(AssemblerEvent::Warning(AssemblerWarning::DiscardedPartial {
                ping_number: builder.ping_number,
                reason: reason.to_string(),
            }));
        }
        events.push(AssemblerEvent::Ping(finish_ping(builder, self.sonar_kind)));
        events
    }
}

fn builder_time(builder: &PingBuilder) -> Timestamp {
    builder
        .heads
        .first()
        .and_then(|h| h.bathy.as_ref())
        .map(|b| b.time)
        .unwrap_or_else(chrono::Utc::now)
}

fn finish_ping(builder: PingBuilder, sonar_kind: SonarKind) -> Ping {
    let ping_number = builder.ping_number;
    let mut halves = Vec::new();
    let mut time = chrono::DateTime::<chrono::Utc>::default();
    let mut device_id = 0u16;
    let mut data_available = DataAvailable::empty();

    for head in builder.heads {
        let Some(bathy) = head.bathy else { continue };
        time = bathy.time;
        device_id = bathy.serial;
        let beam_count = bathy.beam_count();
        let mut half = PingHalf {
            serial: bathy.serial,
            range: bathy.range,
            take_off_angle: bathy.depression,
            azimuthal_angle: bathy.azimuth,
            pitch_angle: Vec::new(),
            roll_angle: Vec::new(),
            depth: bathy.depth,
            across: bathy.across,
            along: bathy.along,
            amplitude: bathy.amplitude,
            quality: bathy.quality,
            flags: vec![BeamFlag::None; beam_count],
        };
        if let Some(raw) = head.raw_beam {
            if raw.range.len() == beam_count {
                half.range = raw.range;
            }
            if raw.take_off_angle.len() == beam_count {
                half.take_off_angle = raw.take_off_angle;
            }
            if raw.azimuthal_angle.len() == beam_count {
                half.azimuthal_angle = raw.azimuthal_angle;
            }
        }
        for (i, r) in half.range.iter().enumerate() {
            if *r == 0.0 {
                half.flags[i] = BeamFlag::Null;
            }
        }
        data_available.insert(DataAvailable::RANGE | DataAvailable::ANGLES | DataAvailable::DEPTH);
        halves.push(half);
    }

    let beam_count = halves.first().map(|h| h.beam_count()).unwrap_or(0) as u16;

    let (port, starboard, sample_rate, pixel_count) = match builder.sidescan {
        Some(ss) => {
            data_available.insert(DataAvailable::SIDESCAN);
            let pixel_count = (ss.port.len() + ss.starboard.len()) as u32;
            (ss.port, ss.starboard, ss.sample_rate, pixel_count)
        }
        None => (Vec::new(), Vec::new(), 0.0, 0),
    };

    Ping {
        ping_number,
        time,
        device_id,
        sonar_kind,
        sonar_flags: SonarFlags::NONE,
        data_available,
        beam_count,
        pixel_count,
        halves,
        port,
        starboard,
        sample_rate,
        longitude: 0.0,
        latitude: 0.0,
        heading: 0.0,
        roll: 0.0,
        pitch: 0.0,
        heave: 0.0,
        draft: 0.0,
        speed: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn bathy(ping_number: u32, serial: u16, time: Timestamp, beams: usize) -> BathymetryRecord {
        BathymetryRecord {
            time,
            ping_number,
            serial,
            heading: 0.0,
            ssv: 1500.0,
            xducer_depth: 0.0,
            beams_max: beams as u16,
            sample_rate: 0.0,
            depth: vec![1.0; beams],
            across: vec![0.0; beams],
            along: vec![0.0; beams],
            depression: vec![0.0; beams],
            azimuth: vec![0.0; beams],
            range: vec![1.0; beams],
            quality: vec![2; beams],
            window: vec![0; beams],
            amplitude: vec![0; beams],
            beam_num: (0..beams as u8).collect(),
        }
    }

    fn sidescan(ping_number: u32, time: Timestamp) -> SidescanRecord {
        SidescanRecord {
            time,
            ping_number,
            port: vec![1, 2, 3],
            starboard: vec![4, 5, 6],
            sample_rate: 10_000.0,
        }
    }

    #[test]
    fn single_ping_single_head() {
        let mut assembler = PingAssembler::new(SonarKind::Single, 0);
        let events = assembler.feed_bathy(1, bathy(42, 1, t(0), 80));
        assert!(events.is_empty());
        let events = assembler.feed_sidescan(sidescan(42, t(0)));
        assert_eq!(events.len(), 1);
        match &events[0] {
            AssemblerEvent::Ping(ping) => {
                assert_eq!(ping.ping_number, 42);
                assert_eq!(ping.beam_count, 80);
                assert!(ping.halves[0].flags.iter().all(|f| *f == BeamFlag::None));
            }
            other => panic!("expected Ping, got {other:?}"),
        }
        assert!(assembler.finish().is_empty());
    }

    #[test]
    fn orphan_sidescan_then_next_ping() {
        let mut assembler = PingAssembler::new(SonarKind::Single, 0);
        let events = assembler.feed_sidescan(sidescan(42, t(0)));
        assert!(events.is_empty());
        let events = assembler.feed_bathy(1, bathy(43, 1, t(5), 10));
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            AssemblerEvent::Warning(AssemblerWarning::OrphanSidescan { ping_number: 42 })
        ));
        let events = assembler.finish();
        assert_eq!(events.len(), 1);
        match &events[0] {
            AssemblerEvent::Ping(ping) => {
                assert_eq!(ping.ping_number, 43);
                assert!(ping.port.is_empty());
            }
            other => panic!("expected Ping, got {other:?}"),
        }
    }

    #[test]
    fn midstream_garbage_does_not_lose_pings() {
        let mut assembler = PingAssembler::new(SonarKind::Single, 0);
        assembler.feed_bathy(1, bathy(10, 1, t(0), 5));
        let events = assembler.feed_bathy(1, bathy(11, 1, t(1), 5));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AssemblerEvent::Ping(ref p) if p.ping_number == 10));
        let events = assembler.finish();
        assert!(matches!(events[0], AssemblerEvent::Ping(ref p) if p.ping_number == 11));
    }

    #[test]
    fn dual_head_folds_into_one_ping() {
        let mut assembler = PingAssembler::new(SonarKind::DualHead, 0);
        assembler.feed_bathy(101, bathy(7, 101, t(0), 4));
        assembler.feed_raw_beam(
            101,
            RawBeamRecord {
                time: t(0),
                ping_number: 7,
                serial: 101,
                range: vec![1.0; 4],
                take_off_angle: vec![0.0; 4],
                azimuthal_angle: vec![0.0; 4],
                amplitude: vec![0; 4],
                quality: vec![2; 4],
                beam_num: vec![0, 1, 2, 3],
            },
        );
        assembler.feed_bathy(102, bathy(7, 102, t(0), 4));
        assembler.feed_raw_beam(
            102,
            RawBeamRecord {
                time: t(0),
                ping_number: 7,
                serial: 102,
                range: vec![1.0; 4],
                take_off_angle: vec![0.0; 4],
                azimuthal_angle: vec![0.0; 4],
                amplitude: vec![0; 4],
                quality: vec![2; 4],
                beam_num: vec![0, 1, 2, 3],
            },
        );
        let events = assembler.feed_sidescan(sidescan(7, t(0)));
        assert_eq!(events.len(), 1);
        match &events[0] {
            AssemblerEvent::Ping(ping) => {
                assert_eq!(ping.ping_number, 7);
                assert_eq!(ping.halves.len(), 2);
            }
            other => panic!("expected Ping, got {other:?}"),
        }
    }

    #[test]
    fn sidescan_first_auto_emits_once_heads_complete_without_forcing_event() {
        let mut assembler = PingAssembler::new(SonarKind::Single, 0);
        let events = assembler.feed_sidescan(sidescan(42, t(0)));
        assert!(events.is_empty());
        // The ping should be emitted the moment feed_bathy completes it, with no later,
        // unrelated record (next ping header, mismatched sidescan, end of stream) forcing it out.
        let events = assembler.feed_bathy(1, bathy(42, 1, t(0), 12));
        assert_eq!(events.len(), 1);
        match &events[0] {
            AssemblerEvent::Ping(ping) => {
                assert_eq!(ping.ping_number, 42);
                assert_eq!(ping.beam_count, 12);
            }
            other => panic!("expected Ping, got {other:?}"),
        }
        assert!(assembler.finish().is_empty());
    }

    #[test]
    fn raw_beam_requirement_blocks_auto_emit_and_flags_forced_flush_as_partial() {
        let mut assembler = PingAssembler::with_raw_beam_requirement(SonarKind::Single, 0, true);
        let events = assembler.feed_sidescan(sidescan(42, t(0)));
        assert!(events.is_empty());
        // Bathy alone is not enough once raw beams are required; no auto-emit yet.
        let events = assembler.feed_bathy(1, bathy(42, 1, t(0), 4));
        assert!(events.is_empty());

        let events = assembler.feed_raw_beam(
            1,
            RawBeamRecord {
                time: t(0),
                ping_number: 42,
                serial: 1,
                range: vec![1.0; 4],
                take_off_angle: vec![0.0; 4],
                azimuthal_angle: vec![0.0; 4],
                amplitude: vec![0; 4],
                quality: vec![2; 4],
                beam_num: vec![0, 1, 2, 3],
            },
        );
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AssemblerEvent::Ping(ref p) if p.ping_number == 42));
    }

    #[test]
    fn forced_flush_of_an_incomplete_dual_head_ping_reports_discarded_partial() {
        let mut assembler = PingAssembler::new(SonarKind::DualHead, 0);
        assembler.feed_bathy(101, bathy(7, 101, t(0), 4));
        let events = assembler.finish();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            AssemblerEvent::Warning(AssemblerWarning::DiscardedPartial { ping_number: 7, .. })
        ));
        assert!(matches!(events[1], AssemblerEvent::Ping(ref p) if p.ping_number == 7));
    }
}
