//! The [`Ping`] aggregate, its in-progress [`PingBuilder`] form, and the small named bitsets
//! that travel with it.
//!
//! Vendor formats track "which arrays are populated" as raw hex flag words passed between
//! functions; `DataAvailable` and `SonarFlags` are thin wrappers with named constants instead of
//! bare integers.

use crate::record::{BathymetryRecord, BeamFlag, RawBeamRecord, SidescanRecord, Timestamp};

/// Which per-beam/ancillary arrays a [`Ping`] actually carries. One bit per array, never passed
/// around as a bare integer outside this module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataAvailable(u32);

impl DataAvailable {
    /// Per-beam range is populated.
    pub const RANGE: DataAvailable = DataAvailable(1 << 0);
    /// Per-beam take-off/azimuthal angles are populated.
    pub const ANGLES: DataAvailable = DataAvailable(1 << 1);
    /// Per-beam corrected depth is populated.
    pub const DEPTH: DataAvailable = DataAvailable(1 << 2);
    /// Per-beam across/along distances are populated.
    pub const ACROSS_ALONG: DataAvailable = DataAvailable(1 << 3);
    /// Per-beam amplitude is populated.
    pub const AMPLITUDE: DataAvailable = DataAvailable(1 << 4);
    /// Per-beam quality is populated.
    pub const QUALITY: DataAvailable = DataAvailable(1 << 5);
    /// Raw sidescan samples are populated.
    pub const SIDESCAN: DataAvailable = DataAvailable(1 << 6);
    /// Interpolated navigation is populated.
    pub const NAV: DataAvailable = DataAvailable(1 << 7);
    /// Interpolated attitude (roll/pitch/heave) is populated.
    pub const ATTITUDE: DataAvailable = DataAvailable(1 << 8);
    /// Interpolated heading is populated.
    pub const HEADING: DataAvailable = DataAvailable(1 << 9);

    /// The empty set.
    pub const fn empty() -> DataAvailable {
        DataAvailable(0)
    }

    /// Sets `other`'s bits.
    pub fn insert(&mut self, other: DataAvailable) {
        self.0 |= other.0;
    }

    /// True if every bit in `other` is set.
    pub fn contains(self, other: DataAvailable) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for DataAvailable {
    type Output = DataAvailable;
    fn bitor(self, rhs: DataAvailable) -> DataAvailable {
        DataAvailable(self.0 | rhs.0)
    }
}

/// Format-reported sonar flags that affect bathymetry derivation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SonarFlags(u32);

impl SonarFlags {
    /// No flags set.
    pub const NONE: SonarFlags = SonarFlags(0);
    /// Per-beam angles are already roll/pitch corrected by the sonar head; the deriver must not
    /// apply attitude correction a second time.
    pub const ATTITUDE_CORRECTED: SonarFlags = SonarFlags(1 << 0);

    /// True if every bit in `other` is set.
    pub fn contains(self, other: SonarFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets `other`'s bits.
    pub fn insert(&mut self, other: SonarFlags) {
        self.0 |= other.0;
    }
}

/// Which sonar topology a ping came from; governs which sub-records the assembler requires
/// before it will consider the ping complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SonarKind {
    /// A single transducer, one `Bathymetry` sub-record per ping.
    Single,
    /// Two transducers sharing a ping number, distinguished by serial.
    DualHead,
}

impl SonarKind {
    /// Expected number of bathymetry heads that must arrive before the ping is complete.
    pub fn head_count(self) -> usize {
        match self {
            SonarKind::Single => 1,
            SonarKind::DualHead => 2,
        }
    }
}

/// One transducer head's worth of per-beam arrays within an emitted [`Ping`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PingHalf {
    /// Transducer serial number identifying this head.
    pub serial: u16,
    /// Per-beam two-way range, meters.
    pub range: Vec<f64>,
    /// Per-beam take-off angle from vertical, degrees.
    pub take_off_angle: Vec<f64>,
    /// Per-beam azimuthal angle, degrees.
    pub azimuthal_angle: Vec<f64>,
    /// Per-beam pitch angle at transmit, degrees, if the wire record carries it directly.
    pub pitch_angle: Vec<f64>,
    /// Per-beam roll angle at transmit, degrees, if the wire record carries it directly.
    pub roll_angle: Vec<f64>,
    /// Per-beam corrected depth, meters.
    pub depth: Vec<f64>,
    /// Per-beam across-track distance, meters.
    pub across: Vec<f64>,
    /// Per-beam along-track distance, meters.
    pub along: Vec<f64>,
    /// Per-beam amplitude.
    pub amplitude: Vec<i16>,
    /// Per-beam quality indicator.
    pub quality: Vec<u8>,
    /// Per-beam quality flag.
    pub flags: Vec<BeamFlag>,
}

impl PingHalf {
    /// Number of beams this half carries.
    pub fn beam_count(&self) -> usize {
        self.range.len()
    }
}

/// A fully assembled sonar ping: one or two transducer heads, optional sidescan, and the
/// sensor context interpolated to the ping's time.
#[derive(Clone, Debug, PartialEq)]
pub struct Ping {
    /// Ping number as carried on the wire.
    pub ping_number: u32,
    /// Ping time.
    pub time: Timestamp,
    /// Device/instrument identifier.
    pub device_id: u16,
    /// Sonar topology this ping came from.
    pub sonar_kind: SonarKind,
    /// Format-reported sonar flags.
    pub sonar_flags: SonarFlags,
    /// Which arrays are actually populated.
    pub data_available: DataAvailable,
    /// Beam count (of the primary/only head).
    pub beam_count: u16,
    /// Sidescan pixel count, if present.
    pub pixel_count: u32,
    /// One or two transducer heads.
    pub halves: Vec<PingHalf>,
    /// Raw port-side sidescan samples.
    pub port: Vec<u16>,
    /// Raw starboard-side sidescan samples.
    pub starboard: Vec<u16>,
    /// Sidescan sample rate, Hz.
    pub sample_rate: f64,
    /// Interpolated longitude, degrees east.
    pub longitude: f64,
    /// Interpolated latitude, degrees north.
    pub latitude: f64,
    /// Interpolated heading, degrees.
    pub heading: f64,
    /// Interpolated roll, degrees.
    pub roll: f64,
    /// Interpolated pitch, degrees.
    pub pitch: f64,
    /// Interpolated heave, meters.
    pub heave: f64,
    /// Transducer draft below waterline, meters.
    pub draft: f64,
    /// Interpolated speed over ground, meters/second.
    pub speed: f64,
}

/// One transducer head's sub-records while a ping is still being assembled.
#[derive(Clone, Debug, Default)]
pub struct PingHeadBuilder {
    /// Transducer serial number.
    pub serial: u16,
    /// The bathymetry sub-record for this head, once seen.
    pub bathy: Option<BathymetryRecord>,
    /// The raw-beam sub-record for this head, once seen (not all sonar kinds require one).
    pub raw_beam: Option<RawBeamRecord>,
}

impl PingHeadBuilder {
    /// True once this head has at least a bathymetry sub-record.
    pub fn has_bathy(&self) -> bool {
        self.bathy.is_some()
    }
}

/// A ping under construction: the assembler's working state for one `ping_number`.
#[derive(Clone, Debug, Default)]
pub struct PingBuilder {
    /// The ping number being assembled.
    pub ping_number: u32,
    /// One entry per transducer head seen so far, keyed by arrival order (not serial, so a
    /// single-head sonar never allocates a second slot).
    pub heads: Vec<PingHeadBuilder>,
    /// Sidescan sub-record, if one has arrived for this ping number.
    pub sidescan: Option<SidescanRecord>,
}

impl PingBuilder {
    /// Starts a new, empty builder for `ping_number`.
    pub fn new(ping_number: u32) -> Self {
        PingBuilder {
            ping_number,
            heads: Vec::new(),
            sidescan: None,
        }
    }

    /// Returns the head with the given serial, inserting an empty one if absent.
    pub fn head_mut(&mut self, serial: u16) -> &mut PingHeadBuilder {
        if let Some(index) = self.heads.iter().position(|h| h.serial == serial) {
            return &mut self.heads[index];
        }
        self.heads.push(PingHeadBuilder {
            serial,
            ..Default::default()
        });
        self.heads.last_mut().expect("just pushed")
    }

    /// True if every head expected for `kind` has at least a bathymetry sub-record.
    pub fn heads_complete(&self, kind: SonarKind) -> bool {
        self.heads.len() >= kind.head_count() && self.heads.iter().all(PingHeadBuilder::has_bathy)
    }

    /// True if every head expected for `kind` is complete, additionally requiring a raw-beam
    /// sub-record per head when `requires_raw_beams` is set.
    pub fn is_complete(&self, kind: SonarKind, requires_raw_beams: bool) -> bool {
        self.heads_complete(kind)
            && (!requires_raw_beams || self.heads.iter().all(|h| h.raw_beam.is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_available_tracks_named_bits() {
        let mut available = DataAvailable::empty();
        assert!(!available.contains(DataAvailable::RANGE));
        available.insert(DataAvailable::RANGE | DataAvailable::DEPTH);
        assert!(available.contains(DataAvailable::RANGE));
        assert!(available.contains(DataAvailable::DEPTH));
        assert!(!available.contains(DataAvailable::SIDESCAN));
    }

    #[test]
    fn sonar_kind_head_counts() {
        assert_eq!(SonarKind::Single.head_count(), 1);
        assert_eq!(SonarKind::DualHead.head_count(), 2);
    }

    #[test]
    fn ping_builder_tracks_heads_by_serial() {
        let mut builder = PingBuilder::new(7);
        builder.head_mut(101).serial = 101;
        assert!(!builder.heads_complete(SonarKind::Single));
        builder.heads[0].bathy = Some(sample_bathy());
        assert!(builder.heads_complete(SonarKind::Single));
        assert!(!builder.heads_complete(SonarKind::DualHead));
    }

    #[test]
    fn is_complete_also_requires_raw_beam_when_declared() {
        let mut builder = PingBuilder::new(7);
        builder.head_mut(101).bathy = Some(sample_bathy());
        assert!(builder.is_complete(SonarKind::Single, false));
        assert!(!builder.is_complete(SonarKind::Single, true));
        builder.heads[0].raw_beam = Some(crate::record::RawBeamRecord {
            time: sample_bathy().time,
            ping_number: 7,
            serial: 101,
            range: vec![],
            take_off_angle: vec![],
            azimuthal_angle: vec![],
            amplitude: vec![],
            quality: vec![],
            beam_num: vec![],
        });
        assert!(builder.is_complete(SonarKind::Single, true));
    }

    fn sample_bathy() -> BathymetryRecord {
        BathymetryRecord {
            time: chrono::Utc::now(),
            ping_number: 7,
            serial: 101,
            heading: 0.0,
            ssv: 1500.0,
            xducer_depth: 0.0,
            beams_max: 1,
            sample_rate: 0.0,
            depth: vec![],
            across: vec![],
            along: vec![],
            depression: vec![],
            azimuth: vec![],
            range: vec![],
            quality: vec![],
            window: vec![],
            amplitude: vec![],
            beam_num: vec![],
        }
    }
}
