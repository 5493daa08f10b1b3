//! The [`Record`] tagged sum and its per-kind payloads.
//!
//! Every sub-record a format module can decode ends up as one `Record` variant. The ping
//! assembler consumes `Bathymetry`, `RawBeam{1,2,3}`, and `Sidescan`; every other variant is
//! either routed to a [`crate::sensors::Interpolator`] or passed straight through to the caller.

use std::collections::BTreeMap;

/// Absolute time with sub-millisecond resolution.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The closed set of record kinds a format module may implement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Start-of-survey marker, carries a parameter block.
    Start,
    /// End-of-survey marker, carries a parameter block.
    Stop,
    /// Runtime sonar operating parameters.
    RunParameter,
    /// Clock synchronization record.
    Clock,
    /// Tide height record.
    Tide,
    /// Transducer/waterline height record.
    Height,
    /// Heading sample.
    Heading,
    /// Surface sound speed sample.
    SoundSpeed,
    /// Transducer tilt sample.
    Tilt,
    /// Roll/pitch/heave attitude sample.
    Attitude,
    /// Primary navigation stream.
    Navigation1,
    /// Secondary navigation stream.
    Navigation2,
    /// Tertiary navigation stream.
    Navigation3,
    /// Sound velocity profile cast.
    SoundSpeedProfile,
    /// Bathymetry header and per-beam corrected/raw detections.
    Bathymetry,
    /// Raw beam detections, primary stream.
    RawBeam1,
    /// Raw beam detections, secondary stream.
    RawBeam2,
    /// Raw beam detections, tertiary stream.
    RawBeam3,
    /// Raw sidescan samples.
    Sidescan,
    /// Water column (raw sample amplitude) record. Out of scope beyond opaque passthrough.
    WaterColumn,
    /// Generic sensor configuration parameters.
    SensorParameters,
    /// Installation/offset parameters.
    Installation,
    /// Generic runtime parameter block, for formats with more than one parameter record kind.
    Parameter,
    /// Free-text comment.
    Comment,
    /// Unrecognized payload preserved verbatim for lossless round-trip.
    RawLine,
}

/// Why a beam was flagged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlagReason {
    /// The sonar itself reported a poor-quality detection.
    Sonar,
    /// A post-processing filter rejected the beam.
    Filter,
    /// A human operator manually flagged the beam.
    Manual,
}

/// Per-beam quality flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BeamFlag {
    /// No flag; the beam is good.
    #[default]
    None,
    /// The beam has no valid detection (`range == 0`).
    Null,
    /// The beam was flagged, with a reason.
    Flagged(FlagReason),
}

impl BeamFlag {
    /// True unless the beam is `None` (unflagged).
    pub fn is_flagged(self) -> bool {
        !matches!(self, BeamFlag::None)
    }
}

/// An ASCII `KEY=VALUE,KEY=VALUE,...` parameter block, as used by the SIMRAD-class Start/Stop/
/// RunParameter/Installation/SensorParameters records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterBlock {
    /// Timestamp carried by the record header.
    pub time: Option<Timestamp>,
    /// Parsed `KEY=VALUE` pairs, keyed by the raw key string. Unknown keys are silently dropped,
    /// not stored.
    pub fields: BTreeMap<String, String>,
    /// Free-text comment, if the block carries one. May contain literal commas; those are
    /// escaped on the wire but stored here unescaped.
    pub comment: Option<String>,
}

/// Clock synchronization record: external time vs. local receipt time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockRecord {
    /// Local (receipt) time.
    pub time: Timestamp,
    /// External clock's reported time.
    pub external_time: Timestamp,
    /// Whether the external clock is the time basis for the survey.
    pub is_time_source: bool,
}

/// Tide height sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TideRecord {
    /// Sample time.
    pub time: Timestamp,
    /// Tide height, meters, positive up.
    pub height: f64,
}

/// Transducer or waterline height sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightRecord {
    /// Sample time.
    pub time: Timestamp,
    /// Height, meters.
    pub height: f64,
}

/// Heading sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadingRecord {
    /// Sample time.
    pub time: Timestamp,
    /// Heading, degrees, `[0, 360)`.
    pub heading: f64,
}

/// Surface sound speed sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoundSpeedRecord {
    /// Sample time.
    pub time: Timestamp,
    /// Sound speed, meters/second.
    pub speed: f64,
}

/// Transducer tilt sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TiltRecord {
    /// Sample time.
    pub time: Timestamp,
    /// Tilt angle, degrees.
    pub tilt: f64,
}

/// Roll/pitch/heave attitude sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttitudeRecord {
    /// Sample time.
    pub time: Timestamp,
    /// Roll, degrees, positive starboard-down.
    pub roll: f64,
    /// Pitch, degrees, positive bow-up.
    pub pitch: f64,
    /// Heave, meters, positive down.
    pub heave: f64,
}

/// Navigation fix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavigationRecord {
    /// Sample time.
    pub time: Timestamp,
    /// Longitude, degrees east.
    pub longitude: f64,
    /// Latitude, degrees north.
    pub latitude: f64,
    /// Speed over ground, meters/second, if carried by this stream.
    pub speed: Option<f64>,
}

/// A sound velocity profile cast.
#[derive(Clone, Debug, PartialEq)]
pub struct SoundSpeedProfileRecord {
    /// Cast time.
    pub time: Timestamp,
    /// Depths, meters, increasing.
    pub depths: Vec<f64>,
    /// Sound speed at each depth, meters/second.
    pub speeds: Vec<f64>,
}

/// The bathymetry sub-record: header plus per-beam raw/corrected detections.
#[derive(Clone, Debug, PartialEq)]
pub struct BathymetryRecord {
    /// Ping time.
    pub time: Timestamp,
    /// Ping number, used to pair with raw beams and sidescan.
    pub ping_number: u32,
    /// Transducer serial number; distinguishes dual-head sonar heads.
    pub serial: u16,
    /// Vessel heading at ping time, degrees.
    pub heading: f64,
    /// Surface sound speed, meters/second.
    pub ssv: f64,
    /// Transducer depth below waterline, meters.
    pub xducer_depth: f64,
    /// Maximum beam count the sonar model supports.
    pub beams_max: u16,
    /// Declared sample rate of the detection window, Hz.
    pub sample_rate: f64,
    /// Per-beam depth, meters (as received; sign/reference is format-specific until derived).
    pub depth: Vec<f64>,
    /// Per-beam across-track distance, meters.
    pub across: Vec<f64>,
    /// Per-beam along-track distance, meters.
    pub along: Vec<f64>,
    /// Per-beam depression (take-off) angle, degrees.
    pub depression: Vec<f64>,
    /// Per-beam azimuth angle, degrees.
    pub azimuth: Vec<f64>,
    /// Per-beam range, meters.
    pub range: Vec<f64>,
    /// Per-beam quality indicator, sonar-specific scale.
    pub quality: Vec<u8>,
    /// Per-beam detection window length.
    pub window: Vec<u8>,
    /// Per-beam amplitude.
    pub amplitude: Vec<i16>,
    /// Beam numbers; must be non-decreasing.
    pub beam_num: Vec<u8>,
}

impl BathymetryRecord {
    /// Number of beams carried by this record.
    pub fn beam_count(&self) -> usize {
        self.beam_num.len()
    }
}

/// Raw per-beam detection data (travel time derived range + angles), prior to correction.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBeamRecord {
    /// Ping time.
    pub time: Timestamp,
    /// Ping number, must match the paired `Bathymetry` record.
    pub ping_number: u32,
    /// Transducer serial number.
    pub serial: u16,
    /// Per-beam two-way range, meters.
    pub range: Vec<f64>,
    /// Per-beam take-off angle from vertical, degrees.
    pub take_off_angle: Vec<f64>,
    /// Per-beam azimuthal angle, degrees.
    pub azimuthal_angle: Vec<f64>,
    /// Per-beam amplitude.
    pub amplitude: Vec<i16>,
    /// Per-beam quality indicator.
    pub quality: Vec<u8>,
    /// Beam numbers; must be non-decreasing.
    pub beam_num: Vec<u8>,
}

/// Raw sidescan samples.
#[derive(Clone, Debug, PartialEq)]
pub struct SidescanRecord {
    /// Ping time.
    pub time: Timestamp,
    /// Ping number this sidescan pairs with.
    pub ping_number: u32,
    /// Port-side samples.
    pub port: Vec<u16>,
    /// Starboard-side samples.
    pub starboard: Vec<u16>,
    /// Sample rate, Hz.
    pub sample_rate: f64,
}

/// An opaque water-column record. Content is not interpreted (out of scope per §1); preserved
/// so that round-trip and framing tests still see it pass through.
#[derive(Clone, Debug, PartialEq)]
pub struct WaterColumnRecord {
    /// Ping time.
    pub time: Timestamp,
    /// Ping number.
    pub ping_number: u32,
    /// Raw payload bytes, uninterpreted.
    pub payload: Vec<u8>,
}

/// An unrecognized record preserved verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct RawLineRecord {
    /// The wire tag/label, if one could be read.
    pub tag: Option<String>,
    /// The full record bytes, including framing, so it can be re-emitted byte-for-byte.
    pub bytes: Vec<u8>,
}

/// A decoded record: the tagged sum over every kind a format module may produce.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    /// See [`RecordKind::Start`].
    Start(ParameterBlock),
    /// See [`RecordKind::Stop`].
    Stop(ParameterBlock),
    /// See [`RecordKind::RunParameter`].
    RunParameter(ParameterBlock),
    /// See [`RecordKind::Clock`].
    Clock(ClockRecord),
    /// See [`RecordKind::Tide`].
    Tide(TideRecord),
    /// See [`RecordKind::Height`].
    Height(HeightRecord),
    /// See [`RecordKind::Heading`].
    Heading(HeadingRecord),
    /// See [`RecordKind::SoundSpeed`].
    SoundSpeed(SoundSpeedRecord),
    /// See [`RecordKind::Tilt`].
    Tilt(TiltRecord),
    /// See [`RecordKind::Attitude`].
    Attitude(AttitudeRecord),
    /// See [`RecordKind::Navigation1`].
    Navigation1(NavigationRecord),
    /// See [`RecordKind::Navigation2`].
    Navigation2(NavigationRecord),
    /// See [`RecordKind::Navigation3`].
    Navigation3(NavigationRecord),
    /// See [`RecordKind::SoundSpeedProfile`].
    SoundSpeedProfile(SoundSpeedProfileRecord),
    /// See [`RecordKind::Bathymetry`].
    Bathymetry(BathymetryRecord),
    /// See [`RecordKind::RawBeam1`].
    RawBeam1(RawBeamRecord),
    /// See [`RecordKind::RawBeam2`].
    RawBeam2(RawBeamRecord),
    /// See [`RecordKind::RawBeam3`].
    RawBeam3(RawBeamRecord),
    /// See [`RecordKind::Sidescan`].
    Sidescan(SidescanRecord),
    /// See [`RecordKind::WaterColumn`].
    WaterColumn(WaterColumnRecord),
    /// See [`RecordKind::SensorParameters`].
    SensorParameters(ParameterBlock),
    /// See [`RecordKind::Installation`].
    Installation(ParameterBlock),
    /// See [`RecordKind::Parameter`].
    Parameter(ParameterBlock),
    /// See [`RecordKind::Comment`].
    Comment(Timestamp, String),
    /// See [`RecordKind::RawLine`].
    RawLine(RawLineRecord),
}

impl Record {
    /// Returns the discriminant for this record.
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Start(_) => RecordKind::Start,
            Record::Stop(_) => RecordKind::Stop,
            Record::RunParameter(_) => RecordKind::RunParameter,
            Record::Clock(_) => RecordKind::Clock,
            Record::Tide(_) => RecordKind::Tide,
            Record::Height(_) => RecordKind::Height,
            Record::Heading(_) => RecordKind::Heading,
            Record::SoundSpeed(_) => RecordKind::SoundSpeed,
            Record::Tilt(_) => RecordKind::Tilt,
            Record::Attitude(_) => RecordKind::Attitude,
            Record::Navigation1(_) => RecordKind::Navigation1,
            Record::Navigation2(_) => RecordKind::Navigation2,
            Record::Navigation3(_) => RecordKind::Navigation3,
            Record::SoundSpeedProfile(_) => RecordKind::SoundSpeedProfile,
            Record::Bathymetry(_) => RecordKind::Bathymetry,
            Record::RawBeam1(_) => RecordKind::RawBeam1,
            Record::RawBeam2(_) => RecordKind::RawBeam2,
            Record::RawBeam3(_) => RecordKind::RawBeam3,
            Record::Sidescan(_) => RecordKind::Sidescan,
            Record::WaterColumn(_) => RecordKind::WaterColumn,
            Record::SensorParameters(_) => RecordKind::SensorParameters,
            Record::Installation(_) => RecordKind::Installation,
            Record::Parameter(_) => RecordKind::Parameter,
            Record::Comment(..) => RecordKind::Comment,
            Record::RawLine(_) => RecordKind::RawLine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beam_flag_default_is_none() {
        assert_eq!(BeamFlag::default(), BeamFlag::None);
        assert!(!BeamFlag::None.is_flagged());
        assert!(BeamFlag::Null.is_flagged());
        assert!(BeamFlag::Flagged(FlagReason::Sonar).is_flagged());
    }

    #[test]
    fn record_kind_matches_variant() {
        let block = ParameterBlock::default();
        assert_eq!(Record::Start(block).kind(), RecordKind::Start);
    }
}
