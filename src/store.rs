//! Typed, growable containers for every record variant plus the aggregated ping stream.

use crate::ping::Ping;
use crate::record::{
    AttitudeRecord, ClockRecord, HeadingRecord, HeightRecord, NavigationRecord, ParameterBlock,
    Record, RecordKind, SoundSpeedProfileRecord, SoundSpeedRecord, TideRecord, TiltRecord,
    Timestamp, RawLineRecord,
};

/// A per-beam scratch buffer that grows to the declared beam count on first use and is never
/// shrunk for the rest of the session, so repeated pings with a stable beam count allocate
/// exactly once.
#[derive(Clone, Debug, Default)]
pub struct BeamBuffer<T> {
    data: Vec<T>,
}

impl<T: Default + Clone> BeamBuffer<T> {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        BeamBuffer { data: Vec::new() }
    }

    /// Grows the buffer to at least `len`, filling new slots with `T::default()`. Never
    /// truncates an already-larger buffer.
    pub fn ensure_len(&mut self, len: usize) {
        if self.data.len() < len {
            self.data.resize(len, T::default());
        }
    }

    /// The live view of the first `len` elements.
    pub fn as_slice(&self, len: usize) -> &[T] {
        &self.data[..len.min(self.data.len())]
    }

    /// A mutable view of the first `len` elements, growing first if needed.
    pub fn as_mut_slice(&mut self, len: usize) -> &mut [T] {
        self.ensure_len(len);
        &mut self.data[..len]
    }

    /// Capacity currently allocated, independent of any particular ping's beam count.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// All decoded records for one session, grouped by kind, plus the assembled ping stream.
///
/// Formats that do not implement a given kind simply never push into the corresponding vector;
/// nothing here assumes every field is populated.
#[derive(Debug, Default)]
pub struct StoreModel {
    /// Fully assembled pings, in stream order.
    pub pings: Vec<Ping>,
    /// `Start` parameter blocks.
    pub start: Vec<ParameterBlock>,
    /// `Stop` parameter blocks.
    pub stop: Vec<ParameterBlock>,
    /// `RunParameter` blocks.
    pub run_parameters: Vec<ParameterBlock>,
    /// `Installation` blocks.
    pub installation: Vec<ParameterBlock>,
    /// `SensorParameters` blocks.
    pub sensor_parameters: Vec<ParameterBlock>,
    /// Generic `Parameter` blocks, for formats with more than one parameter-record kind.
    pub parameters: Vec<ParameterBlock>,
    /// Clock synchronization records.
    pub clock: Vec<ClockRecord>,
    /// Tide records.
    pub tide: Vec<TideRecord>,
    /// Height records.
    pub height: Vec<HeightRecord>,
    /// Heading records.
    pub heading: Vec<HeadingRecord>,
    /// Sound speed records.
    pub sound_speed: Vec<SoundSpeedRecord>,
    /// Tilt records.
    pub tilt: Vec<TiltRecord>,
    /// Attitude records.
    pub attitude: Vec<AttitudeRecord>,
    /// Primary navigation stream.
    pub navigation1: Vec<NavigationRecord>,
    /// Secondary navigation stream.
    pub navigation2: Vec<NavigationRecord>,
    /// Tertiary navigation stream.
    pub navigation3: Vec<NavigationRecord>,
    /// Sound velocity profile casts.
    pub sound_speed_profile: Vec<SoundSpeedProfileRecord>,
    /// Free-text comments, with their timestamps.
    pub comments: Vec<(Timestamp, String)>,
    /// Verbatim unrecognized payloads, preserved for lossless round-trip.
    pub raw_lines: Vec<RawLineRecord>,
}

impl StoreModel {
    /// An empty store.
    pub fn new() -> Self {
        StoreModel::default()
    }

    /// Routes a decoded ancillary record (anything other than the ping-forming sub-records,
    /// which the assembler consumes directly) into its typed container.
    pub fn push(&mut self, record: Record) {
        match record {
            Record::Start(p) => self.start.push(p),
            Record::Stop(p) => self.stop.push(p),
            Record::RunParameter(p) => self.run_parameters.push(p),
            Record::Installation(p) => self.installation.push(p),
            Record::SensorParameters(p) => self.sensor_parameters.push(p),
            Record::Parameter(p) => self.parameters.push(p),
            Record::Clock(c) => self.clock.push(c),
            Record::Tide(t) => self.tide.push(t),
            Record::Height(h) => self.height.push(h),
            Record::Heading(h) => self.heading.push(h),
            Record::SoundSpeed(s) => self.sound_speed.push(s),
            Record::Tilt(t) => self.tilt.push(t),
            Record::Attitude(a) => self.attitude.push(a),
            Record::Navigation1(n) => self.navigation1.push(n),
            Record::Navigation2(n) => self.navigation2.push(n),
            Record::Navigation3(n) => self.navigation3.push(n),
            Record::SoundSpeedProfile(s) => self.sound_speed_profile.push(s),
            Record::Comment(time, text) => self.comments.push((time, text)),
            Record::RawLine(r) => self.raw_lines.push(r),
            // Ping-forming sub-records are consumed by the assembler before reaching the store;
            // if one arrives here anyway (e.g. a caller bypassing the reader), preserve it
            // losslessly rather than silently dropping it.
            other => self.raw_lines.push(RawLineRecord {
                tag: Some(format!("{:?}", other.kind())),
                bytes: Vec::new(),
            }),
        }
    }

    /// True if `kind` is one the store routes into a dedicated container rather than the
    /// fallback `raw_lines` bucket.
    pub fn handles(kind: RecordKind) -> bool {
        !matches!(
            kind,
            RecordKind::Bathymetry
                | RecordKind::RawBeam1
                | RecordKind::RawBeam2
                | RecordKind::RawBeam3
                | RecordKind::Sidescan
                | RecordKind::WaterColumn
        )
    }
}
