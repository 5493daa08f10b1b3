//! Per-format wire codecs. Each submodule implements [`RecordCodec`] and builds a [`FormatInfo`]
//! describing the shape the reader/writer needs to generalize over.
//!
//! Picking *which* format module handles a given byte stream is an external dispatcher's job
//!; this crate only validates and wraps the capabilities of one already-
//! chosen format.

pub mod hysweep;
pub mod simrad;
pub mod wassp;

use crate::error::Result;
use crate::framer::Framer;
use crate::ping::SonarKind;
use crate::record::{Record, RecordKind};
use crate::session::SessionState;

/// Static capabilities and authoritative-record declarations for one wire format.
///
/// Assembled once per format module via [`FormatInfoBuilder`] and handed to [`register_format`],
/// mirroring the teacher's `ReaderOptions`/`WriterOptions` builder pattern.
#[derive(Clone, Debug)]
pub struct FormatInfo {
    /// Human-readable format name, for logging.
    pub name: &'static str,
    /// Largest beam count any record of this format may declare.
    pub max_beams: u16,
    /// Largest beam count for which amplitude is carried (may be smaller than `max_beams`).
    pub max_amplitude_beams: u16,
    /// Largest sidescan pixel count per side.
    pub max_sidescan_pixels: u32,
    /// Whether beam count varies ping to ping (vs. a fixed array size).
    pub beams_variable: bool,
    /// Whether per-beam two-way travel time is carried directly (vs. only range).
    pub carries_travel_time: bool,
    /// Default along-track beamwidth, degrees, when the wire record omits it.
    pub beamwidth_along_deg: f32,
    /// Default across-track beamwidth, degrees, when the wire record omits it.
    pub beamwidth_across_deg: f32,
    /// Sonar topology (single vs. dual head) this format's assembler should assume.
    pub sonar_kind: SonarKind,
    /// Whether a head is only complete once its raw-beam sub-record has arrived, not just its
    /// bathymetry header. `false` for every format module in this crate today; exists so a
    /// future format with a mandatory raw-beam sub-record can declare it without changing the
    /// assembler.
    pub requires_raw_beams: bool,
    /// Which record kind is authoritative for navigation.
    pub authoritative_nav: RecordKind,
    /// Which record kind is authoritative for attitude.
    pub authoritative_attitude: RecordKind,
    /// Which record kind is authoritative for heading.
    pub authoritative_heading: RecordKind,
    /// Which record kind is authoritative for transducer depth.
    pub authoritative_depth: RecordKind,
    /// Which record kind is authoritative for the sound velocity profile.
    pub authoritative_svp: RecordKind,
    /// Which record kind is authoritative for platform/installation offsets.
    pub authoritative_platform: RecordKind,
    /// Sonar-specific quality threshold below which a beam is flagged. `None` if this format's quality scale has
    /// no documented threshold.
    pub quality_threshold: Option<u8>,
}

/// Builds a [`FormatInfo`] with sensible defaults, overridden field by field.
pub struct FormatInfoBuilder {
    info: FormatInfo,
}

impl FormatInfoBuilder {
    /// Starts a builder for a format named `name`.
    pub fn new(name: &'static str) -> Self {
        FormatInfoBuilder {
            info: FormatInfo {
                name,
                max_beams: 256,
                max_amplitude_beams: 256,
                max_sidescan_pixels: 0,
                beams_variable: true,
                carries_travel_time: false,
                beamwidth_along_deg: 1.0,
                beamwidth_across_deg: 1.0,
                sonar_kind: SonarKind::Single,
                requires_raw_beams: false,
                authoritative_nav: RecordKind::Navigation1,
                authoritative_attitude: RecordKind::Attitude,
                authoritative_heading: RecordKind::Heading,
                authoritative_depth: RecordKind::Height,
                authoritative_svp: RecordKind::SoundSpeedProfile,
                authoritative_platform: RecordKind::Installation,
                quality_threshold: None,
            },
        }
    }

    /// Sets the largest beam count any record may declare.
    pub fn max_beams(mut self, value: u16) -> Self {
        self.info.max_beams = value;
        self
    }

    /// Sets the largest beam count for which amplitude is carried.
    pub fn max_amplitude_beams(mut self, value: u16) -> Self {
        self.info.max_amplitude_beams = value;
        self
    }

    /// Sets the largest sidescan pixel count per side.
    pub fn max_sidescan_pixels(mut self, value: u32) -> Self {
        self.info.max_sidescan_pixels = value;
        self
    }

    /// Sets whether beam count varies ping to ping.
    pub fn beams_variable(mut self, value: bool) -> Self {
        self.info.beams_variable = value;
        self
    }

    /// Sets whether per-beam travel time is carried directly.
    pub fn carries_travel_time(mut self, value: bool) -> Self {
        self.info.carries_travel_time = value;
        self
    }

    /// Sets the default along/across beamwidths, degrees.
    pub fn default_beamwidths(mut self, along_deg: f32, across_deg: f32) -> Self {
        self.info.beamwidth_along_deg = along_deg;
        self.info.beamwidth_across_deg = across_deg;
        self
    }

    /// Sets the sonar topology.
    pub fn sonar_kind(mut self, kind: SonarKind) -> Self {
        self.info.sonar_kind = kind;
        self
    }

    /// Declares that a head is not complete until its raw-beam sub-record has arrived.
    pub fn requires_raw_beams(mut self, value: bool) -> Self {
        self.info.requires_raw_beams = value;
        self
    }

    /// Sets which record kind is authoritative for navigation.
    pub fn authoritative_nav(mut self, kind: RecordKind) -> Self {
        self.info.authoritative_nav = kind;
        self
    }

    /// Sets which record kind is authoritative for attitude.
    pub fn authoritative_attitude(mut self, kind: RecordKind) -> Self {
        self.info.authoritative_attitude = kind;
        self
    }

    /// Sets which record kind is authoritative for heading.
    pub fn authoritative_heading(mut self, kind: RecordKind) -> Self {
        self.info.authoritative_heading = kind;
        self
    }

    /// Sets which record kind is authoritative for transducer depth.
    pub fn authoritative_depth(mut self, kind: RecordKind) -> Self {
        self.info.authoritative_depth = kind;
        self
    }

    /// Sets which record kind is authoritative for the sound velocity profile.
    pub fn authoritative_svp(mut self, kind: RecordKind) -> Self {
        self.info.authoritative_svp = kind;
        self
    }

    /// Sets which record kind is authoritative for platform/installation offsets.
    pub fn authoritative_platform(mut self, kind: RecordKind) -> Self {
        self.info.authoritative_platform = kind;
        self
    }

    /// Sets the sonar-specific quality threshold below which a beam is flagged.
    pub fn quality_threshold(mut self, value: u8) -> Self {
        self.info.quality_threshold = Some(value);
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> FormatInfo {
        self.info
    }
}

/// An opaque handle to a validated, registered format, returned by [`register_format`].
#[derive(Clone, Debug)]
pub struct FormatHandle {
    info: FormatInfo,
}

impl FormatHandle {
    /// The format's declared capabilities.
    pub fn info(&self) -> &FormatInfo {
        &self.info
    }
}

/// Validates and wraps a format's capabilities. Does not dispatch file selection — that
/// remains an external collaborator's responsibility.
pub fn register_format(info: FormatInfo) -> FormatHandle {
    FormatHandle { info }
}

/// One encode/decode pair per record kind a format module supports.
///
/// `decode_next` advances `framer` past exactly one record (performing resync internally if the
/// label at the current offset is invalid) and returns the decoded [`Record`]. `encode` appends
/// one record's wire bytes to `out`.
pub trait RecordCodec {
    /// Decodes the next record from `framer`, updating `session` as needed (byte-order
    /// resolution, continuation state, ...).
    fn decode_next(&mut self, framer: &mut Framer, session: &mut SessionState) -> Result<Record>;

    /// Encodes `record` onto the end of `out`. Returns `Error::BadKind` if this format does not
    /// support writing `record`'s kind.
    fn encode(&self, record: &Record, out: &mut Vec<u8>, session: &mut SessionState) -> Result<()>;
}
