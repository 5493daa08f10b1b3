//! Time-indexed ancillary sensor streams and their linear interpolation.
//!
//! One generic [`Interpolator<S>`] backs every channel (navigation, attitude, heading, depth,
//! altitude); the per-channel sample types just implement [`Sample`] so the interpolator knows
//! how to blend two bracketing observations.

use crate::record::Timestamp;

/// A value an [`Interpolator`] knows how to linearly blend between two time-adjacent samples.
pub trait Sample: Copy {
    /// Returns `self * (1 - t) + other * t`, `t` in `[0, 1]`.
    fn lerp(self, other: Self, t: f64) -> Self;
}

impl Sample for f64 {
    fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }
}

/// A heading-like angle in degrees, interpolated along the shorter arc across the 0/360° seam
///.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Angle(pub f64);

impl Sample for Angle {
    fn lerp(self, other: Self, t: f64) -> Self {
        let mut delta = (other.0 - self.0) % 360.0;
        if delta > 180.0 {
            delta -= 360.0;
        } else if delta < -180.0 {
            delta += 360.0;
        }
        let mut result = self.0 + delta * t;
        result = result.rem_euclid(360.0);
        Angle(result)
    }
}

/// Roll/pitch/heave attitude sample, interpolated component-wise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttitudeSample {
    /// Roll, degrees.
    pub roll: f64,
    /// Pitch, degrees.
    pub pitch: f64,
    /// Heave, meters.
    pub heave: f64,
}

impl Sample for AttitudeSample {
    fn lerp(self, other: Self, t: f64) -> Self {
        AttitudeSample {
            roll: self.roll.lerp(other.roll, t),
            pitch: self.pitch.lerp(other.pitch, t),
            heave: self.heave.lerp(other.heave, t),
        }
    }
}

/// Navigation fix, interpolated component-wise. Longitude/latitude are treated as plain
/// Cartesian-ish degrees (the library's concern is the wire model, not geodesy); wraparound at
/// the antimeridian is explicitly out of scope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavSample {
    /// Longitude, degrees east.
    pub longitude: f64,
    /// Latitude, degrees north.
    pub latitude: f64,
    /// Speed over ground, meters/second.
    pub speed: f64,
}

impl Sample for NavSample {
    fn lerp(self, other: Self, t: f64) -> Self {
        NavSample {
            longitude: self.longitude.lerp(other.longitude, t),
            latitude: self.latitude.lerp(other.latitude, t),
            speed: self.speed.lerp(other.speed, t),
        }
    }
}

/// Result of an interpolation query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interpolated<S> {
    /// A value was found, either interpolated or extrapolated within the allowed gap.
    Value(S),
    /// The query time fell outside the stored range by more than the allowed extrapolation gap,
    /// or the stream has no samples at all.
    NoData,
}

impl<S> Interpolated<S> {
    /// Returns the inner value, or `None` for `NoData`.
    pub fn value(self) -> Option<S> {
        match self {
            Interpolated::Value(v) => Some(v),
            Interpolated::NoData => None,
        }
    }
}

/// A bounded, time-ordered history of one sensor channel with linear interpolation.
#[derive(Clone, Debug)]
pub struct Interpolator<S: Sample> {
    samples: Vec<(Timestamp, S)>,
    window: usize,
    max_extrapolation: chrono::Duration,
}

impl<S: Sample> Interpolator<S> {
    /// Creates an interpolator bounded to `window` samples, extrapolating at most
    /// `max_extrapolation_secs` seconds beyond the stored range.
    pub fn new(window: usize, max_extrapolation_secs: f64) -> Self {
        Interpolator {
            samples: Vec::new(),
            window: window.max(2),
            max_extrapolation: chrono::Duration::milliseconds(
                (max_extrapolation_secs * 1000.0) as i64,
            ),
        }
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if no samples are retained.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Inserts a sample. Samples normally arrive in non-decreasing time order; an out-of-order
    /// arrival is insertion-sorted into the trailing window rather than appended.
    /// The oldest sample is evicted once the window is exceeded.
    pub fn add(&mut self, time: Timestamp, value: S) {
        let position = self
            .samples
            .iter()
            .rposition(|(t, _)| *t <= time)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.samples.insert(position, (time, value));
        if self.samples.len() > self.window {
            self.samples.remove(0);
        }
    }

    /// Linearly interpolates (or bounded-extrapolates) the value at `time`.
    pub fn interp(&self, time: Timestamp) -> Interpolated<S> {
        if self.samples.is_empty() {
            return Interpolated::NoData;
        }
        if self.samples.len() == 1 {
            let (t0, v0) = self.samples[0];
            return if (time - t0).abs() <= self.max_extrapolation {
                Interpolated::Value(v0)
            } else {
                Interpolated::NoData
            };
        }
        let first = self.samples.first().expect("non-empty");
        let last = self.samples.last().expect("non-empty");
        if time < first.0 {
            return if first.0 - time <= self.max_extrapolation {
                Interpolated::Value(first.1)
            } else {
                Interpolated::NoData
            };
        }
        if time > last.0 {
            return if time - last.0 <= self.max_extrapolation {
                Interpolated::Value(last.1)
            } else {
                Interpolated::NoData
            };
        }
        let upper = self
            .samples
            .iter()
            .position(|(t, _)| *t >= time)
            .unwrap_or(self.samples.len() - 1);
        if upper == 0 {
            return Interpolated::Value(self.samples[0].1);
        }
        let (t0, v0) = self.samples[upper - 1];
        let (t1, v1) = self.samples[upper];
        if t0 == t1 {
            return Interpolated::Value(v1);
        }
        let span = (t1 - t0).num_microseconds().unwrap_or(1).max(1) as f64;
        let elapsed = (time - t0).num_microseconds().unwrap_or(0) as f64;
        let t = (elapsed / span).clamp(0.0, 1.0);
        Interpolated::Value(v0.lerp(v1, t))
    }

    /// Interpolates a batch of query times, e.g. per-beam travel-time-adjusted timestamps.
    pub fn interp_batch(&self, times: &[Timestamp]) -> Vec<Interpolated<S>> {
        times.iter().map(|t| self.interp(*t)).collect()
    }
}
