//! Shared time-series types and the finite-difference engine.
//!
//! Pose and sensor streams are sparse: a missed detection leaves a gap in
//! the time axis rather than a placeholder sample. Every derivative here
//! therefore divides by the actual elapsed interval between retained
//! samples, never by an assumed frame period.

use std::fmt;

use crate::{Error, Result};

/// One pose estimate tied to the frame it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    /// Decoder frame counter of the source frame
    pub frame_index: u32,
    /// Frame time in seconds (`frame_index / fps`)
    pub time: f64,
    /// Yaw in degrees
    pub yaw: f64,
    /// Pitch in degrees
    pub pitch: f64,
    /// Roll in degrees
    pub roll: f64,
}

/// X-axis used when differentiating a pose series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeBase {
    /// Seconds; derivatives come out in degrees per second
    #[default]
    Seconds,
    /// Frame indices; derivatives come out in degrees per frame
    Frames,
}

/// Equal-length time and per-axis value vectors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KinematicSeries {
    /// Sample times (or frame indices, see [`TimeBase`])
    pub time: Vec<f64>,
    /// Yaw-axis values
    pub yaw: Vec<f64>,
    /// Pitch-axis values
    pub pitch: Vec<f64>,
    /// Roll-axis values
    pub roll: Vec<f64>,
}

impl KinematicSeries {
    /// Number of samples in the series
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the series holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// First-order finite difference of `values` against `times`.
///
/// The output has one sample fewer than the input.
///
/// # Errors
///
/// Returns [`Error::InsufficientData`] for fewer than two samples and
/// [`Error::InvalidInput`] on mismatched lengths or a repeated timestamp.
pub fn differentiate(values: &[f64], times: &[f64]) -> Result<Vec<f64>> {
    if values.len() != times.len() {
        return Err(Error::InvalidInput(format!(
            "{} values against {} timestamps",
            values.len(),
            times.len()
        )));
    }
    if values.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "{} samples, differentiation needs at least 2",
            values.len()
        )));
    }
    let mut derivative = Vec::with_capacity(values.len() - 1);
    for i in 1..values.len() {
        let dt = times[i] - times[i - 1];
        if dt == 0.0 {
            return Err(Error::InvalidInput(format!(
                "repeated timestamp {} at sample {i}",
                times[i]
            )));
        }
        derivative.push((values[i] - values[i - 1]) / dt);
    }
    Ok(derivative)
}

/// Differentiate a pose-aligned axis triple twice, producing the velocity
/// and acceleration series.
///
/// Velocity takes the pose time axis shifted by one sample; acceleration
/// takes velocity's own axis shifted again, so for `n` pose samples the
/// lengths are `n - 1` and `n - 2`.
///
/// # Errors
///
/// Returns [`Error::InsufficientData`] for fewer than three samples.
pub fn derive_kinematics(
    time: &[f64],
    yaw: &[f64],
    pitch: &[f64],
    roll: &[f64],
) -> Result<(KinematicSeries, KinematicSeries)> {
    if time.len() < 3 {
        return Err(Error::InsufficientData(format!(
            "{} samples, velocity and acceleration need at least 3",
            time.len()
        )));
    }
    let velocity = KinematicSeries {
        time: time[1..].to_vec(),
        yaw: differentiate(yaw, time)?,
        pitch: differentiate(pitch, time)?,
        roll: differentiate(roll, time)?,
    };
    let acceleration = KinematicSeries {
        time: velocity.time[1..].to_vec(),
        yaw: differentiate(&velocity.yaw, &velocity.time)?,
        pitch: differentiate(&velocity.pitch, &velocity.time)?,
        roll: differentiate(&velocity.roll, &velocity.time)?,
    };
    Ok((velocity, acceleration))
}

/// Identifier of a kinematic data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorId {
    /// Assigned from an [`IdRegistry`] counter
    Auto(u32),
    /// Supplied by the caller
    Label(String),
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto(n) => write!(f, "{n}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// Explicit id counter owned by the caller.
///
/// An explicit label does not consume the counter, so automatic ids stay
/// dense regardless of how many labelled sources are interleaved.
#[derive(Debug)]
pub struct IdRegistry {
    next: u32,
}

impl IdRegistry {
    /// Fresh registry; the first automatic id is 1
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Hand out the supplied label, or the next automatic id
    pub fn assign(&mut self, label: Option<&str>) -> SensorId {
        match label {
            Some(label) => SensorId::Label(label.to_string()),
            None => {
                let id = SensorId::Auto(self.next);
                self.next += 1;
                id
            }
        }
    }
}

impl Default for IdRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Common contract of head-derived and IMU-derived kinematics, consumed
/// by comparison tooling.
pub trait SensorData {
    /// Identifier of the source
    fn id(&self) -> &SensorId;
    /// Angular velocity per axis
    fn velocity(&self) -> &KinematicSeries;
    /// Angular acceleration per axis
    fn acceleration(&self) -> &KinematicSeries;
}
