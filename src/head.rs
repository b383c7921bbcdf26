//! Head pose aggregate deriving kinematics from a detector run.

use crate::detector::{DetectorState, PoseDetector};
use crate::filter::Butterworth;
use crate::series::{
    self, IdRegistry, KinematicSeries, PoseSample, SensorData, SensorId, TimeBase,
};
use crate::{Error, Result};

/// A tracked head: the pose series of one detector run plus the angular
/// velocity and acceleration derived from it.
pub struct Head {
    id: SensorId,
    complete: bool,
    time_base: TimeBase,
    pose: Vec<PoseSample>,
    velocity: KinematicSeries,
    acceleration: KinematicSeries,
}

impl Head {
    /// Bind a finished detector run, differentiating against sample time
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the detector has not produced
    /// results and [`Error::InsufficientData`] if the run yielded fewer
    /// than three pose samples (an all-frames-missed run is valid at the
    /// detector level but cannot be differentiated).
    pub fn from_detector(
        detector: &PoseDetector,
        registry: &mut IdRegistry,
        label: Option<&str>,
    ) -> Result<Self> {
        Self::with_time_base(detector, registry, label, TimeBase::Seconds)
    }

    /// Bind a finished detector run with an explicit derivative x-axis
    ///
    /// # Errors
    ///
    /// Same conditions as [`Head::from_detector`].
    pub fn with_time_base(
        detector: &PoseDetector,
        registry: &mut IdRegistry,
        label: Option<&str>,
        time_base: TimeBase,
    ) -> Result<Self> {
        match detector.state() {
            DetectorState::Complete | DetectorState::Interrupted => {}
            state => {
                return Err(Error::InvalidInput(format!(
                    "detector run has not produced results (state {state:?})"
                )))
            }
        }
        let pose = detector.pose().to_vec();
        if pose.len() < 3 {
            return Err(Error::InsufficientData(format!(
                "{} pose samples, head kinematics need at least 3",
                pose.len()
            )));
        }

        let mut head = Self {
            id: registry.assign(label),
            complete: detector.state() == DetectorState::Complete,
            time_base,
            pose,
            velocity: KinematicSeries::default(),
            acceleration: KinematicSeries::default(),
        };
        head.calculate_kinematics()?;
        Ok(head)
    }

    /// Pose samples backing the kinematics
    #[must_use]
    pub fn pose(&self) -> &[PoseSample] {
        &self.pose
    }

    /// Whether the source run finished without interruption
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Replace each pose axis with its zero-phase filtered series and
    /// re-derive the kinematics.
    ///
    /// Each call filters the current pose, so applying a filter twice
    /// filters twice; callers apply exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterLength`] if the pose series is shorter than
    /// the filter's settle length.
    pub fn apply_filter(&mut self, filter: &Butterworth) -> Result<()> {
        let yaw: Vec<f64> = self.pose.iter().map(|s| s.yaw).collect();
        let pitch: Vec<f64> = self.pose.iter().map(|s| s.pitch).collect();
        let roll: Vec<f64> = self.pose.iter().map(|s| s.roll).collect();

        let yaw = filter.apply(&yaw)?;
        let pitch = filter.apply(&pitch)?;
        let roll = filter.apply(&roll)?;
        // Pose samples are finite by construction, so the filtered series
        // keep their length and the time axis needs no realignment.
        if yaw.len() != self.pose.len() {
            return Err(Error::InvalidInput(
                "filtered series diverged from the pose length".to_string(),
            ));
        }

        for (i, sample) in self.pose.iter_mut().enumerate() {
            sample.yaw = yaw[i];
            sample.pitch = pitch[i];
            sample.roll = roll[i];
        }
        self.calculate_kinematics()
    }

    /// Subtract the first sample from every sample, per axis.
    ///
    /// Applied once after the full sequence is known; a constant shift
    /// leaves the derivatives unchanged.
    pub fn zero_offset(&mut self) {
        let Some(first) = self.pose.first().copied() else {
            return;
        };
        for sample in &mut self.pose {
            sample.yaw -= first.yaw;
            sample.pitch -= first.pitch;
            sample.roll -= first.roll;
        }
    }

    fn calculate_kinematics(&mut self) -> Result<()> {
        let axis: Vec<f64> = match self.time_base {
            TimeBase::Seconds => self.pose.iter().map(|s| s.time).collect(),
            TimeBase::Frames => self.pose.iter().map(|s| f64::from(s.frame_index)).collect(),
        };
        let yaw: Vec<f64> = self.pose.iter().map(|s| s.yaw).collect();
        let pitch: Vec<f64> = self.pose.iter().map(|s| s.pitch).collect();
        let roll: Vec<f64> = self.pose.iter().map(|s| s.roll).collect();

        let (velocity, acceleration) = series::derive_kinematics(&axis, &yaw, &pitch, &roll)?;
        self.velocity = velocity;
        self.acceleration = acceleration;
        Ok(())
    }
}

impl SensorData for Head {
    fn id(&self) -> &SensorId {
        &self.id
    }

    fn velocity(&self) -> &KinematicSeries {
        &self.velocity
    }

    fn acceleration(&self) -> &KinematicSeries {
        &self.acceleration
    }
}
