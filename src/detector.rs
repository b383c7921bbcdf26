//! Frame-by-frame pose acquisition state machine.
//!
//! One detector instance processes exactly one video end-to-end. Frames
//! without a detection contribute nothing to the output, so the pose
//! series is sparse and non-uniformly sampled.

use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::{Point2, Point3};

use crate::backend::{LandmarkBackend, LandmarkObservation};
use crate::camera::CameraModel;
use crate::constants::{FACE_MODEL_POINTS, NUM_KEY_LANDMARKS};
use crate::pnp;
use crate::series::PoseSample;
use crate::video::{Frame, FrameSource};
use crate::{Error, Result};

/// Lifecycle of a detector run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Not yet run
    Idle,
    /// Consuming frames
    Running,
    /// Ran to the end of the stream
    Complete,
    /// Cancelled mid-run; the pose series is truncated but usable
    Interrupted,
    /// A backend or solver error aborted the run
    Failed,
}

/// Landmarks recorded for one successfully detected frame
#[derive(Debug, Clone)]
pub struct LandmarkFrame {
    /// Decoder frame counter
    pub frame_index: u32,
    /// Frame time in seconds, `frame_index / fps`
    pub time: f64,
    /// Pose-solving landmarks, in model-point order
    pub key_landmarks: [Point2<f64>; NUM_KEY_LANDMARKS],
    /// Full landmark set for visualization
    pub all_landmarks: Vec<Point2<f64>>,
}

/// Drives frames through a landmark backend and converts detections into
/// pose samples.
pub struct PoseDetector {
    backend: Box<dyn LandmarkBackend>,
    camera: CameraModel,
    state: DetectorState,
    landmark_frames: Vec<LandmarkFrame>,
    pose: Vec<PoseSample>,
    frames: Vec<Frame>,
}

impl PoseDetector {
    /// Create an idle detector over a backend and camera model
    #[must_use]
    pub fn new(backend: Box<dyn LandmarkBackend>, camera: CameraModel) -> Self {
        Self {
            backend,
            camera,
            state: DetectorState::Idle,
            landmark_frames: Vec::new(),
            pose: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Pose samples produced by the run; empty when no frame had a
    /// detection, which is a valid outcome
    #[must_use]
    pub fn pose(&self) -> &[PoseSample] {
        &self.pose
    }

    /// Per-frame landmark records
    #[must_use]
    pub fn landmark_frames(&self) -> &[LandmarkFrame] {
        &self.landmark_frames
    }

    /// Decoded frames retained for visualization
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Camera model used for pose solving
    #[must_use]
    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    /// Process the whole video
    ///
    /// # Errors
    ///
    /// Backend and solver failures propagate and leave the detector in
    /// [`DetectorState::Failed`].
    pub fn run(&mut self, source: &mut dyn FrameSource) -> Result<()> {
        let cancel = AtomicBool::new(false);
        self.run_with_cancel(source, &cancel)
    }

    /// Process the video, checking `cancel` between frames.
    ///
    /// On cancellation the collected detections are still solved into
    /// pose samples and the detector ends in
    /// [`DetectorState::Interrupted`].
    ///
    /// # Errors
    ///
    /// Backend and solver failures propagate and leave the detector in
    /// [`DetectorState::Failed`].
    pub fn run_with_cancel(
        &mut self,
        source: &mut dyn FrameSource,
        cancel: &AtomicBool,
    ) -> Result<()> {
        if self.state != DetectorState::Idle {
            return Err(Error::InvalidInput(
                "detector already ran; create a new one to reprocess".to_string(),
            ));
        }
        self.state = DetectorState::Running;
        let fps = source.fps();
        log::info!("running {} landmark acquisition", self.backend.name());

        let mut interrupted = false;
        loop {
            if cancel.load(Ordering::Relaxed) {
                log::warn!("tracking interrupted after {} frames", self.frames.len());
                interrupted = true;
                break;
            }
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    self.state = DetectorState::Failed;
                    return Err(err);
                }
            };
            match self.backend.acquire(&frame) {
                Ok(Some(observation)) => {
                    log::debug!("frame {}: face found", frame.index);
                    self.record(observation, fps);
                }
                Ok(None) => log::debug!("frame {}: no face", frame.index),
                Err(err) => {
                    self.state = DetectorState::Failed;
                    return Err(err);
                }
            }
            self.frames.push(frame);
        }

        if !interrupted {
            match self.backend.finish() {
                Ok(pending) => {
                    for observation in pending {
                        self.record(observation, fps);
                    }
                }
                Err(err) => {
                    self.state = DetectorState::Failed;
                    return Err(err);
                }
            }
        }

        if let Err(err) = self.calculate_pose() {
            self.state = DetectorState::Failed;
            return Err(err);
        }
        self.state = if interrupted {
            DetectorState::Interrupted
        } else {
            DetectorState::Complete
        };
        log::info!(
            "{} pose samples from {} decoded frames",
            self.pose.len(),
            self.frames.len()
        );
        Ok(())
    }

    fn record(&mut self, observation: LandmarkObservation, fps: f64) {
        self.landmark_frames.push(LandmarkFrame {
            frame_index: observation.frame_index,
            time: f64::from(observation.frame_index) / fps,
            key_landmarks: observation.key_landmarks,
            all_landmarks: observation.all_landmarks,
        });
    }

    /// Solve every recorded landmark frame into a pose sample
    fn calculate_pose(&mut self) -> Result<()> {
        let model_points: Vec<Point3<f64>> = FACE_MODEL_POINTS
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();
        let negate = self.backend.negates_yaw_pitch();

        for landmark_frame in &self.landmark_frames {
            let solution = pnp::solve_pnp(
                &model_points,
                &landmark_frame.key_landmarks,
                &self.camera,
            )?;
            let rotation = pnp::rodrigues(&solution.rotation_vector);
            let projection = pnp::augment_projection(&rotation);
            let euler = pnp::decompose_projection(&projection);

            let mut yaw = euler.yaw;
            let mut pitch = pnp::normalize_pitch(euler.pitch);
            let roll = euler.roll;
            if negate {
                yaw = -yaw;
                pitch = -pitch;
            }

            self.pose.push(PoseSample {
                frame_index: landmark_frame.frame_index,
                time: landmark_frame.time,
                yaw,
                pitch,
                roll,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::BufferedSource;

    /// Backend that never sees a face
    struct BlindBackend;

    impl LandmarkBackend for BlindBackend {
        fn name(&self) -> &str {
            "blind"
        }

        fn acquire(&mut self, _frame: &Frame) -> Result<Option<LandmarkObservation>> {
            Ok(None)
        }
    }

    fn source_with_frames(count: usize, fps: f64) -> BufferedSource {
        let mut source = BufferedSource::new(fps, 64, 48).unwrap();
        for _ in 0..count {
            source.push_frame(Vec::new());
        }
        source
    }

    #[test]
    fn test_no_detections_is_a_valid_empty_run() {
        let mut detector = PoseDetector::new(Box::new(BlindBackend), CameraModel::default());
        let mut source = source_with_frames(10, 30.0);
        detector.run(&mut source).unwrap();
        assert_eq!(detector.state(), DetectorState::Complete);
        assert!(detector.pose().is_empty());
        assert_eq!(detector.frames().len(), 10);
    }

    #[test]
    fn test_detector_is_single_use() {
        let mut detector = PoseDetector::new(Box::new(BlindBackend), CameraModel::default());
        let mut source = source_with_frames(1, 30.0);
        detector.run(&mut source).unwrap();
        assert!(detector.run(&mut source).is_err());
    }

    #[test]
    fn test_cancelled_run_is_flagged_interrupted() {
        let mut detector = PoseDetector::new(Box::new(BlindBackend), CameraModel::default());
        let mut source = source_with_frames(5, 30.0);
        let cancel = AtomicBool::new(true);
        detector.run_with_cancel(&mut source, &cancel).unwrap();
        assert_eq!(detector.state(), DetectorState::Interrupted);
        assert!(detector.frames().is_empty());
    }

    #[test]
    fn test_backend_error_marks_failure() {
        struct FailingBackend;
        impl LandmarkBackend for FailingBackend {
            fn name(&self) -> &str {
                "failing"
            }
            fn acquire(&mut self, _frame: &Frame) -> Result<Option<LandmarkObservation>> {
                Err(Error::backend(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "model crashed",
                )))
            }
        }

        let mut detector = PoseDetector::new(Box::new(FailingBackend), CameraModel::default());
        let mut source = source_with_frames(3, 30.0);
        assert!(detector.run(&mut source).is_err());
        assert_eq!(detector.state(), DetectorState::Failed);
    }
}
