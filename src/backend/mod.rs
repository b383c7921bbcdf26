//! Landmark acquisition backends.
//!
//! Pose solving and angle normalization live once in the detector; a
//! backend's only job is to turn a decoded frame into an ordered landmark
//! observation, or `None` when no face is present.

/// Sparse 3D face-alignment backend with optional temporal smoothing
pub mod coarse;

/// Dense face-mesh backend selecting key landmarks by fixed index
pub mod mesh;

use nalgebra::Point2;

use crate::constants::NUM_KEY_LANDMARKS;
use crate::video::Frame;
use crate::Result;

/// One frame's worth of detected landmarks in pixel coordinates
#[derive(Debug, Clone)]
pub struct LandmarkObservation {
    /// Frame the landmarks belong to; a look-ahead backend may report an
    /// earlier frame than the one just consumed
    pub frame_index: u32,
    /// The six pose-solving landmarks, ordered to match
    /// [`crate::constants::FACE_MODEL_POINTS`]
    pub key_landmarks: [Point2<f64>; NUM_KEY_LANDMARKS],
    /// Full landmark set for visualization; count depends on the backend
    pub all_landmarks: Vec<Point2<f64>>,
}

/// Per-frame landmark acquisition contract shared by all backends
pub trait LandmarkBackend {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Whether yaw and pitch recovered from this backend's landmarks must
    /// be negated to match the shared sign convention
    fn negates_yaw_pitch(&self) -> bool {
        false
    }

    /// Acquire landmarks for a decoded frame.
    ///
    /// `Ok(None)` means no face was found in this frame (or, for a
    /// smoothing backend, that the observation is still buffered).
    ///
    /// # Errors
    ///
    /// Model failures propagate unmodified as
    /// [`crate::Error::Backend`].
    fn acquire(&mut self, frame: &Frame) -> Result<Option<LandmarkObservation>>;

    /// Drain observations still buffered once the stream has ended
    ///
    /// # Errors
    ///
    /// Model failures propagate unmodified.
    fn finish(&mut self) -> Result<Vec<LandmarkObservation>> {
        Ok(Vec::new())
    }
}
