//! Pinhole camera model consumed by the pose solver.

use nalgebra::{Matrix3, Vector4};

use crate::calibration::{Calibrator, CornerFinder};
use crate::constants::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, FOCAL_LENGTH_FACTOR};
use crate::video::FrameSource;
use crate::Result;

/// Intrinsic parameters of a physical camera.
///
/// A default model is synthesized from the frame dimensions; a calibrated
/// model is obtained once per camera via [`CameraModel::calibrate`] and is
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    intrinsic_matrix: Matrix3<f64>,
    distortion: Vector4<f64>,
    calibrated: bool,
}

impl CameraModel {
    /// Synthesize an uncalibrated model for the given frame dimensions.
    ///
    /// The focal length is approximated as a fixed fraction of the frame
    /// height and the principal point sits at the frame centre; lens
    /// distortion is assumed negligible.
    #[must_use]
    pub fn from_frame_size(width: u32, height: u32) -> Self {
        let focal = FOCAL_LENGTH_FACTOR * f64::from(height);
        let intrinsic_matrix = Matrix3::new(
            focal,
            0.0,
            f64::from(width) / 2.0,
            0.0,
            focal,
            f64::from(height) / 2.0,
            0.0,
            0.0,
            1.0,
        );
        Self {
            intrinsic_matrix,
            distortion: Vector4::zeros(),
            calibrated: false,
        }
    }

    /// Build a model from previously fitted intrinsics
    #[must_use]
    pub fn from_calibration(intrinsic_matrix: Matrix3<f64>, distortion: Vector4<f64>) -> Self {
        Self {
            intrinsic_matrix,
            distortion,
            calibrated: true,
        }
    }

    /// Calibrate against a checkerboard video.
    ///
    /// Drives the calibration video through the corner-finding
    /// collaborator until enough detections are collected, then replaces
    /// the synthetic intrinsics with the fitted ones.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Calibration`] if the video ends before the
    /// required number of checkerboard detections.
    pub fn calibrate(
        &mut self,
        pattern: (usize, usize),
        source: &mut dyn FrameSource,
        finder: &mut dyn CornerFinder,
    ) -> Result<()> {
        let mut calibrator = Calibrator::new(pattern);
        let (matrix, distortion) = calibrator.run(source, finder)?;
        self.intrinsic_matrix = matrix;
        self.distortion = distortion;
        self.calibrated = true;
        Ok(())
    }

    /// 3×3 intrinsic matrix
    #[must_use]
    pub fn intrinsic_matrix(&self) -> &Matrix3<f64> {
        &self.intrinsic_matrix
    }

    /// Distortion coefficients `[k1, k2, p1, p2]`
    #[must_use]
    pub fn distortion(&self) -> &Vector4<f64> {
        &self.distortion
    }

    /// Whether the intrinsics come from calibration rather than the
    /// frame-size heuristic
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Focal length in pixels
    #[must_use]
    pub fn focal_length(&self) -> f64 {
        self.intrinsic_matrix[(0, 0)]
    }

    /// Principal point as `(cx, cy)`
    #[must_use]
    pub fn principal_point(&self) -> (f64, f64) {
        (self.intrinsic_matrix[(0, 2)], self.intrinsic_matrix[(1, 2)])
    }
}

impl Default for CameraModel {
    fn default() -> Self {
        Self::from_frame_size(DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT)
    }
}
