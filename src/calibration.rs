//! Checkerboard calibration driving loop and intrinsics persistence.
//!
//! Corner detection and the camera-matrix fit itself are external
//! collaborators behind [`CornerFinder`]; this module owns the frame loop,
//! the minimum-detection bookkeeping and the plain-text output files.

use std::fs;
use std::path::Path;

use nalgebra::{Matrix3, Point2, Point3, Vector4};

use crate::constants::MIN_CALIBRATION_DETECTIONS;
use crate::video::{Frame, FrameSource};
use crate::{Error, Result};

/// File name of the persisted 3×3 intrinsic matrix
pub const CAMERA_MATRIX_FILE: &str = "camera_matrix.csv";
/// File name of the persisted distortion coefficients
pub const CAMERA_DISTORTION_FILE: &str = "camera_distortion.csv";

/// External corner-detection and intrinsics-fitting collaborator
pub trait CornerFinder {
    /// Locate the checkerboard's inner corners in a frame.
    ///
    /// Returns `Ok(None)` when the pattern is not fully visible.
    fn find_corners(
        &mut self,
        frame: &Frame,
        pattern: (usize, usize),
    ) -> Result<Option<Vec<Point2<f64>>>>;

    /// Fit the intrinsic matrix and distortion coefficients from the
    /// collected correspondences.
    fn fit(
        &mut self,
        object_points: &[Vec<Point3<f64>>],
        image_points: &[Vec<Point2<f64>>],
        image_size: (u32, u32),
    ) -> Result<(Matrix3<f64>, Vector4<f64>)>;
}

/// Planar checkerboard target plus the correspondences collected so far
pub struct Checkerboard {
    pattern: (usize, usize),
    object_points: Vec<Vec<Point3<f64>>>,
    image_points: Vec<Vec<Point2<f64>>>,
}

impl Checkerboard {
    /// Describe a target with `pattern` inner corners per row and column
    #[must_use]
    pub fn new(pattern: (usize, usize)) -> Self {
        Self {
            pattern,
            object_points: Vec::new(),
            image_points: Vec::new(),
        }
    }

    /// Planar corner grid in board units, z = 0, x varying fastest
    fn grid(&self) -> Vec<Point3<f64>> {
        let (cols, rows) = self.pattern;
        let mut points = Vec::with_capacity(cols * rows);
        for y in 0..rows {
            for x in 0..cols {
                points.push(Point3::new(x as f64, y as f64, 0.0));
            }
        }
        points
    }

    /// Record one frame's detected corners
    pub fn record(&mut self, corners: Vec<Point2<f64>>) {
        self.object_points.push(self.grid());
        self.image_points.push(corners);
    }

    /// Number of frames with recorded detections
    #[must_use]
    pub fn detections(&self) -> usize {
        self.image_points.len()
    }
}

/// Drives a calibration video through a [`CornerFinder`]
pub struct Calibrator {
    checkerboard: Checkerboard,
}

impl Calibrator {
    /// Create a calibrator for the given checkerboard pattern
    #[must_use]
    pub fn new(pattern: (usize, usize)) -> Self {
        Self {
            checkerboard: Checkerboard::new(pattern),
        }
    }

    /// Consume frames until enough checkerboard detections are collected,
    /// then ask the collaborator for the fitted intrinsics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Calibration`] if the video ends before more than
    /// [`MIN_CALIBRATION_DETECTIONS`] frames contained the pattern.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        finder: &mut dyn CornerFinder,
    ) -> Result<(Matrix3<f64>, Vector4<f64>)> {
        let image_size = source.frame_size();
        let pattern = self.checkerboard.pattern;
        log::info!(
            "calibrating against a {}x{} checkerboard",
            pattern.0,
            pattern.1
        );
        while let Some(frame) = source.next_frame()? {
            if let Some(corners) = finder.find_corners(&frame, pattern)? {
                self.checkerboard.record(corners);
                log::debug!(
                    "frame {}: checkerboard detections now {}",
                    frame.index,
                    self.checkerboard.detections()
                );
                if self.checkerboard.detections() > MIN_CALIBRATION_DETECTIONS {
                    log::info!(
                        "fitting intrinsics from {} checkerboard views",
                        self.checkerboard.detections()
                    );
                    return finder.fit(
                        &self.checkerboard.object_points,
                        &self.checkerboard.image_points,
                        image_size,
                    );
                }
            }
        }
        Err(Error::Calibration(format!(
            "video ended after {} checkerboard detections, need more than {}",
            self.checkerboard.detections(),
            MIN_CALIBRATION_DETECTIONS
        )))
    }
}

/// Persist fitted intrinsics as two comma-delimited text files in `dir`
///
/// # Errors
///
/// Returns [`Error::Io`] if either file cannot be written.
pub fn save_intrinsics<P: AsRef<Path>>(
    dir: P,
    matrix: &Matrix3<f64>,
    distortion: &Vector4<f64>,
) -> Result<()> {
    let dir = dir.as_ref();
    let mut rows = String::new();
    for r in 0..3 {
        let row: Vec<String> = (0..3).map(|c| matrix[(r, c)].to_string()).collect();
        rows.push_str(&row.join(","));
        rows.push('\n');
    }
    fs::write(dir.join(CAMERA_MATRIX_FILE), rows)?;

    let mut coeffs = String::new();
    for value in distortion.iter() {
        coeffs.push_str(&value.to_string());
        coeffs.push('\n');
    }
    fs::write(dir.join(CAMERA_DISTORTION_FILE), coeffs)?;
    Ok(())
}

/// Load intrinsics previously written by [`save_intrinsics`]
///
/// # Errors
///
/// Returns [`Error::Io`] if a file is missing and
/// [`Error::InvalidInput`] if its contents do not parse.
pub fn load_intrinsics<P: AsRef<Path>>(dir: P) -> Result<(Matrix3<f64>, Vector4<f64>)> {
    let dir = dir.as_ref();
    let matrix_text = fs::read_to_string(dir.join(CAMERA_MATRIX_FILE))?;
    let values = parse_values(&matrix_text)?;
    if values.len() != 9 {
        return Err(Error::InvalidInput(format!(
            "camera matrix file holds {} values, expected 9",
            values.len()
        )));
    }
    let matrix = Matrix3::from_row_slice(&values);

    let distortion_text = fs::read_to_string(dir.join(CAMERA_DISTORTION_FILE))?;
    let values = parse_values(&distortion_text)?;
    if values.len() != 4 {
        return Err(Error::InvalidInput(format!(
            "distortion file holds {} values, expected 4",
            values.len()
        )));
    }
    let distortion = Vector4::from_row_slice(&values);
    Ok((matrix, distortion))
}

fn parse_values(text: &str) -> Result<Vec<f64>> {
    text.split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| Error::InvalidInput(format!("bad intrinsics value '{s}'")))
        })
        .collect()
}
