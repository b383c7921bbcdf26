//! Sparse 3D face-alignment backend.
//!
//! The model reconstructs a 68-point 3D landmark set per frame. Key
//! landmarks come from the standard 68-point anatomical indices; the full
//! landmark set is reduced to a bounding quadrilateral (top, bottom,
//! left, right extremes of the vertex cloud) for visualization. An
//! optional smoothing mode averages the raw vertex clouds over a sliding
//! window before any landmark extraction, which delays emission by the
//! look-ahead depth.

use std::collections::VecDeque;

use nalgebra::{Point2, Point3};

use super::{LandmarkBackend, LandmarkObservation};
use crate::constants::{
    DEFAULT_SMOOTHING_NEXT, DEFAULT_SMOOTHING_PRE, NUM_KEY_LANDMARKS, SPARSE_KEY_INDICES,
};
use crate::video::Frame;
use crate::{Error, Result};

/// External sparse face-alignment model.
///
/// Coordinates are image-space: x and y in pixels, z at the model's own
/// scale.
pub trait FaceAlignmentModel {
    /// Reconstruct the 3D landmark set for a frame; `Ok(None)` when no
    /// face is found
    ///
    /// # Errors
    ///
    /// Inference failures propagate unmodified.
    fn reconstruct(&mut self, frame: &Frame) -> Result<Option<Vec<Point3<f64>>>>;
}

/// Moving-average state over reconstructed vertex clouds
struct Smoothing {
    n_pre: usize,
    n_next: usize,
    window: VecDeque<(u32, Vec<Point3<f64>>)>,
}

impl Smoothing {
    fn capacity(&self) -> usize {
        self.n_pre + self.n_next + 1
    }

    /// Average the window and report the centre frame's index
    fn emit(&mut self) -> Result<(u32, Vec<Point3<f64>>)> {
        let count = self.window.front().map_or(0, |(_, v)| v.len());
        let mut sum = vec![Point3::origin(); count];
        for (_, vertices) in &self.window {
            if vertices.len() != count {
                return Err(Error::InvalidInput(format!(
                    "vertex count changed mid-stream: {} then {}",
                    count,
                    vertices.len()
                )));
            }
            for (acc, v) in sum.iter_mut().zip(vertices) {
                acc.coords += v.coords;
            }
        }
        let scale = 1.0 / self.window.len() as f64;
        for acc in &mut sum {
            acc.coords *= scale;
        }
        let centre = self.window[self.n_pre].0;
        self.window.pop_front();
        Ok((centre, sum))
    }
}

/// Backend over a sparse 3D alignment model
pub struct CoarseBackend<M> {
    model: M,
    smoothing: Option<Smoothing>,
}

impl<M: FaceAlignmentModel> CoarseBackend<M> {
    /// Wrap a model without temporal smoothing
    pub fn new(model: M) -> Self {
        Self {
            model,
            smoothing: None,
        }
    }

    /// Wrap a model with vertex smoothing over `n_pre` past and `n_next`
    /// future frames around each emitted frame
    pub fn with_smoothing(model: M, n_pre: usize, n_next: usize) -> Self {
        Self {
            model,
            smoothing: Some(Smoothing {
                n_pre,
                n_next,
                window: VecDeque::with_capacity(n_pre + n_next + 1),
            }),
        }
    }

    /// Smoothing with the default window
    pub fn with_default_smoothing(model: M) -> Self {
        Self::with_smoothing(model, DEFAULT_SMOOTHING_PRE, DEFAULT_SMOOTHING_NEXT)
    }

    fn observation(frame_index: u32, vertices: &[Point3<f64>]) -> Result<LandmarkObservation> {
        let highest = SPARSE_KEY_INDICES.iter().copied().max().unwrap_or(0);
        if vertices.len() <= highest {
            return Err(Error::InvalidInput(format!(
                "alignment model produced {} vertices, key index {} is out of range",
                vertices.len(),
                highest
            )));
        }

        let mut key = [Point2::origin(); NUM_KEY_LANDMARKS];
        for (slot, &idx) in SPARSE_KEY_INDICES.iter().enumerate() {
            key[slot] = Point2::new(vertices[idx].x, vertices[idx].y);
        }

        // Bounding quadrilateral of the cloud: top, bottom, left, right.
        let mut top = vertices[0];
        let mut bottom = vertices[0];
        let mut left = vertices[0];
        let mut right = vertices[0];
        for v in vertices {
            if v.y < top.y {
                top = *v;
            }
            if v.y > bottom.y {
                bottom = *v;
            }
            if v.x < left.x {
                left = *v;
            }
            if v.x > right.x {
                right = *v;
            }
        }
        let all_landmarks = vec![
            Point2::new(top.x, top.y),
            Point2::new(bottom.x, bottom.y),
            Point2::new(left.x, left.y),
            Point2::new(right.x, right.y),
        ];

        Ok(LandmarkObservation {
            frame_index,
            key_landmarks: key,
            all_landmarks,
        })
    }
}

impl<M: FaceAlignmentModel> LandmarkBackend for CoarseBackend<M> {
    fn name(&self) -> &str {
        "coarse"
    }

    fn negates_yaw_pitch(&self) -> bool {
        true
    }

    fn acquire(&mut self, frame: &Frame) -> Result<Option<LandmarkObservation>> {
        let Some(vertices) = self.model.reconstruct(frame)? else {
            return Ok(None);
        };

        let Some(smoothing) = self.smoothing.as_mut() else {
            return Self::observation(frame.index, &vertices).map(Some);
        };

        // The first detection also seeds the look-back padding.
        if smoothing.window.is_empty() {
            for _ in 0..smoothing.n_pre {
                smoothing.window.push_back((frame.index, vertices.clone()));
            }
        }
        smoothing.window.push_back((frame.index, vertices));

        if smoothing.window.len() >= smoothing.capacity() {
            let (centre, averaged) = smoothing.emit()?;
            return Self::observation(centre, &averaged).map(Some);
        }
        Ok(None)
    }

    fn finish(&mut self) -> Result<Vec<LandmarkObservation>> {
        let Some(smoothing) = self.smoothing.as_mut() else {
            return Ok(Vec::new());
        };
        // Pad the tail with the last detection so the remaining centres
        // each get a full-width (truncated-content) window.
        let Some(last) = smoothing.window.back().map(|(idx, v)| (*idx, v.clone())) else {
            return Ok(Vec::new());
        };
        for _ in 0..smoothing.n_next {
            smoothing.window.push_back(last.clone());
        }

        let mut drained = Vec::new();
        while smoothing.window.len() >= smoothing.capacity() {
            let (centre, averaged) = smoothing.emit()?;
            drained.push(Self::observation(centre, &averaged)?);
        }
        smoothing.window.clear();
        Ok(drained)
    }
}
