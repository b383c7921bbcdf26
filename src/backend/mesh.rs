//! Dense face-mesh landmark backend.

use nalgebra::Point2;

use super::{LandmarkBackend, LandmarkObservation};
use crate::constants::{MESH_KEY_INDICES, NUM_KEY_LANDMARKS};
use crate::video::Frame;
use crate::{Error, Result};

/// One landmark as reported by a face-mesh model: x and y are fractions
/// of the frame dimensions, z is the model's relative depth.
#[derive(Debug, Clone, Copy)]
pub struct MeshLandmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// External dense face-mesh model.
///
/// The model is a black box; the backend only consumes its per-frame
/// normalized landmark list.
pub trait FaceMeshModel {
    /// Run the model on a frame; `Ok(None)` when no face is found
    ///
    /// # Errors
    ///
    /// Inference failures propagate unmodified.
    fn process(&mut self, frame: &Frame) -> Result<Option<Vec<MeshLandmark>>>;
}

/// Backend selecting the six key landmarks from a dense mesh by fixed
/// index.
pub struct MeshBackend<M> {
    model: M,
}

impl<M: FaceMeshModel> MeshBackend<M> {
    /// Wrap a face-mesh model
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

impl<M: FaceMeshModel> LandmarkBackend for MeshBackend<M> {
    fn name(&self) -> &str {
        "mesh"
    }

    fn acquire(&mut self, frame: &Frame) -> Result<Option<LandmarkObservation>> {
        let Some(landmarks) = self.model.process(frame)? else {
            return Ok(None);
        };

        let width = f64::from(frame.width);
        let height = f64::from(frame.height);
        // Whole-pixel coordinates, truncated like the reference mesh tooling.
        let all: Vec<Point2<f64>> = landmarks
            .iter()
            .map(|lm| Point2::new((lm.x * width).trunc(), (lm.y * height).trunc()))
            .collect();

        let highest = MESH_KEY_INDICES[NUM_KEY_LANDMARKS - 1];
        if all.len() <= highest {
            return Err(Error::InvalidInput(format!(
                "mesh produced {} landmarks, key index {} is out of range",
                all.len(),
                highest
            )));
        }

        let mut key = [Point2::origin(); NUM_KEY_LANDMARKS];
        for (slot, &idx) in MESH_KEY_INDICES.iter().enumerate() {
            key[slot] = all[idx];
        }

        Ok(Some(LandmarkObservation {
            frame_index: frame.index,
            key_landmarks: key,
            all_landmarks: all,
        }))
    }
}
