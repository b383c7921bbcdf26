//! Head orientation tracking from video with IMU comparison support.
//!
//! The pipeline estimates a head's yaw, pitch and roll over time from
//! facial landmarks:
//! 1. A [`video::FrameSource`] yields decoded frames in sequence.
//! 2. A landmark backend ([`backend::LandmarkBackend`]) turns each frame
//!    into an ordered landmark observation, or nothing when no face is
//!    visible — missed frames leave gaps rather than placeholders.
//! 3. The [`detector::PoseDetector`] solves a Perspective-n-Point problem
//!    per detection against a fixed 3D face model and normalizes the
//!    decomposed Euler angles.
//! 4. A [`head::Head`] differentiates the pose series into angular
//!    velocity and acceleration over the actual sample intervals, with
//!    optional zero-phase Butterworth filtering ([`filter::Butterworth`]).
//!
//! An [`imu::ImuRecord`] loads a sensor CSV onto the same
//! [`series::SensorData`] contract, so head-derived and gyroscope-derived
//! kinematics can be compared on a shared time base.
//!
//! Video decoding, the landmark models themselves and checkerboard corner
//! detection are external collaborators behind traits; the crate only
//! consumes their output contracts.
//!
//! # Examples
//!
//! Filtering and differentiating a signal:
//!
//! ```
//! use head_kinematics::filter::Butterworth;
//! use head_kinematics::series::differentiate;
//!
//! let filter = Butterworth::design(4000.0, 160.0, 4)?;
//! let times: Vec<f64> = (0..64).map(|i| f64::from(i) / 240.0).collect();
//! let signal: Vec<f64> = times.iter().map(|t| (t * 20.0).sin()).collect();
//!
//! let smoothed = filter.apply(&signal)?;
//! assert_eq!(smoothed.len(), signal.len());
//!
//! let velocity = differentiate(&smoothed, &times)?;
//! assert_eq!(velocity.len(), signal.len() - 1);
//! # Ok::<(), head_kinematics::Error>(())
//! ```

/// Landmark acquisition backends and their model contracts
pub mod backend;

/// Checkerboard calibration loop and intrinsics persistence
pub mod calibration;

/// Pinhole camera model
pub mod camera;

/// Analysis configuration management
pub mod config;

/// Constants used throughout the pipeline
pub mod constants;

/// Pose acquisition state machine
pub mod detector;

/// Error types and result handling
pub mod error;

/// Zero-phase Butterworth filtering
pub mod filter;

/// Head pose aggregate with derived kinematics
pub mod head;

/// IMU sensor records
pub mod imu;

/// Perspective-n-Point solving and Euler angle extraction
pub mod pnp;

/// Shared time-series types and differentiation
pub mod series;

/// Video frame access
pub mod video;

pub use error::{Error, Result};
