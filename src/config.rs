//! Analysis configuration management.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera::CameraModel;
use crate::constants::{
    DEFAULT_CUTOFF_HZ, DEFAULT_FILTER_ORDER, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH,
    DEFAULT_SAMPLE_RATE_HZ, DEFAULT_SMOOTHING_NEXT, DEFAULT_SMOOTHING_PRE,
};
use crate::filter::Butterworth;
use crate::{Error, Result};

/// Analysis run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera configuration
    pub camera: CameraConfig,

    /// Low-pass filter configuration
    pub filter: FilterConfig,

    /// Coarse-backend smoothing configuration
    pub smoothing: SmoothingConfig,

    /// IMU alignment configuration
    pub imu: ImuConfig,
}

/// Camera parameters for the uncalibrated default model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Frame width in pixels
    pub frame_width: u32,

    /// Frame height in pixels
    pub frame_height: u32,
}

/// Butterworth design parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Sampling frequency the design assumes (Hz)
    pub sample_rate_hz: f64,

    /// Low-pass cutoff frequency (Hz)
    pub cutoff_hz: f64,

    /// Filter order
    pub order: usize,
}

/// Vertex smoothing window of the coarse backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Whether the coarse backend smooths at all
    pub enabled: bool,

    /// Past frames kept in the window
    pub n_pre: usize,

    /// Future frames awaited before emitting
    pub n_next: usize,
}

/// IMU time alignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImuConfig {
    /// Seconds added to the zero-based sensor clock to align it with the
    /// video time base; determined by manual synchronization
    pub time_offset: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            filter: FilterConfig::default(),
            smoothing: SmoothingConfig::default(),
            imu: ImuConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            cutoff_hz: DEFAULT_CUTOFF_HZ,
            order: DEFAULT_FILTER_ORDER,
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            n_pre: DEFAULT_SMOOTHING_PRE,
            n_next: DEFAULT_SMOOTHING_NEXT,
        }
    }
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self { time_offset: 0.0 }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Config`] if it does not parse.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on serialization failure and
    /// [`Error::Io`] if the file cannot be written.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build the configured Butterworth filter
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unrealizable design.
    pub fn create_filter(&self) -> Result<Butterworth> {
        Butterworth::design(
            self.filter.sample_rate_hz,
            self.filter.cutoff_hz,
            self.filter.order,
        )
    }

    /// Build the default camera model for the configured frame size
    #[must_use]
    pub fn camera(&self) -> CameraModel {
        CameraModel::from_frame_size(self.camera.frame_width, self.camera.frame_height)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.camera.frame_width == 0 || self.camera.frame_height == 0 {
            return Err(Error::Config(
                "frame dimensions must be positive".to_string(),
            ));
        }
        if self.filter.order == 0 {
            return Err(Error::Config("filter order must be at least 1".to_string()));
        }
        if self.filter.sample_rate_hz <= 0.0 {
            return Err(Error::Config(
                "filter sample rate must be positive".to_string(),
            ));
        }
        if self.filter.cutoff_hz <= 0.0
            || self.filter.cutoff_hz >= 0.5 * self.filter.sample_rate_hz
        {
            return Err(Error::Config(
                "filter cutoff must sit between zero and the Nyquist frequency".to_string(),
            ));
        }
        if !self.imu.time_offset.is_finite() {
            return Err(Error::Config("IMU time offset must be finite".to_string()));
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head kinematics analysis configuration

# Uncalibrated camera model
camera:
  frame_width: 1920
  frame_height: 1080

# Zero-phase Butterworth low-pass
filter:
  sample_rate_hz: 4000.0
  cutoff_hz: 160.0
  order: 4

# Coarse-backend vertex smoothing
smoothing:
  enabled: false
  n_pre: 5
  n_next: 5

# Sensor alignment
imu:
  time_offset: -59.335
"#;
