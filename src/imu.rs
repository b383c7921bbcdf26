//! IMU sensor records loaded from fixed-format CSV exports.
//!
//! The export has 13 positional columns; the header row is skipped and
//! column names are ignored. The gyroscope already reports angular rates,
//! so velocity comes straight from the file with no differentiation, and
//! the accelerometer columns populate the acceleration series likewise.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::filter::Butterworth;
use crate::series::{IdRegistry, KinematicSeries, SensorData, SensorId};
use crate::{Error, Result};

/// Column count of the sensor export:
/// `sensor, received time, sample number, sample time, accelX..Z,
/// gyroX..Z, magX..Z`
const IMU_COLUMNS: usize = 13;
const COL_SAMPLE_TIME: usize = 3;
const COL_ACCEL_X: usize = 4;
const COL_GYRO_X: usize = 7;

/// One retained sensor row, already reduced to the columns the pipeline
/// consumes
#[derive(Debug, Clone, Copy)]
struct ImuRow {
    sample_time: f64,
    accel: [f64; 3],
    gyro: [f64; 3],
}

/// A head-mounted IMU recording aligned to the video time base
pub struct ImuRecord {
    id: SensorId,
    time_offset: f64,
    velocity: KinematicSeries,
    acceleration: KinematicSeries,
}

impl ImuRecord {
    /// Load a sensor CSV file.
    ///
    /// `time_offset` is the externally determined shift aligning the
    /// sensor clock with the video time base; it is added to every
    /// zero-based sample time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::InsufficientData`] if no row survives parsing.
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        time_offset: f64,
        registry: &mut IdRegistry,
        label: Option<&str>,
    ) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file), time_offset, registry, label)
    }

    /// Load a sensor CSV from any buffered reader
    ///
    /// # Errors
    ///
    /// Same conditions as [`ImuRecord::from_path`].
    pub fn from_reader<R: BufRead>(
        reader: R,
        time_offset: f64,
        registry: &mut IdRegistry,
        label: Option<&str>,
    ) -> Result<Self> {
        let mut rows: Vec<ImuRow> = Vec::new();
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            // First line is the header; columns are positional.
            if line_number == 0 || line.trim().is_empty() {
                continue;
            }
            match parse_row(&line) {
                Some(row) => rows.push(row),
                None => log::debug!("dropping unusable sensor row {}", line_number + 1),
            }
        }
        if rows.is_empty() {
            return Err(Error::InsufficientData(
                "sensor file contains no usable rows".to_string(),
            ));
        }

        let t0 = rows[0].sample_time;
        let time: Vec<f64> = rows
            .iter()
            .map(|r| r.sample_time - t0 + time_offset)
            .collect();

        let velocity = KinematicSeries {
            time: time.clone(),
            yaw: rows.iter().map(|r| r.gyro[0]).collect(),
            pitch: rows.iter().map(|r| r.gyro[1]).collect(),
            roll: rows.iter().map(|r| r.gyro[2]).collect(),
        };
        let acceleration = KinematicSeries {
            time,
            yaw: rows.iter().map(|r| r.accel[0]).collect(),
            pitch: rows.iter().map(|r| r.accel[1]).collect(),
            roll: rows.iter().map(|r| r.accel[2]).collect(),
        };

        log::info!("loaded {} sensor rows", velocity.len());
        Ok(Self {
            id: registry.assign(label),
            time_offset,
            velocity,
            acceleration,
        })
    }

    /// Time offset applied to the raw sample clock
    #[must_use]
    pub fn time_offset(&self) -> f64 {
        self.time_offset
    }

    /// Zero-phase filter the measured velocity series in place.
    ///
    /// The record has no pose to filter, so the filter applies directly
    /// to the gyroscope rates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterLength`] if the recording is shorter than
    /// the filter's settle length.
    pub fn apply_filter(&mut self, filter: &Butterworth) -> Result<()> {
        let yaw = filter.apply(&self.velocity.yaw)?;
        let pitch = filter.apply(&self.velocity.pitch)?;
        let roll = filter.apply(&self.velocity.roll)?;
        // Retained rows are fully numeric, so the filtered series keep
        // their length and the time axis needs no realignment.
        if yaw.len() != self.velocity.time.len() {
            return Err(Error::InvalidInput(
                "filtered series diverged from the recording length".to_string(),
            ));
        }
        self.velocity.yaw = yaw;
        self.velocity.pitch = pitch;
        self.velocity.roll = roll;
        Ok(())
    }
}

/// Parse one data line; any missing or unparseable numeric field drops
/// the whole row
fn parse_row(line: &str) -> Option<ImuRow> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != IMU_COLUMNS {
        return None;
    }
    let number = |idx: usize| fields[idx].trim().parse::<f64>().ok();

    Some(ImuRow {
        sample_time: number(COL_SAMPLE_TIME)?,
        accel: [
            number(COL_ACCEL_X)?,
            number(COL_ACCEL_X + 1)?,
            number(COL_ACCEL_X + 2)?,
        ],
        gyro: [
            number(COL_GYRO_X)?,
            number(COL_GYRO_X + 1)?,
            number(COL_GYRO_X + 2)?,
        ],
    })
}

impl SensorData for ImuRecord {
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
