//! Sensor alignment tool: applies the manual time offset and optional
//! low-pass filtering to an IMU export and writes the aligned velocity
//! series.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use head_kinematics::config::Config;
use head_kinematics::imu::ImuRecord;
use head_kinematics::series::{IdRegistry, SensorData};

#[derive(Parser, Debug)]
#[command(author, version, about = "Align and filter a head-mounted IMU recording", long_about = None)]
struct Args {
    /// Sensor CSV file (13-column export)
    input: PathBuf,

    /// Time offset in seconds aligning the sensor clock with the video
    /// time base (overrides the configured value)
    #[arg(short = 't', long, allow_hyphen_values = true)]
    time_offset: Option<f64>,

    /// Apply the configured Butterworth low-pass before export
    #[arg(short, long)]
    filter: bool,

    /// Write the aligned velocity series to this CSV file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Label recorded as the sensor id
    #[arg(short, long)]
    label: Option<String>,

    /// Path to a YAML analysis configuration
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    let config = match &args.config {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            Config::from_file(path).context("loading configuration")?
        }
        None => Config::default(),
    };
    config.validate().context("validating configuration")?;

    let time_offset = args.time_offset.unwrap_or(config.imu.time_offset);
    let mut registry = IdRegistry::new();
    let mut record = ImuRecord::from_path(
        &args.input,
        time_offset,
        &mut registry,
        args.label.as_deref(),
    )
    .with_context(|| format!("loading sensor data from {}", args.input.display()))?;
    info!(
        "sensor {}: {} velocity samples, offset {time_offset} s",
        record.id(),
        record.velocity().len()
    );

    if args.filter {
        let filter = config.create_filter().context("designing filter")?;
        record.apply_filter(&filter).context("filtering velocity")?;
        info!(
            "applied order-{} low-pass at {} Hz",
            config.filter.order, config.filter.cutoff_hz
        );
    }

    let mut writer: BufWriter<Box<dyn Write>> = match &args.output {
        Some(path) => BufWriter::new(Box::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => BufWriter::new(Box::new(io::stdout())),
    };

    writeln!(writer, "time,yaw,pitch,roll")?;
    let velocity = record.velocity();
    for i in 0..velocity.len() {
        writeln!(
            writer,
            "{},{},{},{}",
            velocity.time[i], velocity.yaw[i], velocity.pitch[i], velocity.roll[i]
        )?;
    }
    writer.flush()?;
    Ok(())
}
