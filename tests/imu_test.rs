//! Tests for the fixed-format sensor CSV loader.

use head_kinematics::filter::Butterworth;
use head_kinematics::imu::ImuRecord;
use head_kinematics::series::{IdRegistry, SensorData, SensorId};
use head_kinematics::Error;

const HEADER: &str =
    "sensor,received time,sample number,sample time,accelX,accelY,accelZ,gyroX,gyroY,gyroZ,magX,magY,magZ";

fn csv_with_rows(rows: &[&str]) -> String {
    let mut text = String::from(HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

#[test]
fn test_time_offset_alignment() {
    // The first adjusted sample time is exactly the offset.
    let csv = csv_with_rows(&[
        "wax9,0.01,1,377.721,0.1,0.2,0.3,1.0,2.0,3.0,10,11,12",
        "wax9,0.02,2,377.7215,0.1,0.2,0.3,1.1,2.1,3.1,10,11,12",
        "wax9,0.03,3,377.722,0.1,0.2,0.3,1.2,2.2,3.2,10,11,12",
    ]);
    let mut registry = IdRegistry::new();
    let record =
        ImuRecord::from_reader(csv.as_bytes(), -59.335, &mut registry, None).unwrap();

    assert_eq!(record.time_offset(), -59.335);
    let time = &record.velocity().time;
    assert!((time[0] - -59.335).abs() < 1e-12);
    assert!((time[1] - (-59.335 + 0.0005)).abs() < 1e-9);
    assert!((time[2] - (-59.335 + 0.001)).abs() < 1e-9);
}

#[test]
fn test_gyro_and_accel_column_mapping() {
    let csv = csv_with_rows(&[
        "wax9,0.01,1,100.0,0.5,0.6,0.7,10.0,20.0,30.0,1,2,3",
        "wax9,0.02,2,100.1,0.8,0.9,1.0,11.0,21.0,31.0,1,2,3",
    ]);
    let mut registry = IdRegistry::new();
    let record = ImuRecord::from_reader(csv.as_bytes(), 0.0, &mut registry, None).unwrap();

    // Gyro rates populate velocity directly; no differentiation happens.
    assert_eq!(record.velocity().yaw, vec![10.0, 11.0]);
    assert_eq!(record.velocity().pitch, vec![20.0, 21.0]);
    assert_eq!(record.velocity().roll, vec![30.0, 31.0]);
    assert_eq!(record.acceleration().yaw, vec![0.5, 0.8]);
    assert_eq!(record.acceleration().pitch, vec![0.6, 0.9]);
    assert_eq!(record.acceleration().roll, vec![0.7, 1.0]);
    assert_eq!(record.acceleration().time, record.velocity().time);
}

#[test]
fn test_rows_with_missing_values_are_dropped_whole() {
    let csv = csv_with_rows(&[
        "wax9,0.01,1,100.0,0.5,0.6,0.7,10.0,20.0,30.0,1,2,3",
        "wax9,0.02,2,100.1,0.8,,1.0,11.0,21.0,31.0,1,2,3",
        "wax9,0.03,3,100.2,0.9,1.0,1.1,n/a,22.0,32.0,1,2,3",
        "wax9,0.04,4,100.3,1.0,1.1,1.2,13.0,23.0,33.0,1,2,3",
    ]);
    let mut registry = IdRegistry::new();
    let record = ImuRecord::from_reader(csv.as_bytes(), 0.0, &mut registry, None).unwrap();

    assert_eq!(record.velocity().len(), 2);
    assert_eq!(record.velocity().yaw, vec![10.0, 13.0]);
    // The time base comes from the first retained row.
    assert_eq!(record.velocity().time[0], 0.0);
    assert!((record.velocity().time[1] - 0.3).abs() < 1e-9);
}

#[test]
fn test_all_rows_unusable_is_an_error() {
    let csv = csv_with_rows(&["wax9,0.01,1,,,,,,,,,,"]);
    let mut registry = IdRegistry::new();
    match ImuRecord::from_reader(csv.as_bytes(), 0.0, &mut registry, None) {
        Err(Error::InsufficientData(_)) => {}
        other => panic!("expected InsufficientData, got {:?}", other.err()),
    }
}

#[test]
fn test_velocity_filtering_preserves_length() {
    let rows: Vec<String> = (0..32)
        .map(|i| {
            let t = 100.0 + f64::from(i) * 0.0005;
            let gyro = (f64::from(i) * 0.8).sin() * 50.0;
            format!("wax9,0.0,{i},{t},0.1,0.2,0.3,{gyro},{gyro},{gyro},0,0,0")
        })
        .collect();
    let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    let csv = csv_with_rows(&row_refs);

    let mut registry = IdRegistry::new();
    let mut record =
        ImuRecord::from_reader(csv.as_bytes(), -7.82, &mut registry, Some("WAX-9")).unwrap();
    assert_eq!(*record.id(), SensorId::Label("WAX-9".to_string()));

    let before = record.velocity().time.clone();
    record.apply_filter(&Butterworth::default()).unwrap();
    assert_eq!(record.velocity().len(), 32);
    assert_eq!(record.velocity().time, before);

    // Acceleration is measured, not derived, and filtering velocity
    // leaves it untouched.
    assert_eq!(record.acceleration().yaw, vec![0.1; 32]);
}

#[test]
fn test_short_recording_cannot_be_filtered() {
    let csv = csv_with_rows(&[
        "wax9,0.01,1,100.0,0.5,0.6,0.7,10.0,20.0,30.0,1,2,3",
        "wax9,0.02,2,100.1,0.8,0.9,1.0,11.0,21.0,31.0,1,2,3",
    ]);
    let mut registry = IdRegistry::new();
    let mut record = ImuRecord::from_reader(csv.as_bytes(), 0.0, &mut registry, None).unwrap();
    assert!(matches!(
        record.apply_filter(&Butterworth::default()),
        Err(Error::FilterLength { .. })
    ));
}
