//! Tests pinning the Butterworth design to the standard reference
//! implementation's coefficients.

use head_kinematics::filter::Butterworth;
use head_kinematics::Error;

fn rounded(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| (v * 100.0).round() / 100.0).collect()
}

#[test]
fn test_default_design_matches_reference_denominator() {
    // butter(4, 160 / 2000) reference coefficients to two decimals.
    let filter = Butterworth::design(4000.0, 160.0, 4).unwrap();
    assert_eq!(
        rounded(filter.denominator()),
        vec![1.0, -3.34, 4.24, -2.41, 0.52]
    );
    assert_eq!(rounded(filter.numerator()), vec![0.0, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn test_default_constructor_is_the_reference_design() {
    let explicit = Butterworth::design(4000.0, 160.0, 4).unwrap();
    let default = Butterworth::default();
    for (a, b) in explicit
        .denominator()
        .iter()
        .zip(default.denominator().iter())
    {
        assert!((a - b).abs() < 1e-15);
    }
    for (a, b) in explicit.numerator().iter().zip(default.numerator().iter()) {
        assert!((a - b).abs() < 1e-15);
    }
}

#[test]
fn test_sixteen_sample_signal_filters_to_sixteen_values() {
    // The shortest signal the forward-backward pass accepts with the
    // default order-4 design.
    let filter = Butterworth::default();
    let signal: Vec<f64> = (0..16).map(|x| f64::from(x).sin()).collect();
    let filtered = filter.apply(&signal).unwrap();
    assert_eq!(filtered.len(), 16);
}

#[test]
fn test_settle_length_is_enforced() {
    let filter = Butterworth::default();
    let signal: Vec<f64> = (0..15).map(|x| f64::from(x).sin()).collect();
    match filter.apply(&signal) {
        Err(Error::FilterLength { required, actual }) => {
            assert_eq!(required, 16);
            assert_eq!(actual, 15);
        }
        other => panic!("expected FilterLength error, got {other:?}"),
    }
}

#[test]
fn test_missing_samples_shrink_the_output() {
    let filter = Butterworth::default();
    let mut signal: Vec<f64> = (0..24).map(|x| f64::from(x).cos()).collect();
    signal[0] = f64::NAN;
    signal[23] = f64::NAN;
    let filtered = filter.apply(&signal).unwrap();
    assert_eq!(filtered.len(), 22);
}

#[test]
fn test_other_designs_stay_normalized() {
    for (fs, cutoff, order) in [(2000.0, 200.0, 4), (24000.0, 200.0, 4), (240.0, 20.0, 2)] {
        let filter = Butterworth::design(fs, cutoff, order).unwrap();
        assert_eq!(filter.denominator().len(), order + 1);
        assert!((filter.denominator()[0] - 1.0).abs() < 1e-12);
        let dc: f64 =
            filter.numerator().iter().sum::<f64>() / filter.denominator().iter().sum::<f64>();
        assert!((dc - 1.0).abs() < 1e-9, "DC gain off for fs={fs}");
    }
}
