//! Zero-phase Butterworth low-pass filtering.
//!
//! The design follows the standard digital Butterworth recipe: analog
//! prototype poles, cutoff pre-warping, bilinear transform. Application is
//! forward-backward with odd-symmetric edge padding and transient-matched
//! initial conditions, so the filtered series has no phase lag.

use std::f64::consts::PI;

use nalgebra::{Complex, DMatrix, DVector};

use crate::constants::{DEFAULT_CUTOFF_HZ, DEFAULT_FILTER_ORDER, DEFAULT_SAMPLE_RATE_HZ};
use crate::{Error, Result};

/// A digital low-pass IIR filter in transfer-function form.
#[derive(Debug, Clone)]
pub struct Butterworth {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl Butterworth {
    /// Design a low-pass Butterworth filter.
    ///
    /// `cutoff_hz` is normalized against the Nyquist frequency
    /// `sample_rate_hz / 2` before the design.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero order, non-positive
    /// rates, or a cutoff at or above Nyquist.
    pub fn design(sample_rate_hz: f64, cutoff_hz: f64, order: usize) -> Result<Self> {
        if order == 0 {
            return Err(Error::InvalidInput("filter order must be at least 1".to_string()));
        }
        if !(sample_rate_hz > 0.0 && sample_rate_hz.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "sample rate must be positive, got {sample_rate_hz}"
            )));
        }
        if !(cutoff_hz > 0.0 && cutoff_hz.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "cutoff must be positive, got {cutoff_hz}"
            )));
        }
        let nyquist = 0.5 * sample_rate_hz;
        let wn = cutoff_hz / nyquist;
        if wn >= 1.0 {
            return Err(Error::InvalidInput(format!(
                "cutoff {cutoff_hz} Hz is not below the Nyquist frequency {nyquist} Hz"
            )));
        }

        // Analog prototype: poles evenly spaced on the left half of the
        // unit circle.
        let n = order as i32;
        let mut poles: Vec<Complex<f64>> = (0..order)
            .map(|k| {
                let m = f64::from(-n + 1 + 2 * k as i32);
                let theta = PI * m / f64::from(2 * n);
                -Complex::new(0.0, theta).exp()
            })
            .collect();

        // Pre-warp the cutoff so the bilinear transform lands it exactly.
        let fs = 2.0;
        let warped = 2.0 * fs * (PI * wn / fs).tan();
        for p in &mut poles {
            *p *= warped;
        }
        let gain = warped.powi(n);

        // Bilinear transform into the z-plane; a low-pass design puts all
        // digital zeros at z = -1.
        let fs2 = Complex::new(2.0 * fs, 0.0);
        let digital_poles: Vec<Complex<f64>> =
            poles.iter().map(|p| (fs2 + p) / (fs2 - p)).collect();
        let mut denom = Complex::new(1.0, 0.0);
        for p in &poles {
            denom *= fs2 - p;
        }
        let k_z = gain * (Complex::new(1.0, 0.0) / denom).re;

        let zeros = vec![Complex::new(-1.0, 0.0); order];
        let b: Vec<f64> = poly(&zeros).into_iter().map(|c| c * k_z).collect();
        let a = poly(&digital_poles);
        Ok(Self { b, a })
    }

    /// Numerator polynomial of the transfer function
    #[must_use]
    pub fn numerator(&self) -> &[f64] {
        &self.b
    }

    /// Denominator polynomial of the transfer function
    #[must_use]
    pub fn denominator(&self) -> &[f64] {
        &self.a
    }

    /// Edge padding consumed by the forward-backward pass
    #[must_use]
    pub fn pad_len(&self) -> usize {
        3 * self.a.len().max(self.b.len())
    }

    /// Apply the filter forward and backward over the finite portion of
    /// `signal`.
    ///
    /// Non-finite samples are excluded before filtering, so the output can
    /// be shorter than the input; the caller realigns its time axis to the
    /// surviving samples.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterLength`] when the finite portion is not
    /// longer than [`Butterworth::pad_len`].
    pub fn apply(&self, signal: &[f64]) -> Result<Vec<f64>> {
        let clean: Vec<f64> = signal.iter().copied().filter(|v| v.is_finite()).collect();
        self.filtfilt(&clean)
    }

    fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>> {
        let edge = self.pad_len();
        let n = x.len();
        if n <= edge {
            return Err(Error::FilterLength {
                required: edge + 1,
                actual: n,
            });
        }

        // Odd-symmetric extension at both edges.
        let mut ext = Vec::with_capacity(n + 2 * edge);
        for i in 0..edge {
            ext.push(2.0 * x[0] - x[edge - i]);
        }
        ext.extend_from_slice(x);
        for i in 0..edge {
            ext.push(2.0 * x[n - 1] - x[n - 2 - i]);
        }

        let zi = self.initial_conditions()?;

        let scaled: Vec<f64> = zi.iter().map(|z| z * ext[0]).collect();
        let mut y = self.lfilter(&ext, &scaled);
        y.reverse();
        let scaled: Vec<f64> = zi.iter().map(|z| z * y[0]).collect();
        let mut y = self.lfilter(&y, &scaled);
        y.reverse();

        Ok(y[edge..edge + n].to_vec())
    }

    /// Single-pass IIR filtering, direct form II transposed
    fn lfilter(&self, x: &[f64], zi: &[f64]) -> Vec<f64> {
        let order = self.a.len().max(self.b.len());
        let mut b = self.b.clone();
        b.resize(order, 0.0);
        let mut a = self.a.clone();
        a.resize(order, 0.0);
        let mut z = zi.to_vec();
        z.resize(order - 1, 0.0);

        let mut out = Vec::with_capacity(x.len());
        for &sample in x {
            let value = b[0] * sample + z.first().copied().unwrap_or(0.0);
            for i in 0..z.len() {
                let carry = if i + 1 < z.len() { z[i + 1] } else { 0.0 };
                z[i] = b[i + 1] * sample + carry - a[i + 1] * value;
            }
            out.push(value);
        }
        out
    }

    /// Steady-state initial conditions for a unit step, used to suppress
    /// the startup transient of each pass
    fn initial_conditions(&self) -> Result<Vec<f64>> {
        let order = self.a.len().max(self.b.len());
        let mut b = self.b.clone();
        b.resize(order, 0.0);
        let mut a = self.a.clone();
        a.resize(order, 0.0);
        let m = order - 1;

        // (I - C^T) zi = b[1..] - a[1..] * b[0], with C the companion
        // matrix of the denominator.
        let mut system = DMatrix::<f64>::zeros(m, m);
        for i in 0..m {
            for j in 0..m {
                let companion = if j == 0 {
                    -a[i + 1] / a[0]
                } else if i == j - 1 {
                    1.0
                } else {
                    0.0
                };
                let identity = if i == j { 1.0 } else { 0.0 };
                system[(i, j)] = identity - companion;
            }
        }
        let rhs = DVector::from_iterator(m, (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]));
        system
            .lu()
            .solve(&rhs)
            .map(|zi| zi.iter().copied().collect())
            .ok_or_else(|| Error::InvalidInput("degenerate filter denominator".to_string()))
    }
}

impl Default for Butterworth {
    fn default() -> Self {
        Self::design(DEFAULT_SAMPLE_RATE_HZ, DEFAULT_CUTOFF_HZ, DEFAULT_FILTER_ORDER)
            .expect("default filter design is valid")
    }
}

/// Real polynomial coefficients from a conjugate-closed set of roots
fn poly(roots: &[Complex<f64>]) -> Vec<f64> {
    let mut coeffs = vec![Complex::new(1.0, 0.0)];
    for root in roots {
        let mut next = vec![Complex::new(0.0, 0.0); coeffs.len() + 1];
        for (i, c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * root;
        }
        coeffs = next;
    }
    coeffs.into_iter().map(|c| c.re).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_design_is_monic_with_unit_dc_gain() {
        let filter = Butterworth::design(4000.0, 160.0, 4).unwrap();
        assert_eq!(filter.denominator().len(), 5);
        assert_eq!(filter.numerator().len(), 5);
        assert!((filter.denominator()[0] - 1.0).abs() < 1e-12);
        let dc = filter.numerator().iter().sum::<f64>() / filter.denominator().iter().sum::<f64>();
        assert!((dc - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_numerator_is_binomial() {
        // Low-pass zeros all sit at z = -1, so the numerator is a scaled
        // binomial expansion.
        let filter = Butterworth::design(4000.0, 160.0, 4).unwrap();
        let b = filter.numerator();
        assert!((b[1] / b[0] - 4.0).abs() < 1e-9);
        assert!((b[2] / b[0] - 6.0).abs() < 1e-9);
        assert!((b[3] / b[0] - 4.0).abs() < 1e-9);
        assert!((b[4] / b[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_design_validation() {
        assert!(Butterworth::design(4000.0, 160.0, 0).is_err());
        assert!(Butterworth::design(0.0, 160.0, 4).is_err());
        assert!(Butterworth::design(4000.0, 0.0, 4).is_err());
        assert!(Butterworth::design(4000.0, 2000.0, 4).is_err());
        assert!(Butterworth::design(4000.0, 2500.0, 4).is_err());
    }

    #[test]
    fn test_apply_preserves_finite_length() {
        let filter = Butterworth::default();
        let signal: Vec<f64> = (0..16).map(|x| f64::from(x).sin()).collect();
        let filtered = filter.apply(&signal).unwrap();
        assert_eq!(filtered.len(), 16);
        assert!(filtered.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_apply_drops_non_finite_samples() {
        let filter = Butterworth::default();
        let mut signal: Vec<f64> = (0..20).map(|x| f64::from(x).sin()).collect();
        signal[3] = f64::NAN;
        signal[11] = f64::INFINITY;
        let filtered = filter.apply(&signal).unwrap();
        assert_eq!(filtered.len(), 18);
    }

    #[test]
    fn test_apply_rejects_short_signal() {
        let filter = Butterworth::default();
        let signal = vec![1.0; 15];
        match filter.apply(&signal) {
            Err(Error::FilterLength { required, actual }) => {
                assert_eq!(required, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("expected FilterLength error, got {other:?}"),
        }
    }

    #[test]
    fn test_constant_signal_passes_through() {
        let filter = Butterworth::default();
        let signal = vec![3.5; 64];
        let filtered = filter.apply(&signal).unwrap();
        for value in filtered {
            assert!((value - 3.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_attenuates_high_frequency() {
        // 1 Hz and 1500 Hz tones sampled at 4000 Hz; the 160 Hz low-pass
        // must keep the first and crush the second.
        let filter = Butterworth::default();
        let low: Vec<f64> = (0..4000)
            .map(|i| (2.0 * PI * 1.0 * f64::from(i) / 4000.0).sin())
            .collect();
        let high: Vec<f64> = (0..4000)
            .map(|i| (2.0 * PI * 1500.0 * f64::from(i) / 4000.0).sin())
            .collect();
        let low_out = filter.apply(&low).unwrap();
        let high_out = filter.apply(&high).unwrap();
        let amplitude = |s: &[f64]| s.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        assert!(amplitude(&low_out) > 0.9);
        assert!(amplitude(&high_out) < 0.01);
    }
}
