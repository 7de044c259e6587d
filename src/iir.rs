//! IIR coefficient normalization and analytic frequency response.

use std::f64::consts::PI;

use crate::error::{AudioError, Result};

/// Normalized IIR coefficients, `a[0] == 1`, both vectors of equal length.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct IirCoefficients {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl IirCoefficients {
    /// Divide everything by `a[0]` and pad both sides to the same order.
    ///
    /// An empty `feedback` slice stands for `[1.0]`.
    pub fn new(feedforward: &[f64], feedback: &[f64]) -> Result<Self> {
        let a0 = feedback.first().copied().unwrap_or(1.0);
        if a0 == 0.0 {
            return Err(AudioError::invalid_state("the first feedback coefficient must not be zero"));
        }
        let len = feedforward.len().max(feedback.len()).max(1);
        let mut b = vec![0.0; len];
        let mut a = vec![0.0; len];
        a[0] = 1.0;
        for (dst, src) in b.iter_mut().zip(feedforward) {
            *dst = src / a0;
        }
        for (dst, src) in a.iter_mut().zip(feedback).skip(1) {
            *dst = src / a0;
        }
        Ok(Self { b, a })
    }

    pub fn feedforward(&self) -> &[f64] {
        &self.b
    }

    pub fn feedback(&self) -> &[f64] {
        &self.a
    }

    /// Samples of history the filter needs, `max(P, Q)`.
    pub fn order(&self) -> usize {
        self.b.len() - 1
    }

    /// Magnitude and phase of the transfer function at `frequency` Hz.
    ///
    /// Frequencies outside `[0, nyquist]` yield `NaN`.
    pub fn response(&self, frequency: f64, sample_rate: f64) -> (f64, f64) {
        let nyquist = sample_rate / 2.0;
        if !(0.0..=nyquist).contains(&frequency) {
            return (f64::NAN, f64::NAN);
        }
        let omega = -PI * frequency / nyquist;
        let eval = |coefficients: &[f64]| {
            coefficients.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, c)| {
                let (sin, cos) = (omega * k as f64).sin_cos();
                (re + c * cos, im + c * sin)
            })
        };
        let (nr, ni) = eval(&self.b);
        let (dr, di) = eval(&self.a);
        let denominator = dr * dr + di * di;
        let re = (nr * dr + ni * di) / denominator;
        let im = (ni * dr - nr * di) / denominator;
        (re.hypot(im), im.atan2(re))
    }

    /// Fill `magnitude` and `phase` for every entry of `frequency_hz`.
    pub fn frequency_response(
        &self,
        sample_rate: f64,
        frequency_hz: &[f32],
        magnitude: &mut [f32],
        phase: &mut [f32],
    ) -> Result<()> {
        if frequency_hz.len() != magnitude.len() || frequency_hz.len() != phase.len() {
            return Err(AudioError::invalid_access(
                "frequency, magnitude and phase arrays must have the same length",
            ));
        }
        for ((frequency, mag), ph) in frequency_hz.iter().zip(magnitude.iter_mut()).zip(phase.iter_mut()) {
            let (m, p) = self.response(*frequency as f64, sample_rate);
            *mag = m as f32;
            *ph = p as f32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn coefficients_are_normalized_by_a0() {
        let coefficients = IirCoefficients::new(&[2.0], &[2.0, 1.0, 0.5]).unwrap();
        assert_eq!(coefficients.feedforward(), &[1.0, 0.0, 0.0]);
        assert_eq!(coefficients.feedback(), &[1.0, 0.5, 0.25]);
        assert_eq!(coefficients.order(), 2);
    }

    #[test]
    fn averaging_filter_has_zero_gain_at_nyquist() {
        let coefficients = IirCoefficients::new(&[0.5, 0.5], &[1.0]).unwrap();
        let (dc, _) = coefficients.response(0.0, 48_000.0);
        let (nyquist, _) = coefficients.response(24_000.0, 48_000.0);
        assert_relative_eq!(dc, 1.0, epsilon = 1e-9);
        assert_relative_eq!(nyquist, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn out_of_range_frequencies_are_nan() {
        let coefficients = IirCoefficients::new(&[1.0], &[1.0]).unwrap();
        assert!(coefficients.response(-1.0, 44_100.0).0.is_nan());
        assert!(coefficients.response(30_000.0, 44_100.0).1.is_nan());
    }

    #[test]
    fn response_arrays_must_match() {
        let coefficients = IirCoefficients::new(&[1.0], &[]).unwrap();
        assert_eq!(coefficients.frequency_response(44_100.0, &[], &mut [], &mut []), Ok(()));
        let result = coefficients.frequency_response(44_100.0, &[100.0], &mut [0.0; 2], &mut [0.0]);
        assert!(matches!(result, Err(AudioError::InvalidAccess(_))));
    }
}
