use std::f64::consts::{PI, SQRT_2};

use dasp_graph::Buffer;

use crate::host::processor::{reset_output, Channels, HostProcessor, ProcessContext};
use crate::native::BiquadFilterType;

/// Normalized second-order section: `[b0, b1, b2, a1, a2]`.
type Coefficients = [f64; 5];

#[derive(Clone, Copy, Default)]
struct History {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

/// Second-order filter with the audio cookbook responses.
///
/// Parameters are `frequency`, `detune`, `Q` and `gain`; coefficients are
/// recomputed once per quantum from the first frame's values.
pub(crate) struct BiquadFilter {
    filter_type: BiquadFilterType,
    history: Vec<History>,
}

impl BiquadFilter {
    pub fn new(filter_type: BiquadFilterType) -> Self {
        Self {
            filter_type,
            history: Vec::new(),
        }
    }

    fn coefficients(&self, sample_rate: f64, frequency: f64, detune: f64, q: f64, gain: f64) -> Coefficients {
        let nyquist = sample_rate / 2.0;
        let f0 = (frequency * (detune / 1200.0).exp2()).clamp(0.0, nyquist);
        let w0 = 2.0 * PI * f0 / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let a = 10f64.powf(gain / 40.0);

        let [b0, b1, b2, a0, a1, a2] = match self.filter_type {
            BiquadFilterType::Lowpass => {
                let alpha = sin / (2.0 * 10f64.powf(q / 20.0));
                [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0, 1.0 + alpha, -2.0 * cos, 1.0 - alpha]
            }
            BiquadFilterType::Highpass => {
                let alpha = sin / (2.0 * 10f64.powf(q / 20.0));
                [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0, 1.0 + alpha, -2.0 * cos, 1.0 - alpha]
            }
            BiquadFilterType::Bandpass => {
                let alpha = sin / (2.0 * q);
                [alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos, 1.0 - alpha]
            }
            BiquadFilterType::Notch => {
                let alpha = sin / (2.0 * q);
                [1.0, -2.0 * cos, 1.0, 1.0 + alpha, -2.0 * cos, 1.0 - alpha]
            }
            BiquadFilterType::Allpass => {
                let alpha = sin / (2.0 * q);
                [1.0 - alpha, -2.0 * cos, 1.0 + alpha, 1.0 + alpha, -2.0 * cos, 1.0 - alpha]
            }
            BiquadFilterType::Peaking => {
                let alpha = sin / (2.0 * q);
                [
                    1.0 + alpha * a,
                    -2.0 * cos,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos,
                    1.0 - alpha / a,
                ]
            }
            BiquadFilterType::Lowshelf => {
                let alpha = sin / 2.0 * SQRT_2;
                let k = 2.0 * a.sqrt() * alpha;
                [
                    a * ((a + 1.0) - (a - 1.0) * cos + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
                    a * ((a + 1.0) - (a - 1.0) * cos - k),
                    (a + 1.0) + (a - 1.0) * cos + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos),
                    (a + 1.0) + (a - 1.0) * cos - k,
                ]
            }
            BiquadFilterType::Highshelf => {
                let alpha = sin / 2.0 * SQRT_2;
                let k = 2.0 * a.sqrt() * alpha;
                [
                    a * ((a + 1.0) + (a - 1.0) * cos + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
                    a * ((a + 1.0) + (a - 1.0) * cos - k),
                    (a + 1.0) - (a - 1.0) * cos + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos),
                    (a + 1.0) - (a - 1.0) * cos - k,
                ]
            }
        };
        [b0 / a0, b1 / a0, b2 / a0, a1 / a0, a2 / a0]
    }
}

impl HostProcessor for BiquadFilter {
    type Message = ();

    fn process(
        &mut self,
        ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Channels],
        params: &[Buffer],
        outputs: &mut [Channels],
    ) {
        let input = &inputs[0];
        self.history.resize(input.len(), History::default());
        reset_output(&mut outputs[0], input.len());

        let [b0, b1, b2, a1, a2] = self.coefficients(
            ctx.sample_rate as f64,
            params[0][0] as f64,
            params[1][0] as f64,
            params[2][0] as f64,
            params[3][0] as f64,
        );
        for ((history, channel), out) in self.history.iter_mut().zip(input).zip(outputs[0].iter_mut()) {
            for (x, y) in channel.iter().zip(out.iter_mut()) {
                let x = *x as f64;
                let result = b0 * x + b1 * history.x1 + b2 * history.x2 - a1 * history.y1 - a2 * history.y2;
                history.x2 = history.x1;
                history.x1 = x;
                history.y2 = history.y1;
                history.y1 = result;
                *y = result as f32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lowpass_has_unity_dc_gain() {
        let filter = BiquadFilter::new(BiquadFilterType::Lowpass);
        let [b0, b1, b2, a1, a2] = filter.coefficients(44_100.0, 1_000.0, 0.0, 1.0, 0.0);
        assert_relative_eq!((b0 + b1 + b2) / (1.0 + a1 + a2), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn allpass_keeps_magnitude_at_dc() {
        let filter = BiquadFilter::new(BiquadFilterType::Allpass);
        let [b0, b1, b2, a1, a2] = filter.coefficients(48_000.0, 2_000.0, 0.0, 0.7, 0.0);
        assert_relative_eq!(((b0 + b1 + b2) / (1.0 + a1 + a2)).abs(), 1.0, epsilon = 1e-9);
    }
}
