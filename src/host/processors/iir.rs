use dasp_graph::Buffer;

pub(crate) use crate::iir::IirCoefficients;
use crate::host::processor::{reset_output, Channels, HostProcessor, ProcessContext};

/// Transposed direct-form II IIR filter.
pub(crate) struct IirFilter {
    coefficients: IirCoefficients,
    state: Vec<Vec<f64>>,
}

impl IirFilter {
    pub fn new(coefficients: IirCoefficients) -> Self {
        Self {
            coefficients,
            state: Vec::new(),
        }
    }
}

impl HostProcessor for IirFilter {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Channels],
        _params: &[Buffer],
        outputs: &mut [Channels],
    ) {
        let input = &inputs[0];
        let (b, a) = (self.coefficients.feedforward(), self.coefficients.feedback());
        let order = self.coefficients.order();
        self.state.resize(input.len(), vec![0.0; order]);
        reset_output(&mut outputs[0], input.len());

        for ((state, channel), out) in self.state.iter_mut().zip(input).zip(outputs[0].iter_mut()) {
            for (x, y) in channel.iter().zip(out.iter_mut()) {
                let x = *x as f64;
                let result = b[0] * x + state.first().copied().unwrap_or(0.0);
                for k in 0..order {
                    let carry = state.get(k + 1).copied().unwrap_or(0.0);
                    state[k] = b[k + 1] * x - a[k + 1] * result + carry;
                }
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
    fn one_pole_filter_accumulates() {
        let mut filter = IirFilter::new(IirCoefficients::new(&[1.0], &[1.0, -0.5]).unwrap());
        let mut impulse = Buffer::SILENT;
        impulse[0] = 1.0;
        let ctx = ProcessContext {
            sample_rate: 44_100.0,
            buffer_size: Buffer::LEN,
            frame: 0,
        };
        let mut outputs = vec![Vec::new()];
        filter.process(&ctx, std::iter::empty(), &[vec![impulse]], &[], &mut outputs);
        assert_relative_eq!(outputs[0][0][0], 1.0);
        assert_relative_eq!(outputs[0][0][1], 0.5);
        assert_relative_eq!(outputs[0][0][2], 0.25);
    }
}
