use delegate::delegate;
use tracing::debug;

use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};
use crate::iir::IirCoefficients;
use crate::native::{
    check_iir_coefficients, ContextId, Endpoint, NativeAudioNode, NativeAudioParam, NativeIirFilter, NativeNode,
    NativeOfflineContext, NativeParam, ScriptProcessorCallback,
};

/// Direct-form I filter state of one channel.
///
/// `x` and `y` are circular histories of the last `order` inputs and
/// outputs; `head` is the slot the next sample is written to.
struct IirKernel {
    b: Vec<f64>,
    a: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
    head: usize,
}

impl IirKernel {
    fn new(coefficients: &IirCoefficients) -> Self {
        let order = coefficients.order();
        Self {
            b: coefficients.feedforward().to_vec(),
            a: coefficients.feedback().to_vec(),
            x: vec![0.0; order],
            y: vec![0.0; order],
            head: 0,
        }
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let order = self.x.len();
        for (x, y) in input.iter().zip(output.iter_mut()) {
            let x0 = *x as f64;
            let mut y0 = self.b[0] * x0;
            for k in 1..=order {
                let slot = (self.head + order - k) % order;
                y0 += self.b[k] * self.x[slot] - self.a[k] * self.y[slot];
            }
            if order > 0 {
                self.x[self.head] = x0;
                self.y[self.head] = y0;
                self.head = (self.head + 1) % order;
            }
            *y = y0 as f32;
        }
    }
}

/// An IIR filter evaluated in a script processor.
///
/// The script processor runs on blocks of one render quantum, so the faked
/// filter has no more latency than a native one.
pub struct IirFilterFaker {
    processor: NativeNode,
    coefficients: IirCoefficients,
    sample_rate: f64,
    /// One kernel per channel, fixed at construction
    channels: usize,
}

impl IirFilterFaker {
    pub fn new(
        native: &dyn NativeOfflineContext,
        feedforward: &[f64],
        feedback: &[f64],
        channel: ChannelConfig,
    ) -> Result<Self> {
        check_iir_coefficients(feedforward, feedback)?;
        channel.validate()?;
        let coefficients = IirCoefficients::new(feedforward, feedback)?;

        let mut kernels: Vec<IirKernel> = (0..channel.count).map(|_| IirKernel::new(&coefficients)).collect();
        let callback: ScriptProcessorCallback = Box::new(move |inputs: &[Vec<f32>], outputs: &mut [Vec<f32>], _: f64| {
            for ((kernel, input), output) in kernels.iter_mut().zip(inputs).zip(outputs.iter_mut()) {
                kernel.process(input, output);
            }
        });
        let block = native.render_quantum_size();
        debug!(order = coefficients.order(), block, "faking IIR filter with a script processor");
        let processor = native.create_script_processor(block, channel.count, channel.count, callback)?;
        Ok(Self {
            processor,
            coefficients,
            sample_rate: native.sample_rate() as f64,
            channels: channel.count,
        })
    }
}

impl NativeAudioNode for IirFilterFaker {
    delegate! {
        to self.processor {
            fn context_id(&self) -> ContextId;
            fn number_of_inputs(&self) -> usize;
            fn number_of_outputs(&self) -> usize;
            fn channel_config(&self) -> ChannelConfig;
            fn input(&self, input: usize) -> Result<Endpoint>;
            fn output(&self, output: usize) -> Result<Endpoint>;
            fn param(&self, name: &str) -> Option<NativeParam>;
            fn connect(&self, output: usize, destination: &dyn NativeAudioNode, input: usize) -> Result<()>;
            fn connect_param(&self, output: usize, param: &dyn NativeAudioParam) -> Result<()>;
            fn disconnect(&self, output: Option<usize>) -> Result<()>;
        }
    }

    fn set_channel_config(&self, config: ChannelConfig) -> Result<()> {
        config.validate()?;
        if config.count != self.channels {
            return Err(AudioError::not_supported(
                "the channel count of a faked IIR filter cannot change",
            ));
        }
        self.processor.set_channel_config(config)
    }
}

impl NativeIirFilter for IirFilterFaker {
    fn get_frequency_response(&self, frequency_hz: &[f32], magnitude: &mut [f32], phase: &mut [f32]) -> Result<()> {
        self.coefficients
            .frequency_response(self.sample_rate, frequency_hz, magnitude, phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelInterpretation;
    use crate::host::{HostProfile, SoftwareContext};
    use crate::OfflineContextOptions;
    use approx::assert_relative_eq;

    fn run(b: &[f64], a: &[f64], input: &[f32]) -> Vec<f32> {
        let coefficients = IirCoefficients::new(b, a).unwrap();
        let mut kernel = IirKernel::new(&coefficients);
        let mut output = vec![0.0; input.len()];
        kernel.process(input, &mut output);
        output
    }

    #[test]
    fn unit_feedforward_is_identity() {
        let input = [0.25, -1.0, 0.5, 0.0, 0.75];
        assert_eq!(run(&[1.0], &[], &input), input);
    }

    #[test]
    fn two_tap_average() {
        assert_eq!(run(&[0.5, 0.5], &[], &[1.0, 0.0, 0.0, 0.0]), [0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn history_survives_block_boundaries() {
        let coefficients = IirCoefficients::new(&[1.0], &[1.0, -0.5]).unwrap();
        let mut kernel = IirKernel::new(&coefficients);
        let mut first = [0.0; 2];
        let mut second = [0.0; 2];
        kernel.process(&[1.0, 0.0], &mut first);
        kernel.process(&[0.0, 0.0], &mut second);
        assert_eq!(first, [1.0, 0.5]);
        assert_eq!(second, [0.25, 0.125]);
    }

    #[test]
    fn leading_feedback_coefficient_is_normalized() {
        let plain = run(&[1.0, 0.5], &[1.0, -0.25], &[1.0, 0.5, -0.5, 0.0]);
        let scaled = run(&[2.0, 1.0], &[2.0, -0.5], &[1.0, 0.5, -0.5, 0.0]);
        for (p, s) in plain.iter().zip(&scaled) {
            assert_relative_eq!(*p, *s, epsilon = 1e-6);
        }
    }

    #[test]
    fn frequency_response_checks_lengths() {
        let host = SoftwareContext::with_profile(OfflineContextOptions::default(), HostProfile::minimal()).unwrap();
        let faker = IirFilterFaker::new(&host, &[0.5, 0.5], &[], ChannelConfig::default()).unwrap();

        faker.get_frequency_response(&[], &mut [], &mut []).unwrap();

        let mut mag = [0.0; 3];
        let mut phase = [0.0; 3];
        faker
            .get_frequency_response(&[0.0, 1e6, -5.0], &mut mag, &mut phase)
            .unwrap();
        assert_relative_eq!(mag[0], 1.0, epsilon = 1e-6);
        assert!(mag[1].is_nan() && phase[2].is_nan());

        let result = faker.get_frequency_response(&[100.0], &mut [0.0; 2], &mut [0.0]);
        assert!(matches!(result, Err(AudioError::InvalidAccess(_))));
    }

    #[test]
    fn channel_count_is_fixed() {
        let host = SoftwareContext::with_profile(OfflineContextOptions::default(), HostProfile::minimal()).unwrap();
        let faker = IirFilterFaker::new(&host, &[0.5, 0.5], &[], ChannelConfig::explicit(2)).unwrap();
        assert!(matches!(
            faker.set_channel_config(ChannelConfig::explicit(1)),
            Err(AudioError::NotSupported(_))
        ));
        let discrete = ChannelConfig::explicit(2).with_interpretation(ChannelInterpretation::Discrete);
        faker.set_channel_config(discrete).unwrap();
        assert_eq!(faker.channel_config(), discrete);
    }
}
