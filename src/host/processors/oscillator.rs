use std::f64::consts::TAU;

use dasp_graph::Buffer;

use super::{Schedule, SourceMessage};
use crate::host::processor::{reset_output, Channels, HostProcessor, ProcessContext};
use crate::native::OscillatorType;

/// Periodic waveform generator with `frequency` and `detune` parameters.
pub(crate) struct Oscillator {
    oscillator_type: OscillatorType,
    phase: f64,
    schedule: Schedule,
}

impl Oscillator {
    pub fn new(oscillator_type: OscillatorType) -> Self {
        Self {
            oscillator_type,
            phase: 0.0,
            schedule: Schedule::default(),
        }
    }

    /// Waveform value at `phase` in `[0, 1)`.
    #[inline]
    fn sample(&self, phase: f64) -> f32 {
        let value = match self.oscillator_type {
            OscillatorType::Sine => (phase * TAU).sin(),
            OscillatorType::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            OscillatorType::Sawtooth => 2.0 * ((phase + 0.5) % 1.0) - 1.0,
            OscillatorType::Triangle => {
                if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                }
            }
        };
        value as f32
    }
}

impl HostProcessor for Oscillator {
    type Message = SourceMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = SourceMessage>,
        _inputs: &[Channels],
        params: &[Buffer],
        outputs: &mut [Channels],
    ) {
        for msg in messages {
            self.schedule.handle(msg);
        }
        let output = &mut outputs[0];
        reset_output(output, 1);
        let sample_rate = ctx.sample_rate as f64;
        for i in 0..ctx.buffer_size {
            if !self.schedule.is_playing(ctx.time(i)) {
                continue;
            }
            output[0][i] = self.sample(self.phase);
            let frequency = params[0][i] as f64 * (params[1][i] as f64 / 1200.0).exp2();
            self.phase = (self.phase + frequency / sample_rate).rem_euclid(1.0);
        }
        self.schedule.finish_if_stopped(ctx.end_time());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveforms_start_at_their_reference_values() {
        assert_eq!(Oscillator::new(OscillatorType::Sine).sample(0.0), 0.0);
        assert_eq!(Oscillator::new(OscillatorType::Square).sample(0.0), 1.0);
        assert_eq!(Oscillator::new(OscillatorType::Sawtooth).sample(0.0), 0.0);
        assert_eq!(Oscillator::new(OscillatorType::Triangle).sample(0.25), 1.0);
    }
}
