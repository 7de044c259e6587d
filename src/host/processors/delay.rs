use dasp_graph::Buffer;

use crate::host::processor::{reset_output, Channels, HostProcessor, ProcessContext};

/// Variable delay line with linear interpolation.
pub(crate) struct Delay {
    lines: Vec<Vec<f32>>,
    capacity: usize,
    write: usize,
    max_frames: f64,
}

impl Delay {
    pub fn new(max_delay_time: f64, sample_rate: f32) -> Self {
        let max_frames = max_delay_time * sample_rate as f64;
        Self {
            lines: Vec::new(),
            capacity: max_frames.ceil() as usize + Buffer::LEN + 2,
            write: 0,
            max_frames,
        }
    }

    #[inline]
    fn read(&self, line: &[f32], delay_frames: f64) -> f32 {
        let pos = (self.write as f64 - delay_frames).rem_euclid(self.capacity as f64);
        let older = pos.floor() as usize % self.capacity;
        let newer = (older + 1) % self.capacity;
        let frac = (pos - pos.floor()) as f32;
        line[older] * (1.0 - frac) + line[newer] * frac
    }
}

impl HostProcessor for Delay {
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
        let channels = input.len();
        self.lines.resize(channels, vec![0.0; self.capacity]);
        reset_output(&mut outputs[0], channels);

        for i in 0..ctx.buffer_size {
            let delay_frames = (params[0][i] as f64 * ctx.sample_rate as f64).clamp(0.0, self.max_frames);
            for ch in 0..channels {
                self.lines[ch][self.write] = input[ch][i];
                outputs[0][ch][i] = self.read(&self.lines[ch], delay_frames);
            }
            self.write = (self.write + 1) % self.capacity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn delays_by_whole_frames() {
        let ctx = ProcessContext {
            sample_rate: 1000.0,
            buffer_size: Buffer::LEN,
            frame: 0,
        };
        let mut delay = Delay::new(0.1, 1000.0);
        let mut impulse = Buffer::SILENT;
        impulse[0] = 1.0;
        let mut delay_time = Buffer::SILENT;
        delay_time.iter_mut().for_each(|d| *d = 0.003);

        let mut outputs = vec![Vec::new()];
        delay.process(&ctx, std::iter::empty(), &[vec![impulse]], &[delay_time], &mut outputs);
        assert_relative_eq!(outputs[0][0][3], 1.0, epsilon = 1e-5);
        assert_eq!(outputs[0][0][2], 0.0);
    }
}
