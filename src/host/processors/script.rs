use dasp_graph::Buffer;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::host::processor::{reset_output, Channels, HostProcessor, ProcessContext};
use crate::native::ScriptProcessorCallback;

/// Runs a callback on blocks of `buffer_size` frames.
///
/// Output is buffered in one FIFO per channel, primed with
/// `buffer_size - quantum` frames of silence. A processor whose block equals
/// the render quantum therefore adds no latency.
pub(crate) struct ScriptProcessor {
    buffer_size: usize,
    callback: ScriptProcessorCallback,
    input_block: Vec<Vec<f32>>,
    output_block: Vec<Vec<f32>>,
    filled: usize,
    fifo: Vec<(Producer<f32>, Consumer<f32>)>,
}

impl ScriptProcessor {
    pub fn new(
        buffer_size: usize,
        input_channels: usize,
        output_channels: usize,
        callback: ScriptProcessorCallback,
    ) -> Self {
        let latency = buffer_size - Buffer::LEN;
        let fifo = (0..output_channels)
            .map(|_| {
                let (mut producer, consumer) = RingBuffer::new(buffer_size * 2);
                for _ in 0..latency {
                    // capacity exceeds the priming length
                    let _ = producer.push(0.0);
                }
                (producer, consumer)
            })
            .collect();
        Self {
            buffer_size,
            callback,
            input_block: vec![vec![0.0; buffer_size]; input_channels],
            output_block: vec![vec![0.0; buffer_size]; output_channels],
            filled: 0,
            fifo,
        }
    }
}

impl HostProcessor for ScriptProcessor {
    type Message = ();

    fn process(
        &mut self,
        ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Channels],
        _params: &[Buffer],
        outputs: &mut [Channels],
    ) {
        let frames = ctx.buffer_size;
        if let Some(input) = inputs.first() {
            for (block, channel) in self.input_block.iter_mut().zip(input) {
                block[self.filled..self.filled + frames].copy_from_slice(channel);
            }
        }
        self.filled += frames;

        if self.filled == self.buffer_size {
            self.filled = 0;
            for channel in &mut self.output_block {
                channel.iter_mut().for_each(|s| *s = 0.0);
            }
            (self.callback)(&self.input_block, &mut self.output_block, ctx.time(0));
            for ((producer, _), channel) in self.fifo.iter_mut().zip(&self.output_block) {
                for &sample in channel {
                    let _ = producer.push(sample);
                }
            }
        }

        let output = &mut outputs[0];
        reset_output(output, self.fifo.len());
        for ((_, consumer), out) in self.fifo.iter_mut().zip(output.iter_mut()) {
            for sample in out.iter_mut() {
                *sample = consumer.pop().unwrap_or(0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(frame: u64) -> ProcessContext {
        ProcessContext {
            sample_rate: 44_100.0,
            buffer_size: Buffer::LEN,
            frame,
        }
    }

    fn doubling() -> ScriptProcessorCallback {
        Box::new(|inputs: &[Vec<f32>], outputs: &mut [Vec<f32>], _: f64| {
            for (input, output) in inputs.iter().zip(outputs.iter_mut()) {
                for (i, o) in input.iter().zip(output.iter_mut()) {
                    *o = i * 2.0;
                }
            }
        })
    }

    #[test]
    fn quantum_sized_blocks_have_no_latency() {
        let mut script = ScriptProcessor::new(Buffer::LEN, 1, 1, doubling());
        let mut input = Buffer::SILENT;
        input[0] = 1.0;
        let mut outputs = vec![Vec::new()];
        script.process(&ctx(0), std::iter::empty(), &[vec![input]], &[], &mut outputs);
        assert_eq!(outputs[0][0][0], 2.0);
    }

    #[test]
    fn larger_blocks_are_delayed_by_their_excess() {
        let mut script = ScriptProcessor::new(4 * Buffer::LEN, 1, 1, doubling());
        let mut input = Buffer::SILENT;
        input[0] = 1.0;
        let mut outputs = vec![Vec::new()];
        script.process(&ctx(0), std::iter::empty(), &[vec![input]], &[], &mut outputs);
        assert_eq!(outputs[0][0][0], 0.0);
        for q in 1..3 {
            script.process(&ctx(q * 64), std::iter::empty(), &[vec![Buffer::SILENT]], &[], &mut outputs);
            assert!(outputs[0][0].iter().all(|&s| s == 0.0));
        }
        script.process(&ctx(192), std::iter::empty(), &[vec![Buffer::SILENT]], &[], &mut outputs);
        assert_eq!(outputs[0][0][0], 2.0);
    }
}
