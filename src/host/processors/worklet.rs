use dasp_graph::Buffer;
use hashbrown::HashMap;

use crate::host::processor::{reset_output, Channels, HostProcessor, ProcessContext};
use crate::worklet::AudioWorkletProcessor;

/// Hosts a user-defined worklet processor.
pub(crate) struct WorkletProcessor {
    processor: Box<dyn AudioWorkletProcessor>,
    param_names: Vec<String>,
    output_channel_count: Vec<usize>,
    active: bool,
    inputs: Vec<Vec<Vec<f32>>>,
    outputs: Vec<Vec<Vec<f32>>>,
    parameters: HashMap<String, Vec<f32>>,
}

impl WorkletProcessor {
    pub fn new(
        processor: Box<dyn AudioWorkletProcessor>,
        param_names: Vec<String>,
        output_channel_count: Vec<usize>,
    ) -> Self {
        let outputs = output_channel_count
            .iter()
            .map(|&channels| vec![vec![0.0; Buffer::LEN]; channels])
            .collect();
        Self {
            processor,
            param_names,
            output_channel_count,
            active: true,
            inputs: Vec::new(),
            outputs,
            parameters: HashMap::new(),
        }
    }
}

impl HostProcessor for WorkletProcessor {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Channels],
        params: &[Buffer],
        outputs: &mut [Channels],
    ) {
        for (output, &channels) in outputs.iter_mut().zip(&self.output_channel_count) {
            reset_output(output, channels);
        }
        if !self.active {
            return;
        }

        self.inputs.resize_with(inputs.len(), Vec::new);
        for (dst, input) in self.inputs.iter_mut().zip(inputs) {
            dst.resize_with(input.len(), Vec::new);
            for (channel, buffer) in dst.iter_mut().zip(input) {
                channel.clear();
                channel.extend_from_slice(buffer);
            }
        }
        for (name, values) in self.param_names.iter().zip(params) {
            let entry = self.parameters.entry_ref(name.as_str()).or_default();
            entry.clear();
            entry.extend_from_slice(values);
        }
        for channel in self.outputs.iter_mut().flatten() {
            channel.iter_mut().for_each(|s| *s = 0.0);
        }

        self.active = self
            .processor
            .process(&self.inputs, &mut self.outputs, &self.parameters);

        for (output, rendered) in outputs.iter_mut().zip(&self.outputs) {
            for (out, channel) in output.iter_mut().zip(rendered) {
                let frames = channel.len().min(Buffer::LEN);
                out[..frames].copy_from_slice(&channel[..frames]);
            }
        }
    }
}
