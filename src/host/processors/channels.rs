//! Channel routing primitives.

use dasp_graph::Buffer;

use crate::host::processor::{reset_output, Channels, HostProcessor, ProcessContext};

/// Combines the first channel of each input into one multi-channel output.
pub(crate) struct ChannelMerger;

impl HostProcessor for ChannelMerger {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Channels],
        _params: &[Buffer],
        outputs: &mut [Channels],
    ) {
        let output = &mut outputs[0];
        reset_output(output, inputs.len());
        for (out, input) in output.iter_mut().zip(inputs) {
            if let Some(channel) = input.first() {
                out.copy_from_slice(channel);
            }
        }
    }
}

/// Routes each input channel to its own mono output.
pub(crate) struct ChannelSplitter;

impl HostProcessor for ChannelSplitter {
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
        for (ch, output) in outputs.iter_mut().enumerate() {
            reset_output(output, 1);
            if let Some(channel) = input.get(ch) {
                output[0].copy_from_slice(channel);
            }
        }
    }
}

/// Passes its mixed input through, so the engine can read the rendered quantum.
pub(crate) struct Destination;

impl HostProcessor for Destination {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Channels],
        _params: &[Buffer],
        outputs: &mut [Channels],
    ) {
        outputs[0].clone_from(&inputs[0]);
    }
}
