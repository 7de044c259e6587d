use dasp_graph::Buffer;
use itertools::izip;

use crate::host::processor::{reset_output, Channels, HostProcessor, ProcessContext};

/// Multiplies its input by the a-rate `gain` parameter.
pub(crate) struct Gain;

impl HostProcessor for Gain {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Channels],
        params: &[Buffer],
        outputs: &mut [Channels],
    ) {
        let input = &inputs[0];
        let gain = &params[0];
        let output = &mut outputs[0];
        reset_output(output, input.len());
        for (out, channel) in output.iter_mut().zip(input) {
            for (o, i, g) in izip!(out.iter_mut(), channel.iter(), gain.iter()) {
                *o = i * g;
            }
        }
    }
}
