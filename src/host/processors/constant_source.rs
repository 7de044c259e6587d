use dasp_graph::Buffer;

use super::{Schedule, SourceMessage};
use crate::host::processor::{reset_output, Channels, HostProcessor, ProcessContext};

/// Outputs its `offset` parameter between start and stop.
#[derive(Default)]
pub(crate) struct ConstantSource {
    schedule: Schedule,
}

impl HostProcessor for ConstantSource {
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
        for (i, sample) in output[0].iter_mut().enumerate() {
            if self.schedule.is_playing(ctx.time(i)) {
                *sample = params[0][i];
            }
        }
        self.schedule.finish_if_stopped(ctx.end_time());
    }
}
