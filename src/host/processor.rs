//! Processor trait of the software host and its type-erased wrapper.

use dasp_graph::Buffer;
use rtrb::Consumer;

/// Channel buffers of one node input or output.
pub(crate) type Channels = Vec<Buffer>;

/// Information available during processing of one render quantum.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ProcessContext {
    /// Sample rate of the context in Hz
    pub sample_rate: f32,
    /// Frames per quantum (always [`Buffer::LEN`])
    pub buffer_size: usize,
    /// Index of the first frame of this quantum
    pub frame: u64,
}

impl ProcessContext {
    /// Context time of frame `i` within this quantum.
    #[inline]
    pub fn time(&self, i: usize) -> f64 {
        (self.frame + i as u64) as f64 / self.sample_rate as f64
    }

    /// Context time of the first frame after this quantum.
    #[inline]
    pub fn end_time(&self) -> f64 {
        self.time(self.buffer_size)
    }
}

/// One kind of host primitive.
///
/// Control data reaches a processor through messages, pushed by its handle and
/// drained before every quantum. Processors without control data use `()`.
///
/// `inputs` holds one mixed entry per input, `params` one a-rate buffer per
/// parameter (automation plus connected signals), and `outputs` one entry per
/// output. A processor sets the channel count of each output by resizing it.
pub(crate) trait HostProcessor: Send + 'static {
    type Message: Send + 'static;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = Self::Message>,
        inputs: &[Channels],
        params: &[Buffer],
        outputs: &mut [Channels],
    );
}

// Type-erased wrapper so the engine can store heterogeneous processors
pub(crate) trait ErasedProcessor: Send {
    /// Move queued messages out of the ring so the producer can push again.
    fn drain(&mut self);

    fn process_erased(
        &mut self,
        ctx: &ProcessContext,
        inputs: &[Channels],
        params: &[Buffer],
        outputs: &mut [Channels],
    );
}

pub(crate) struct ProcessorWrapper<P: HostProcessor> {
    processor: P,
    receiver: Consumer<P::Message>,
    pending: Vec<P::Message>,
}

impl<P: HostProcessor> ProcessorWrapper<P> {
    pub fn new(processor: P, receiver: Consumer<P::Message>) -> Self {
        Self {
            processor,
            receiver,
            pending: Vec::new(),
        }
    }
}

impl<P: HostProcessor> ErasedProcessor for ProcessorWrapper<P> {
    fn drain(&mut self) {
        while let Ok(msg) = self.receiver.pop() {
            self.pending.push(msg);
        }
    }

    fn process_erased(
        &mut self,
        ctx: &ProcessContext,
        inputs: &[Channels],
        params: &[Buffer],
        outputs: &mut [Channels],
    ) {
        // Split borrow between the queues and the processor
        let receiver = &mut self.receiver;
        let messages = self
            .pending
            .drain(..)
            .chain(core::iter::from_fn(|| receiver.pop().ok()));
        self.processor.process(ctx, messages, inputs, params, outputs);
    }
}

/// Resize an output to `channels` buffers and silence them.
#[inline]
pub(crate) fn reset_output(output: &mut Channels, channels: usize) {
    output.resize(channels, Buffer::SILENT);
    for buffer in output.iter_mut() {
        buffer.silence();
    }
}
