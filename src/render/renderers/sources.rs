use std::sync::Arc;

use crate::capabilities::CapabilityCache;
use crate::error::Result;
use crate::graph::NodeSnapshot;
use crate::native::{
    create_native_audio_buffer_source, create_native_constant_source, create_native_oscillator, BoxFuture,
    BufferSourceOptions, NativeContextRef, NativeNode, NativeScheduledSource,
};
use crate::nodes::NodeKind;
use crate::render::traversal::kind_mismatch;
use crate::render::{replay_schedule, AudioNodeRenderer, RenderMemo};

renderer!(OscillatorRenderer);

impl AudioNodeRenderer for OscillatorRenderer {
    fn memo(&self) -> &RenderMemo {
        &self.memo
    }

    fn create_native<'a>(
        &'a self,
        node: &'a NodeSnapshot,
        native: &'a NativeContextRef,
        cache: &'a CapabilityCache,
    ) -> BoxFuture<'a, Result<NativeNode>> {
        Box::pin(async move {
            let NodeKind::Oscillator(oscillator) = &node.kind else {
                return Err(kind_mismatch("oscillator", node));
            };
            let source = create_native_oscillator(&**native, cache, oscillator.oscillator_type, node.channel)?;
            replay_schedule(source.as_ref(), &node.schedule)?;
            Ok(source as NativeNode)
        })
    }
}

renderer!(AudioBufferSourceRenderer);

impl AudioNodeRenderer for AudioBufferSourceRenderer {
    fn memo(&self) -> &RenderMemo {
        &self.memo
    }

    fn create_native<'a>(
        &'a self,
        node: &'a NodeSnapshot,
        native: &'a NativeContextRef,
        cache: &'a CapabilityCache,
    ) -> BoxFuture<'a, Result<NativeNode>> {
        Box::pin(async move {
            let NodeKind::AudioBufferSource(options) = &node.kind else {
                return Err(kind_mismatch("audio buffer source", node));
            };
            let options = BufferSourceOptions {
                buffer: options.buffer.as_ref().map(|buffer| buffer.native().clone()),
                looping: options.looping,
                loop_start: options.loop_start,
                loop_end: options.loop_end,
            };
            let source = create_native_audio_buffer_source(&**native, cache, options, node.channel)?;
            replay_schedule(source.as_ref(), &node.schedule)?;
            Ok(source as NativeNode)
        })
    }
}

renderer!(
    /// Renders natively or through the constant source faker, whichever the
    /// host supports.
    ConstantSourceRenderer
);

impl AudioNodeRenderer for ConstantSourceRenderer {
    fn memo(&self) -> &RenderMemo {
        &self.memo
    }

    fn create_native<'a>(
        &'a self,
        node: &'a NodeSnapshot,
        native: &'a NativeContextRef,
        cache: &'a CapabilityCache,
    ) -> BoxFuture<'a, Result<NativeNode>> {
        Box::pin(async move {
            let NodeKind::ConstantSource(_) = &node.kind else {
                return Err(kind_mismatch("constant source", node));
            };
            let source = create_native_constant_source(&**native, cache, node.channel)?;
            replay_schedule(&source as &dyn NativeScheduledSource, &node.schedule)?;
            Ok(Arc::new(source) as NativeNode)
        })
    }
}
