use std::sync::Arc;

use crate::capabilities::CapabilityCache;
use crate::error::Result;
use crate::graph::NodeSnapshot;
use crate::native::{create_native_iir_filter, BoxFuture, NativeContextRef, NativeNode};
use crate::nodes::NodeKind;
use crate::render::traversal::kind_mismatch;
use crate::render::{AudioNodeRenderer, RenderMemo};

renderer!(
    /// Hands out the native context's destination.
    DestinationRenderer
);

impl AudioNodeRenderer for DestinationRenderer {
    fn memo(&self) -> &RenderMemo {
        &self.memo
    }

    fn create_native<'a>(
        &'a self,
        node: &'a NodeSnapshot,
        native: &'a NativeContextRef,
        _cache: &'a CapabilityCache,
    ) -> BoxFuture<'a, Result<NativeNode>> {
        Box::pin(async move {
            let NodeKind::Destination(_) = &node.kind else {
                return Err(kind_mismatch("destination", node));
            };
            Ok(native.destination())
        })
    }
}

renderer!(GainRenderer);

impl AudioNodeRenderer for GainRenderer {
    fn memo(&self) -> &RenderMemo {
        &self.memo
    }

    fn create_native<'a>(
        &'a self,
        node: &'a NodeSnapshot,
        native: &'a NativeContextRef,
        _cache: &'a CapabilityCache,
    ) -> BoxFuture<'a, Result<NativeNode>> {
        Box::pin(async move {
            let NodeKind::Gain(_) = &node.kind else {
                return Err(kind_mismatch("gain", node));
            };
            native.create_gain(node.channel)
        })
    }
}

renderer!(BiquadFilterRenderer);

impl AudioNodeRenderer for BiquadFilterRenderer {
    fn memo(&self) -> &RenderMemo {
        &self.memo
    }

    fn create_native<'a>(
        &'a self,
        node: &'a NodeSnapshot,
        native: &'a NativeContextRef,
        _cache: &'a CapabilityCache,
    ) -> BoxFuture<'a, Result<NativeNode>> {
        Box::pin(async move {
            let NodeKind::BiquadFilter(filter) = &node.kind else {
                return Err(kind_mismatch("biquad filter", node));
            };
            native.create_biquad_filter(filter.filter_type, node.channel)
        })
    }
}

renderer!(DelayRenderer);

impl AudioNodeRenderer for DelayRenderer {
    fn memo(&self) -> &RenderMemo {
        &self.memo
    }

    fn create_native<'a>(
        &'a self,
        node: &'a NodeSnapshot,
        native: &'a NativeContextRef,
        _cache: &'a CapabilityCache,
    ) -> BoxFuture<'a, Result<NativeNode>> {
        Box::pin(async move {
            let NodeKind::Delay(delay) = &node.kind else {
                return Err(kind_mismatch("delay", node));
            };
            native.create_delay(delay.max_delay_time, node.channel)
        })
    }
}

renderer!(
    /// Renders natively or through the IIR filter faker, whichever the host
    /// supports.
    IirFilterRenderer
);

impl AudioNodeRenderer for IirFilterRenderer {
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
            let NodeKind::IirFilter(filter) = &node.kind else {
                return Err(kind_mismatch("IIR filter", node));
            };
            let filter = create_native_iir_filter(
                &**native,
                cache,
                &filter.feedforward,
                &filter.feedback,
                node.channel,
            )?;
            Ok(Arc::new(filter) as NativeNode)
        })
    }
}

renderer!(ChannelMergerRenderer);

impl AudioNodeRenderer for ChannelMergerRenderer {
    fn memo(&self) -> &RenderMemo {
        &self.memo
    }

    fn create_native<'a>(
        &'a self,
        node: &'a NodeSnapshot,
        native: &'a NativeContextRef,
        _cache: &'a CapabilityCache,
    ) -> BoxFuture<'a, Result<NativeNode>> {
        Box::pin(async move {
            let NodeKind::ChannelMerger(merger) = &node.kind else {
                return Err(kind_mismatch("channel merger", node));
            };
            native.create_channel_merger(merger.number_of_inputs)
        })
    }
}

renderer!(ChannelSplitterRenderer);

impl AudioNodeRenderer for ChannelSplitterRenderer {
    fn memo(&self) -> &RenderMemo {
        &self.memo
    }

    fn create_native<'a>(
        &'a self,
        node: &'a NodeSnapshot,
        native: &'a NativeContextRef,
        _cache: &'a CapabilityCache,
    ) -> BoxFuture<'a, Result<NativeNode>> {
        Box::pin(async move {
            let NodeKind::ChannelSplitter(splitter) = &node.kind else {
                return Err(kind_mismatch("channel splitter", node));
            };
            native.create_channel_splitter(splitter.number_of_outputs)
        })
    }
}
