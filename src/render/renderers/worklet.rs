use std::sync::Arc;

use crate::capabilities::CapabilityCache;
use crate::error::Result;
use crate::graph::NodeSnapshot;
use crate::native::{create_native_audio_worklet_node, BoxFuture, NativeContextRef, NativeNode};
use crate::nodes::NodeKind;
use crate::render::traversal::kind_mismatch;
use crate::render::{AudioNodeRenderer, RenderMemo};

renderer!(
    /// Registers the node's processor with the host worklet and creates a
    /// worklet node, or fakes one on hosts without worklets.
    AudioWorkletRenderer
);

impl AudioNodeRenderer for AudioWorkletRenderer {
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
            let NodeKind::AudioWorklet(worklet) = &node.kind else {
                return Err(kind_mismatch("audio worklet", node));
            };
            let mut options = worklet.options.clone();
            options.channel = node.channel;
            let variant =
                create_native_audio_worklet_node(&**native, cache, &worklet.name, worklet.definition()?, &options)
                    .await?;
            Ok(Arc::new(variant) as NativeNode)
        })
    }
}
