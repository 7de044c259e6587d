use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use super::renderers::{
    AudioBufferSourceRenderer, AudioWorkletRenderer, BiquadFilterRenderer, ChannelMergerRenderer,
    ChannelSplitterRenderer, ConstantSourceRenderer, DelayRenderer, DestinationRenderer, GainRenderer,
    IirFilterRenderer, OscillatorRenderer,
};
use super::AudioNodeRenderer;
use crate::graph::NodeId;
use crate::node::AudioNode;
use crate::nodes::NodeKind;

/// Maps the nodes of one context to their renderers.
///
/// An entry lives as long as the context that owns the registry.
#[derive(Default)]
pub struct RendererRegistry {
    renderers: Mutex<HashMap<NodeId, Arc<dyn AudioNodeRenderer>>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: &AudioNode) -> Option<Arc<dyn AudioNodeRenderer>> {
        self.renderers.lock().get(&node.id()).cloned()
    }

    /// Replace the renderer of `node`.
    pub fn set(&self, node: &AudioNode, renderer: Arc<dyn AudioNodeRenderer>) {
        self.insert(node.id(), renderer);
    }

    pub(crate) fn insert(&self, node: NodeId, renderer: Arc<dyn AudioNodeRenderer>) {
        self.renderers.lock().insert(node, renderer);
    }
}

/// A fresh renderer for a node of `kind`.
pub fn renderer_for(kind: &NodeKind) -> Arc<dyn AudioNodeRenderer> {
    match kind {
        NodeKind::Destination(_) => Arc::new(DestinationRenderer::default()),
        NodeKind::Gain(_) => Arc::new(GainRenderer::default()),
        NodeKind::BiquadFilter(_) => Arc::new(BiquadFilterRenderer::default()),
        NodeKind::Delay(_) => Arc::new(DelayRenderer::default()),
        NodeKind::IirFilter(_) => Arc::new(IirFilterRenderer::default()),
        NodeKind::ChannelMerger(_) => Arc::new(ChannelMergerRenderer::default()),
        NodeKind::ChannelSplitter(_) => Arc::new(ChannelSplitterRenderer::default()),
        NodeKind::AudioWorklet(_) => Arc::new(AudioWorkletRenderer::default()),
        NodeKind::Oscillator(_) => Arc::new(OscillatorRenderer::default()),
        NodeKind::AudioBufferSource(_) => Arc::new(AudioBufferSourceRenderer::default()),
        NodeKind::ConstantSource(_) => Arc::new(ConstantSourceRenderer::default()),
    }
}
