//! The abstract offline context: owns the graph and renders it once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::AudioBuffer;
use crate::capabilities::CapabilityCache;
use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};
use crate::graph::{AudioGraph, NodeId};
use crate::native::NativeContextRef;
use crate::node::AudioNode;
use crate::nodes::NodeKind;
use crate::render::{self, patch_buffer, registry::renderer_for, RendererRegistry};
use crate::worklet::ProcessorDefinition;

/// State shared by an [`OfflineAudioContext`] and every node handle it
/// hands out.
pub(crate) struct ContextInner {
    native: NativeContextRef,
    cache: Arc<CapabilityCache>,
    graph: Mutex<AudioGraph>,
    registry: RendererRegistry,
    modules: Mutex<HashMap<String, ProcessorDefinition>>,
    destination: NodeId,
    rendered: AtomicBool,
}

impl ContextInner {
    pub fn cache(&self) -> &Arc<CapabilityCache> {
        &self.cache
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &Mutex<AudioGraph> {
        &self.graph
    }
}

/// A standardized audio graph rendered offline into a native context.
///
/// Nodes are added with [`add`](Self::add) and wired through the returned
/// [`AudioNode`] handles. [`start_rendering`](Self::start_rendering) builds the
/// native graph (faking whatever the host lacks) and renders it.
///
/// ```
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use std::sync::Arc;
/// use einklang::host::SoftwareContext;
/// use einklang::nodes::{ConstantSource, Gain};
/// use einklang::{OfflineAudioContext, OfflineContextOptions};
///
/// let options = OfflineContextOptions::new(1, 128, 44_100.0);
/// let context = OfflineAudioContext::new(Arc::new(SoftwareContext::new(options).unwrap()));
///
/// let source = context.add(ConstantSource::new(1.0)).unwrap();
/// let gain = context.add(Gain::new(0.5)).unwrap();
/// source.connect(&gain).unwrap();
/// gain.connect(&context.destination()).unwrap();
/// source.start(0.0).unwrap();
///
/// let buffer = context.start_rendering().await.unwrap();
/// assert!(buffer.get_channel_data(0).unwrap().iter().all(|&s| s == 0.5));
/// # });
/// ```
#[derive(Clone)]
pub struct OfflineAudioContext {
    inner: Arc<ContextInner>,
}

impl OfflineAudioContext {
    /// A context rendering into `native`, sharing the process-wide capability cache.
    pub fn new(native: NativeContextRef) -> Self {
        Self::with_cache(native, CapabilityCache::global())
    }

    /// A context rendering into `native` with its own capability cache.
    pub fn with_cache(native: NativeContextRef, cache: Arc<CapabilityCache>) -> Self {
        let mut graph = AudioGraph::new();
        let destination = graph.add_node(
            NodeKind::Destination(ChannelConfig::explicit(native.number_of_channels())),
            Vec::new(),
        );
        let registry = RendererRegistry::new();
        registry.insert(destination, renderer_for(&graph.node(destination).kind));
        Self {
            inner: Arc::new(ContextInner {
                native,
                cache,
                graph: Mutex::new(graph),
                registry,
                modules: Mutex::new(HashMap::new()),
                destination,
                rendered: AtomicBool::new(false),
            }),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.inner.native.sample_rate()
    }

    /// Frames of the rendered buffer.
    pub fn length(&self) -> usize {
        self.inner.native.length()
    }

    pub fn number_of_channels(&self) -> usize {
        self.inner.native.number_of_channels()
    }

    /// The native context this context renders into.
    pub fn native(&self) -> &NativeContextRef {
        &self.inner.native
    }

    pub fn cache(&self) -> &Arc<CapabilityCache> {
        &self.inner.cache
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.inner.registry
    }

    pub fn destination(&self) -> AudioNode {
        AudioNode::new(self.inner.clone(), self.inner.destination)
    }

    /// Add a node built from `options`.
    ///
    /// Worklet nodes need their processor registered first, see
    /// [`add_audio_worklet_module`](Self::add_audio_worklet_module).
    pub fn add(&self, options: impl Into<NodeKind>) -> Result<AudioNode> {
        let mut kind = options.into();
        match &mut kind {
            NodeKind::Destination(_) => {
                return Err(AudioError::invalid_state("a context has exactly one destination"));
            }
            NodeKind::AudioWorklet(worklet) => {
                let definition = self.inner.modules.lock().get(&worklet.name).cloned().ok_or_else(|| {
                    AudioError::invalid_state(format!("no processor registered as {:?}", worklet.name))
                })?;
                worklet.bind(definition)?;
            }
            _ => {}
        }
        kind.validate()?;

        let params = kind.params(self.sample_rate() / 2.0);
        let renderer = renderer_for(&kind);
        let name = kind.name();
        let id = self.inner.graph.lock().add_node(kind, params);
        self.inner.registry.insert(id, renderer);
        debug!(node = ?id, kind = name, "added node");
        Ok(AudioNode::new(self.inner.clone(), id))
    }

    /// A zeroed buffer, for example to play through an
    /// [`AudioBufferSource`](crate::nodes::AudioBufferSource).
    pub fn create_buffer(&self, number_of_channels: usize, length: usize, sample_rate: f32) -> Result<AudioBuffer> {
        let native = self.inner.native.create_buffer(number_of_channels, length, sample_rate)?;
        patch_buffer(native, &*self.inner.native, &self.inner.cache)
    }

    /// Register a processor under `name` for [`AudioWorklet`](crate::nodes::AudioWorklet) nodes.
    pub fn add_audio_worklet_module(&self, name: impl Into<String>, definition: ProcessorDefinition) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(AudioError::not_supported("processor names must not be empty"));
        }
        let mut modules = self.inner.modules.lock();
        if modules.contains_key(&name) {
            return Err(AudioError::not_supported(format!("a processor named {:?} already exists", name)));
        }
        debug!(%name, params = definition.parameter_descriptors.len(), "registered processor");
        modules.insert(name, definition);
        Ok(())
    }

    /// Render the graph. A context renders at most once.
    pub async fn start_rendering(&self) -> Result<AudioBuffer> {
        if self.inner.rendered.swap(true, Ordering::SeqCst) {
            return Err(AudioError::invalid_state("this context has already been rendered"));
        }
        render::start_rendering(&self.destination(), &self.inner.native).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SoftwareContext;
    use crate::nodes::{AudioWorklet, Gain};
    use crate::worklet::{AudioWorkletProcessor, ParamDescriptor};
    use crate::OfflineContextOptions;

    struct Passthrough;

    impl AudioWorkletProcessor for Passthrough {
        fn process(
            &mut self,
            inputs: &[Vec<Vec<f32>>],
            outputs: &mut [Vec<Vec<f32>>],
            _params: &HashMap<String, Vec<f32>>,
        ) -> bool {
            for (input, output) in inputs.iter().zip(outputs.iter_mut()) {
                for (i, o) in input.iter().zip(output.iter_mut()) {
                    o.copy_from_slice(i);
                }
            }
            true
        }
    }

    fn context() -> OfflineAudioContext {
        let native = SoftwareContext::new(OfflineContextOptions::new(1, 64, 8_000.0)).unwrap();
        OfflineAudioContext::with_cache(Arc::new(native), Arc::new(CapabilityCache::new()))
    }

    #[test]
    fn destination_follows_the_native_context() {
        let context = context();
        let destination = context.destination();
        assert_eq!(destination.number_of_inputs(), 1);
        assert_eq!(destination.number_of_outputs(), 0);
        assert_eq!(destination.channel_config().count, 1);
        assert!(context.registry().get(&destination).is_some());
    }

    #[test]
    fn worklets_need_a_registered_processor() {
        let context = context();
        assert!(matches!(
            context.add(AudioWorklet::new("passthrough")),
            Err(AudioError::InvalidState(_))
        ));
        let definition = ProcessorDefinition::new(|_| Box::new(Passthrough)).with_param(ParamDescriptor::new("mix", 1.0));
        context.add_audio_worklet_module("passthrough", definition.clone()).unwrap();
        assert!(matches!(
            context.add_audio_worklet_module("passthrough", definition),
            Err(AudioError::NotSupported(_))
        ));
        let node = context.add(AudioWorklet::new("passthrough")).unwrap();
        assert_eq!(node.param("mix").unwrap().value(), 1.0);
    }

    #[tokio::test]
    async fn renders_only_once() {
        let context = context();
        let gain = context.add(Gain::new(1.0)).unwrap();
        gain.connect(&context.destination()).unwrap();
        let buffer = context.start_rendering().await.unwrap();
        assert_eq!(buffer.length(), 64);
        assert!(matches!(
            context.start_rendering().await,
            Err(AudioError::InvalidState(_))
        ));
    }
}
