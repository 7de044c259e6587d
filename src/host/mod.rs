//! A pure-software native host.
//!
//! [`SoftwareContext`] implements [`NativeOfflineContext`] on top of a
//! petgraph processing graph. A [`HostProfile`] selects which optional
//! primitives it offers and which known defects it reproduces, so every
//! faking and polyfill path of the renderer can run against it.
//!
//! ```
//! use einklang::host::{HostProfile, SoftwareContext};
//! use einklang::OfflineContextOptions;
//!
//! let options = OfflineContextOptions::default().with_length(128);
//! let host = SoftwareContext::with_profile(options, HostProfile::minimal()).unwrap();
//! # let _ = host;
//! ```

mod buffer;
mod engine;
mod handle;
mod mixing;
mod processor;
mod processors;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dasp_graph::Buffer;
use hashbrown::HashMap;
use parking_lot::Mutex;
use rtrb::{Producer, RingBuffer};
use tracing::{debug, info};

use crate::config::{ChannelConfig, ChannelInterpretation, OfflineContextOptions, MAX_CHANNELS};
use crate::error::{AudioError, Result};
use crate::native::{
    check_iir_coefficients, BiquadFilterType, BoxFuture, BufferSourceOptions, ContextId, Endpoint,
    NativeAudioParam, NativeAudioWorklet, NativeBuffer, NativeIirFilter, NativeNode, NativeOfflineContext, NativeSource,
    OscillatorType, ScriptProcessorCallback,
};
use crate::worklet::{AudioWorkletNodeOptions, ProcessorDefinition};

use buffer::HostBuffer;
use engine::{Engine, NodeSpec, ParamSpec, QUEUE_SIZE};
use handle::{HostIirFilter, HostNode, HostParam, HostSource};
use processor::{HostProcessor, ProcessorWrapper};
use processors::{
    BiquadFilter, BufferSource, ChannelMerger, ChannelSplitter, ConstantSource, Delay, Destination, Gain,
    IirCoefficients, IirFilter, Oscillator, ScriptProcessor, WorkletProcessor,
};

/// Which `copyFromChannel`/`copyToChannel` behavior buffers of a host have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CopyChannelSupport {
    /// Both methods, tolerant of an offset at or past the end
    Full,
    /// Neither method
    Missing,
    /// Both methods, failing whenever the offset is not below the length
    NoOffsetPastLength,
}

/// Capabilities and defects of a [`SoftwareContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HostProfile {
    pub constant_source: bool,
    pub iir_filter: bool,
    pub audio_worklet: bool,
    pub copy_channel: CopyChannelSupport,
    /// Whether `stop` may be called again on a stopped source
    pub consecutive_stop_calls: bool,
}

impl Default for HostProfile {
    fn default() -> Self {
        Self::complete()
    }
}

impl HostProfile {
    /// A host offering every primitive, without defects.
    pub fn complete() -> Self {
        Self {
            constant_source: true,
            iir_filter: true,
            audio_worklet: true,
            copy_channel: CopyChannelSupport::Full,
            consecutive_stop_calls: true,
        }
    }

    /// A host lacking every optional primitive and carrying every defect.
    pub fn minimal() -> Self {
        Self {
            constant_source: false,
            iir_filter: false,
            audio_worklet: false,
            copy_channel: CopyChannelSupport::Missing,
            consecutive_stop_calls: false,
        }
    }

    pub fn with_constant_source(mut self, supported: bool) -> Self {
        self.constant_source = supported;
        self
    }

    pub fn with_iir_filter(mut self, supported: bool) -> Self {
        self.iir_filter = supported;
        self
    }

    pub fn with_audio_worklet(mut self, supported: bool) -> Self {
        self.audio_worklet = supported;
        self
    }

    pub fn with_copy_channel(mut self, support: CopyChannelSupport) -> Self {
        self.copy_channel = support;
        self
    }

    pub fn with_consecutive_stop_calls(mut self, supported: bool) -> Self {
        self.consecutive_stop_calls = supported;
        self
    }
}

pub(crate) struct Shared {
    pub(crate) id: ContextId,
    pub(crate) options: OfflineContextOptions,
    pub(crate) profile: HostProfile,
    pub(crate) engine: Mutex<Engine>,
    rendered: AtomicBool,
}

impl Shared {
    fn connect(&self, from: Endpoint, to: Endpoint) -> Result<()> {
        if from.context != self.id || to.context != self.id {
            return Err(AudioError::invalid_access(
                "cannot connect nodes of different contexts",
            ));
        }
        self.engine.lock().connect(from, to)
    }

    fn add_node<P: HostProcessor>(self: &Arc<Self>, spec: NodeSpec, processor: P) -> (HostNode, Producer<P::Message>) {
        let (producer, consumer) = RingBuffer::new(QUEUE_SIZE);
        let (inputs, outputs) = (spec.inputs, spec.outputs);
        let param_specs = spec.params.clone();
        let (index, senders) = self
            .engine
            .lock()
            .add_node(spec, Box::new(ProcessorWrapper::new(processor, consumer)));
        let params = param_specs
            .into_iter()
            .zip(senders)
            .enumerate()
            .map(|(i, (spec, sender))| Arc::new(HostParam::new(self.clone(), index, i, spec, sender)))
            .collect();
        let node = HostNode {
            shared: self.clone(),
            index,
            inputs,
            outputs,
            params,
        };
        (node, producer)
    }

    fn nyquist(&self) -> f32 {
        self.options.sample_rate / 2.0
    }
}

/// An offline context rendered entirely in software.
pub struct SoftwareContext {
    shared: Arc<Shared>,
    destination: NativeNode,
    worklet: Option<HostWorklet>,
}

impl SoftwareContext {
    /// A host offering every primitive.
    pub fn new(options: OfflineContextOptions) -> Result<Self> {
        Self::with_profile(options, HostProfile::complete())
    }

    pub fn with_profile(options: OfflineContextOptions, profile: HostProfile) -> Result<Self> {
        options.validate()?;
        let (_, consumer) = RingBuffer::new(1);
        let channel = ChannelConfig::explicit(options.number_of_channels);
        let engine = Engine::new(
            options.sample_rate,
            NodeSpec::new("destination", 1, 1, channel),
            Box::new(ProcessorWrapper::new(Destination, consumer)),
        );
        let index = engine.destination();
        let shared = Arc::new(Shared {
            id: ContextId::next(),
            options,
            profile,
            engine: Mutex::new(engine),
            rendered: AtomicBool::new(false),
        });
        let destination = Arc::new(HostNode {
            shared: shared.clone(),
            index,
            inputs: 1,
            outputs: 0,
            params: Vec::new(),
        });
        let worklet = profile.audio_worklet.then(|| HostWorklet {
            shared: shared.clone(),
            modules: Mutex::new(HashMap::new()),
        });
        debug!(id = ?shared.id, ?profile, "created software context");
        Ok(Self {
            shared,
            destination,
            worklet,
        })
    }

    pub fn profile(&self) -> HostProfile {
        self.shared.profile
    }

    pub fn options(&self) -> OfflineContextOptions {
        self.shared.options
    }
}

impl NativeOfflineContext for SoftwareContext {
    fn id(&self) -> ContextId {
        self.shared.id
    }

    fn sample_rate(&self) -> f32 {
        self.shared.options.sample_rate
    }

    fn length(&self) -> usize {
        self.shared.options.length
    }

    fn number_of_channels(&self) -> usize {
        self.shared.options.number_of_channels
    }

    fn render_quantum_size(&self) -> usize {
        Buffer::LEN
    }

    fn destination(&self) -> NativeNode {
        self.destination.clone()
    }

    fn create_buffer(&self, number_of_channels: usize, length: usize, sample_rate: f32) -> Result<NativeBuffer> {
        OfflineContextOptions::new(number_of_channels, length, sample_rate).validate()?;
        Ok(Arc::new(HostBuffer::new(
            number_of_channels,
            length,
            sample_rate,
            self.shared.profile.copy_channel,
        )))
    }

    fn create_gain(&self, channel: ChannelConfig) -> Result<NativeNode> {
        channel.validate()?;
        let spec = NodeSpec::new("gain", 1, 1, channel).with_param(ParamSpec::new("gain", 1.0));
        let (node, _) = self.shared.add_node(spec, Gain);
        Ok(Arc::new(node))
    }

    fn create_delay(&self, max_delay_time: f64, channel: ChannelConfig) -> Result<NativeNode> {
        channel.validate()?;
        if !(max_delay_time > 0.0 && max_delay_time < 180.0) {
            return Err(AudioError::not_supported(format!(
                "maximum delay time {} is outside (0, 180)",
                max_delay_time
            )));
        }
        let spec = NodeSpec::new("delay", 1, 1, channel)
            .with_param(ParamSpec::new("delayTime", 0.0).with_range(0.0, max_delay_time as f32));
        let (node, _) = self
            .shared
            .add_node(spec, Delay::new(max_delay_time, self.shared.options.sample_rate));
        Ok(Arc::new(node))
    }

    fn create_biquad_filter(&self, filter_type: BiquadFilterType, channel: ChannelConfig) -> Result<NativeNode> {
        channel.validate()?;
        let nyquist = self.shared.nyquist();
        let spec = NodeSpec::new("biquad filter", 1, 1, channel)
            .with_param(ParamSpec::new("frequency", 350.0).with_range(0.0, nyquist))
            .with_param(ParamSpec::new("detune", 0.0))
            .with_param(ParamSpec::new("Q", 1.0))
            .with_param(ParamSpec::new("gain", 0.0));
        let (node, _) = self.shared.add_node(spec, BiquadFilter::new(filter_type));
        Ok(Arc::new(node))
    }

    fn create_oscillator(&self, oscillator_type: OscillatorType, channel: ChannelConfig) -> Result<NativeSource> {
        channel.validate()?;
        let nyquist = self.shared.nyquist();
        let spec = NodeSpec::new("oscillator", 0, 1, channel)
            .with_param(ParamSpec::new("frequency", 440.0).with_range(-nyquist, nyquist))
            .with_param(ParamSpec::new("detune", 0.0));
        let (node, sender) = self.shared.add_node(spec, Oscillator::new(oscillator_type));
        Ok(Arc::new(HostSource::new(node, sender)))
    }

    fn create_buffer_source(&self, options: BufferSourceOptions, channel: ChannelConfig) -> Result<NativeSource> {
        channel.validate()?;
        let processor = BufferSource::new(&options)?;
        let spec = NodeSpec::new("buffer source", 0, 1, channel)
            .with_param(ParamSpec::new("playbackRate", 1.0))
            .with_param(ParamSpec::new("detune", 0.0));
        let (node, sender) = self.shared.add_node(spec, processor);
        Ok(Arc::new(HostSource::new(node, sender)))
    }

    fn create_channel_merger(&self, number_of_inputs: usize) -> Result<NativeNode> {
        if number_of_inputs == 0 || number_of_inputs > MAX_CHANNELS {
            return Err(AudioError::index_size(format!(
                "a merger needs 1..={} inputs, not {}",
                MAX_CHANNELS, number_of_inputs
            )));
        }
        let spec = NodeSpec::new("channel merger", number_of_inputs, 1, ChannelConfig::explicit(1));
        let (node, _) = self.shared.add_node(spec, ChannelMerger);
        Ok(Arc::new(node))
    }

    fn create_channel_splitter(&self, number_of_outputs: usize) -> Result<NativeNode> {
        if number_of_outputs == 0 || number_of_outputs > MAX_CHANNELS {
            return Err(AudioError::index_size(format!(
                "a splitter needs 1..={} outputs, not {}",
                MAX_CHANNELS, number_of_outputs
            )));
        }
        let channel = ChannelConfig::explicit(number_of_outputs).with_interpretation(ChannelInterpretation::Discrete);
        let spec = NodeSpec::new("channel splitter", 1, number_of_outputs, channel);
        let (node, _) = self.shared.add_node(spec, ChannelSplitter);
        Ok(Arc::new(node))
    }

    fn create_script_processor(
        &self,
        buffer_size: usize,
        number_of_input_channels: usize,
        number_of_output_channels: usize,
        callback: ScriptProcessorCallback,
    ) -> Result<NativeNode> {
        if !buffer_size.is_power_of_two() || !(Buffer::LEN..=16_384).contains(&buffer_size) {
            return Err(AudioError::index_size(format!("unsupported buffer size {}", buffer_size)));
        }
        if number_of_input_channels > MAX_CHANNELS
            || number_of_output_channels == 0
            || number_of_output_channels > MAX_CHANNELS
        {
            return Err(AudioError::not_supported(format!(
                "unsupported channel layout {} -> {}",
                number_of_input_channels, number_of_output_channels
            )));
        }
        let inputs = usize::from(number_of_input_channels > 0);
        let channel = ChannelConfig::explicit(number_of_input_channels.max(1));
        let spec = NodeSpec::new("script processor", inputs, 1, channel);
        let processor = ScriptProcessor::new(
            buffer_size,
            number_of_input_channels,
            number_of_output_channels,
            callback,
        );
        let (node, _) = self.shared.add_node(spec, processor);
        Ok(Arc::new(node))
    }

    fn create_constant_source(&self, channel: ChannelConfig) -> Result<NativeSource> {
        if !self.shared.profile.constant_source {
            return Err(AudioError::not_supported("this host has no constant source"));
        }
        channel.validate()?;
        let spec = NodeSpec::new("constant source", 0, 1, channel).with_param(ParamSpec::new("offset", 1.0));
        let (node, sender) = self.shared.add_node(spec, ConstantSource::default());
        Ok(Arc::new(HostSource::new(node, sender)))
    }

    fn create_iir_filter(
        &self,
        feedforward: &[f64],
        feedback: &[f64],
        channel: ChannelConfig,
    ) -> Result<Arc<dyn NativeIirFilter>> {
        if !self.shared.profile.iir_filter {
            return Err(AudioError::not_supported("this host has no IIR filter"));
        }
        channel.validate()?;
        check_iir_coefficients(feedforward, feedback)?;
        let coefficients = IirCoefficients::new(feedforward, feedback)?;
        let spec = NodeSpec::new("IIR filter", 1, 1, channel);
        let (node, _) = self.shared.add_node(spec, IirFilter::new(coefficients.clone()));
        Ok(Arc::new(HostIirFilter::new(node, coefficients)))
    }

    fn audio_worklet(&self) -> Option<&dyn NativeAudioWorklet> {
        self.worklet.as_ref().map(|worklet| worklet as &dyn NativeAudioWorklet)
    }

    fn start_rendering(&self) -> BoxFuture<'_, Result<NativeBuffer>> {
        Box::pin(async move {
            if self.shared.rendered.swap(true, Ordering::SeqCst) {
                return Err(AudioError::invalid_state("the context has already been rendered"));
            }
            let OfflineContextOptions {
                number_of_channels,
                length,
                sample_rate,
            } = self.shared.options;
            let channels = self.shared.engine.lock().render(length, number_of_channels);
            info!(id = ?self.shared.id, length, "software context rendered");
            Ok(Arc::new(HostBuffer::from_channels(
                channels,
                sample_rate,
                self.shared.profile.copy_channel,
            )) as NativeBuffer)
        })
    }
}

/// Processor registry of a [`SoftwareContext`].
struct HostWorklet {
    shared: Arc<Shared>,
    modules: Mutex<HashMap<String, ProcessorDefinition>>,
}

impl NativeAudioWorklet for HostWorklet {
    fn add_module(&self, name: &str, definition: ProcessorDefinition) -> BoxFuture<'_, Result<()>> {
        let name = name.to_owned();
        Box::pin(async move {
            debug!(%name, "registered worklet processor");
            self.modules.lock().insert(name, definition);
            Ok(())
        })
    }

    fn create_node(&self, name: &str, options: &AudioWorkletNodeOptions) -> Result<NativeNode> {
        let definition = self
            .modules
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| AudioError::invalid_state(format!("no processor named {:?}", name)))?;
        let options = options.clone().resolve()?;

        let mut spec = NodeSpec::new(
            "audio worklet",
            options.number_of_inputs,
            options.number_of_outputs,
            options.channel,
        );
        for descriptor in &definition.parameter_descriptors {
            if descriptor.min_value > descriptor.max_value {
                return Err(AudioError::not_supported(format!(
                    "parameter {:?} has an empty range",
                    descriptor.name
                )));
            }
            spec = spec.with_param(
                ParamSpec::new(&descriptor.name, descriptor.default_value)
                    .with_range(descriptor.min_value, descriptor.max_value),
            );
        }
        let names = definition
            .parameter_descriptors
            .iter()
            .map(|descriptor| descriptor.name.clone())
            .collect();
        let processor = WorkletProcessor::new(
            definition.instantiate(&options),
            names,
            options.output_channel_count.clone(),
        );
        let (node, _) = self.shared.add_node(spec, processor);
        for (descriptor, param) in definition.parameter_descriptors.iter().zip(&node.params) {
            let value = options.initial_value(descriptor);
            if value != descriptor.default_value {
                param.set_value(value)?;
            }
        }
        Ok(Arc::new(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(profile: HostProfile) -> SoftwareContext {
        let options = OfflineContextOptions::new(1, 128, 44_100.0);
        SoftwareContext::with_profile(options, profile).unwrap()
    }

    #[tokio::test]
    async fn renders_a_constant_source() {
        let host = context(HostProfile::complete());
        let source = host.create_constant_source(ChannelConfig::default()).unwrap();
        source.param("offset").unwrap().set_value(0.25).unwrap();
        source.connect(0, host.destination().as_ref(), 0).unwrap();
        source.start(0.0).unwrap();

        let buffer = host.start_rendering().await.unwrap();
        let mut samples = Vec::new();
        buffer.with_channel_data(0, &mut |data| samples.extend_from_slice(data)).unwrap();
        assert_eq!(samples.len(), 128);
        assert!(samples.iter().all(|&s| s == 0.25));
    }

    #[tokio::test]
    async fn second_render_is_rejected() {
        let host = context(HostProfile::complete());
        host.start_rendering().await.unwrap();
        assert!(matches!(host.start_rendering().await, Err(AudioError::InvalidState(_))));
    }

    #[test]
    fn minimal_profile_lacks_optional_primitives() {
        let host = context(HostProfile::minimal());
        assert!(host.create_constant_source(ChannelConfig::default()).is_err());
        assert!(host.create_iir_filter(&[1.0], &[1.0], ChannelConfig::default()).is_err());
        assert!(host.audio_worklet().is_none());
    }

    #[test]
    fn consecutive_stop_calls_follow_the_profile() {
        let tolerant = context(HostProfile::complete());
        let source = tolerant
            .create_buffer_source(BufferSourceOptions::default(), ChannelConfig::default())
            .unwrap();
        source.start(0.0).unwrap();
        source.stop(0.0).unwrap();
        assert!(source.stop(0.0).is_ok());

        let strict = context(HostProfile::minimal());
        let source = strict
            .create_buffer_source(BufferSourceOptions::default(), ChannelConfig::default())
            .unwrap();
        source.start(0.0).unwrap();
        source.stop(0.0).unwrap();
        assert!(matches!(source.stop(0.0), Err(AudioError::InvalidState(_))));
    }

    #[test]
    fn connections_across_contexts_are_rejected() {
        let a = context(HostProfile::complete());
        let b = context(HostProfile::complete());
        let gain = a.create_gain(ChannelConfig::default()).unwrap();
        let result = gain.connect(0, b.destination().as_ref(), 0);
        assert!(matches!(result, Err(AudioError::InvalidAccess(_))));
    }
}
