//! An audio worklet node run inside a script processor.
//!
//! ```text
//! input i ─ gain ─ splitter ─┐
//!                            ├─ merger ─ script processor ─ splitter ─┬─ merger (output 0)
//! param p ─ constant source ─┘                                        └─ merger (output 1)
//! ```
//!
//! Every input channel and every parameter occupies one channel of the
//! script processor's input. Each output gets its own merger, so each is a
//! separate native output and can feed back into the node.

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::capabilities::CapabilityCache;
use crate::config::{ChannelConfig, ChannelCountMode, MAX_CHANNELS};
use crate::error::{AudioError, Result};
use crate::native::{
    create_native_constant_source, ConstantSourceVariant, ContextId, Endpoint, NativeAudioNode, NativeAudioParam,
    NativeNode, NativeOfflineContext, NativeParam, NativeScheduledSource, ScriptProcessorCallback,
};
use crate::worklet::{AudioWorkletNodeOptions, AudioWorkletProcessor, ProcessorDefinition};

pub struct AudioWorkletFaker {
    context: ContextId,
    channel: Mutex<ChannelConfig>,
    inputs: Vec<NativeNode>,
    outputs: Vec<NativeNode>,
    params: Vec<(String, ConstantSourceVariant)>,
    // keeps the inner chain reachable for the lifetime of the node
    _processor: NativeNode,
}

/// Reshapes the flat script processor channels for the processor and back.
struct Runner {
    processor: Box<dyn AudioWorkletProcessor>,
    active: bool,
    channels_per_input: usize,
    param_names: Vec<String>,
    inputs: Vec<Vec<Vec<f32>>>,
    outputs: Vec<Vec<Vec<f32>>>,
    parameters: HashMap<String, Vec<f32>>,
}

impl Runner {
    fn run(&mut self, inputs: &[Vec<f32>], outputs: &mut [Vec<f32>]) {
        if !self.active {
            return;
        }
        let (audio, params) = inputs.split_at(self.inputs.len() * self.channels_per_input);
        for (dst, src) in self.inputs.iter_mut().flatten().zip(audio) {
            dst.clear();
            dst.extend_from_slice(src);
        }
        for (name, src) in self.param_names.iter().zip(params) {
            let values = self.parameters.entry_ref(name.as_str()).or_default();
            values.clear();
            values.extend_from_slice(src);
        }
        let frames = inputs.first().or(outputs.first()).map_or(0, Vec::len);
        for channel in self.outputs.iter_mut().flatten() {
            channel.clear();
            channel.resize(frames, 0.0);
        }

        self.active = self
            .processor
            .process(&self.inputs, &mut self.outputs, &self.parameters);
        if !self.active {
            debug!("faked worklet processor finished");
        }

        for (dst, src) in outputs.iter_mut().zip(self.outputs.iter().flatten()) {
            let frames = dst.len().min(src.len());
            dst[..frames].copy_from_slice(&src[..frames]);
        }
    }
}

impl AudioWorkletFaker {
    pub fn new(
        native: &dyn NativeOfflineContext,
        cache: &CapabilityCache,
        definition: &ProcessorDefinition,
        options: &AudioWorkletNodeOptions,
    ) -> Result<Self> {
        let options = options.clone().resolve()?;
        let channels_per_input = options.channel.count;
        let input_channels = options.number_of_inputs * channels_per_input + definition.parameter_descriptors.len();
        let output_channels: usize = options.output_channel_count.iter().sum();
        if input_channels > MAX_CHANNELS || output_channels > MAX_CHANNELS {
            return Err(AudioError::not_supported(format!(
                "a faked worklet node carries at most {} channels per direction",
                MAX_CHANNELS
            )));
        }
        if output_channels == 0 {
            return Err(AudioError::not_supported("a faked worklet node needs at least one output"));
        }

        let mut runner = Runner {
            processor: definition.instantiate(&options),
            active: true,
            channels_per_input,
            param_names: definition
                .parameter_descriptors
                .iter()
                .map(|descriptor| descriptor.name.clone())
                .collect(),
            inputs: vec![vec![Vec::new(); channels_per_input]; options.number_of_inputs],
            outputs: options
                .output_channel_count
                .iter()
                .map(|&channels| vec![Vec::new(); channels])
                .collect(),
            parameters: HashMap::new(),
        };
        let callback: ScriptProcessorCallback =
            Box::new(move |inputs: &[Vec<f32>], outputs: &mut [Vec<f32>], _: f64| runner.run(inputs, outputs));
        let processor = native.create_script_processor(
            native.render_quantum_size(),
            input_channels,
            output_channels,
            callback,
        )?;

        let merger = if input_channels > 0 {
            Some(native.create_channel_merger(input_channels)?)
        } else {
            None
        };
        if let Some(merger) = &merger {
            merger.connect(0, processor.as_ref(), 0)?;
        }

        // explicit count keeps every input at a fixed block of merger slots
        let input_config = options.channel.with_mode(ChannelCountMode::Explicit);
        let mut inputs = Vec::with_capacity(options.number_of_inputs);
        for input in 0..options.number_of_inputs {
            let gain = native.create_gain(input_config)?;
            let splitter = native.create_channel_splitter(channels_per_input)?;
            gain.connect(0, splitter.as_ref(), 0)?;
            if let Some(merger) = &merger {
                for channel in 0..channels_per_input {
                    splitter.connect(channel, merger.as_ref(), input * channels_per_input + channel)?;
                }
            }
            inputs.push(gain);
        }

        let first_param = options.number_of_inputs * channels_per_input;
        let mut params = Vec::with_capacity(definition.parameter_descriptors.len());
        for (i, descriptor) in definition.parameter_descriptors.iter().enumerate() {
            let source = create_native_constant_source(native, cache, ChannelConfig::explicit(1))?;
            let offset = source
                .param("offset")
                .ok_or_else(|| AudioError::invalid_state("constant source without offset param"))?;
            offset.set_value(options.initial_value(descriptor))?;
            if let Some(merger) = &merger {
                source.connect(0, merger.as_ref(), first_param + i)?;
            }
            source.start(0.0)?;
            params.push((descriptor.name.clone(), source));
        }

        let splitter = native.create_channel_splitter(output_channels)?;
        processor.connect(0, splitter.as_ref(), 0)?;
        let mut outputs = Vec::with_capacity(options.number_of_outputs);
        let mut next = 0;
        for &channels in &options.output_channel_count {
            let output = native.create_channel_merger(channels)?;
            for channel in 0..channels {
                splitter.connect(next + channel, output.as_ref(), channel)?;
            }
            next += channels;
            outputs.push(output);
        }

        debug!(
            inputs = options.number_of_inputs,
            outputs = options.number_of_outputs,
            params = params.len(),
            "faked worklet node"
        );
        Ok(Self {
            context: native.id(),
            channel: Mutex::new(options.channel),
            inputs,
            outputs,
            params,
            _processor: processor,
        })
    }

    fn output_node(&self, output: usize) -> Result<&NativeNode> {
        self.outputs.get(output).ok_or_else(|| {
            AudioError::index_size(format!(
                "output {} out of range ({} outputs)",
                output,
                self.outputs.len()
            ))
        })
    }
}

impl NativeAudioNode for AudioWorkletFaker {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn number_of_inputs(&self) -> usize {
        self.inputs.len()
    }

    fn number_of_outputs(&self) -> usize {
        self.outputs.len()
    }

    fn channel_config(&self) -> ChannelConfig {
        *self.channel.lock()
    }

    /// The channel count is fixed at construction; mode and interpretation
    /// may change.
    fn set_channel_config(&self, config: ChannelConfig) -> Result<()> {
        config.validate()?;
        let mut channel = self.channel.lock();
        if config.count != channel.count {
            return Err(AudioError::not_supported(
                "the channel count of a faked worklet node cannot change",
            ));
        }
        for gain in &self.inputs {
            gain.set_channel_config(config.with_mode(ChannelCountMode::Explicit))?;
        }
        *channel = config;
        Ok(())
    }

    fn input(&self, input: usize) -> Result<Endpoint> {
        let gain = self.inputs.get(input).ok_or_else(|| {
            AudioError::index_size(format!("input {} out of range ({} inputs)", input, self.inputs.len()))
        })?;
        gain.input(0)
    }

    fn output(&self, output: usize) -> Result<Endpoint> {
        self.output_node(output)?.output(0)
    }

    fn param(&self, name: &str) -> Option<NativeParam> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .and_then(|(_, source)| source.param("offset"))
    }

    fn connect(&self, output: usize, destination: &dyn NativeAudioNode, input: usize) -> Result<()> {
        self.output_node(output)?.connect(0, destination, input)
    }

    fn connect_param(&self, output: usize, param: &dyn NativeAudioParam) -> Result<()> {
        self.output_node(output)?.connect_param(0, param)
    }

    fn disconnect(&self, output: Option<usize>) -> Result<()> {
        match output {
            Some(output) => self.output_node(output)?.disconnect(None),
            None => self.outputs.iter().try_for_each(|node| node.disconnect(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostProfile, SoftwareContext};
    use crate::worklet::ParamDescriptor;
    use crate::OfflineContextOptions;

    /// Writes `scale` to every frame of every output channel.
    struct Fill;

    impl AudioWorkletProcessor for Fill {
        fn process(
            &mut self,
            _inputs: &[Vec<Vec<f32>>],
            outputs: &mut [Vec<Vec<f32>>],
            parameters: &HashMap<String, Vec<f32>>,
        ) -> bool {
            let scale = &parameters["scale"];
            for channel in outputs.iter_mut().flatten() {
                channel.copy_from_slice(scale);
            }
            true
        }
    }

    fn host() -> SoftwareContext {
        SoftwareContext::with_profile(OfflineContextOptions::new(1, 128, 44_100.0), HostProfile::minimal()).unwrap()
    }

    #[tokio::test]
    async fn parameters_reach_the_processor() {
        let host = host();
        let definition = ProcessorDefinition::new(|_| Box::new(Fill)).with_param(ParamDescriptor::new("scale", 0.5));
        let mut options = AudioWorkletNodeOptions::default();
        options.parameter_data.insert("scale".into(), 0.25);
        let node = AudioWorkletFaker::new(&host, &CapabilityCache::new(), &definition, &options).unwrap();
        assert_eq!(node.param("scale").unwrap().value(), 0.25);
        node.connect(0, host.destination().as_ref(), 0).unwrap();

        let buffer = host.start_rendering().await.unwrap();
        let mut samples = Vec::new();
        buffer.with_channel_data(0, &mut |data| samples.extend_from_slice(data)).unwrap();
        assert!(samples.iter().all(|&s| s == 0.25), "{:?}", &samples[..4]);
    }

    #[test]
    fn outputs_are_separate_nodes() {
        let host = host();
        let definition = ProcessorDefinition::new(|_| Box::new(Fill));
        let options = AudioWorkletNodeOptions {
            number_of_outputs: 2,
            ..Default::default()
        };
        let node = AudioWorkletFaker::new(&host, &CapabilityCache::new(), &definition, &options).unwrap();
        assert_eq!(node.number_of_outputs(), 2);
        assert_ne!(node.output(0).unwrap(), node.output(1).unwrap());
        assert!(matches!(node.output(2), Err(AudioError::IndexSize(_))));
    }

    #[test]
    fn outputless_nodes_cannot_be_faked() {
        let options = AudioWorkletNodeOptions {
            number_of_outputs: 0,
            ..Default::default()
        };
        let definition = ProcessorDefinition::new(|_| Box::new(Fill));
        let result = AudioWorkletFaker::new(&host(), &CapabilityCache::new(), &definition, &options);
        assert!(matches!(result, Err(AudioError::NotSupported(_))));
    }
}
