//! User-defined processors run by audio worklet nodes.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};

/// Per-node processing code of an audio worklet.
///
/// Called once per render quantum. `inputs[i][c]` is channel `c` of input `i`,
/// `outputs[o][c]` channel `c` of output `o` (zeroed before the call), and
/// `parameters` holds one value per frame for every declared parameter.
///
/// Returning `false` ends processing: the node outputs silence from then on.
pub trait AudioWorkletProcessor: Send {
    fn process(
        &mut self,
        inputs: &[Vec<Vec<f32>>],
        outputs: &mut [Vec<Vec<f32>>],
        parameters: &HashMap<String, Vec<f32>>,
    ) -> bool;
}

/// Declares an automatable parameter of a worklet processor.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamDescriptor {
    pub name: String,
    pub default_value: f32,
    pub min_value: f32,
    pub max_value: f32,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, default_value: f32) -> Self {
        Self {
            name: name.into(),
            default_value,
            min_value: f32::MIN,
            max_value: f32::MAX,
        }
    }

    pub fn with_range(mut self, min_value: f32, max_value: f32) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }
}

pub type ProcessorFactory =
    Arc<dyn Fn(&AudioWorkletNodeOptions) -> Box<dyn AudioWorkletProcessor> + Send + Sync>;

/// A registered processor: its parameters and how to instantiate it.
#[derive(Clone)]
pub struct ProcessorDefinition {
    pub parameter_descriptors: Vec<ParamDescriptor>,
    pub factory: ProcessorFactory,
}

impl ProcessorDefinition {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&AudioWorkletNodeOptions) -> Box<dyn AudioWorkletProcessor> + Send + Sync + 'static,
    {
        Self {
            parameter_descriptors: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    pub fn with_param(mut self, descriptor: ParamDescriptor) -> Self {
        self.parameter_descriptors.push(descriptor);
        self
    }

    pub fn instantiate(&self, options: &AudioWorkletNodeOptions) -> Box<dyn AudioWorkletProcessor> {
        (self.factory)(options)
    }
}

impl fmt::Debug for ProcessorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorDefinition")
            .field("parameter_descriptors", &self.parameter_descriptors)
            .finish_non_exhaustive()
    }
}

/// Fully-resolved options of an audio worklet node.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioWorkletNodeOptions {
    pub number_of_inputs: usize,
    pub number_of_outputs: usize,
    /// Channels per output; empty means "derive from the other options"
    pub output_channel_count: Vec<usize>,
    /// Initial parameter values overriding the descriptors' defaults
    pub parameter_data: HashMap<String, f32>,
    pub channel: ChannelConfig,
}

impl Default for AudioWorkletNodeOptions {
    fn default() -> Self {
        Self {
            number_of_inputs: 1,
            number_of_outputs: 1,
            output_channel_count: Vec::new(),
            parameter_data: HashMap::new(),
            channel: ChannelConfig::default(),
        }
    }
}

impl AudioWorkletNodeOptions {
    /// Fill in `output_channel_count` and check the options for consistency.
    ///
    /// A node with exactly one input and one output defaults to the channel
    /// count of its input configuration; every other output defaults to mono.
    pub fn resolve(mut self) -> Result<Self> {
        self.channel.validate()?;
        if self.number_of_inputs == 0 && self.number_of_outputs == 0 {
            return Err(AudioError::not_supported(
                "a worklet node needs at least one input or output",
            ));
        }
        if self.output_channel_count.is_empty() {
            self.output_channel_count = if self.number_of_inputs == 1 && self.number_of_outputs == 1 {
                vec![self.channel.count]
            } else {
                vec![1; self.number_of_outputs]
            };
        }
        if self.output_channel_count.len() != self.number_of_outputs {
            return Err(AudioError::index_size(format!(
                "{} output channel counts given for {} outputs",
                self.output_channel_count.len(),
                self.number_of_outputs
            )));
        }
        if let Some(bad) = self
            .output_channel_count
            .iter()
            .find(|&&c| c == 0 || c > crate::config::MAX_CHANNELS)
        {
            return Err(AudioError::not_supported(format!("invalid output channel count {}", bad)));
        }
        Ok(self)
    }

    /// The initial value of a declared parameter.
    pub fn initial_value(&self, descriptor: &ParamDescriptor) -> f32 {
        self.parameter_data
            .get(&descriptor.name)
            .copied()
            .unwrap_or(descriptor.default_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_io_nodes_follow_input_channel_count() {
        let options = AudioWorkletNodeOptions {
            channel: ChannelConfig::explicit(3),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(options.output_channel_count, vec![3]);
    }

    #[test]
    fn mismatched_output_channel_counts_are_rejected() {
        let options = AudioWorkletNodeOptions {
            number_of_outputs: 2,
            output_channel_count: vec![1],
            ..Default::default()
        };
        assert!(matches!(options.resolve(), Err(AudioError::IndexSize(_))));
    }

    #[test]
    fn parameter_data_overrides_defaults() {
        let mut options = AudioWorkletNodeOptions::default();
        options.parameter_data.insert("depth".into(), 0.25);
        let depth = ParamDescriptor::new("depth", 1.0);
        let rate = ParamDescriptor::new("rate", 4.0);
        assert_eq!(options.initial_value(&depth), 0.25);
        assert_eq!(options.initial_value(&rate), 4.0);
    }
}
