//! Built-in node kinds and their options.
//!
//! Options are plain builder structs; [`OfflineAudioContext::add`] validates
//! them and turns them into graph nodes.
//!
//! ## Sources ([`source`])
//!
//! Scheduled through [`AudioNode::start`]/[`AudioNode::stop`], no inputs:
//! - [`Oscillator`] - periodic waveforms
//! - [`AudioBufferSource`] - plays back an [`AudioBuffer`](crate::AudioBuffer)
//! - [`ConstantSource`] - a constant, automatable `offset`
//!
//! ## Effects ([`effect`])
//!
//! - [`Gain`], [`Delay`], [`BiquadFilter`], [`IirFilter`]
//! - [`ChannelMerger`], [`ChannelSplitter`] - channel routing
//! - [`AudioWorklet`] - runs a registered [`AudioWorkletProcessor`](crate::AudioWorkletProcessor)
//!
//! [`OfflineAudioContext::add`]: crate::OfflineAudioContext::add
//! [`AudioNode::start`]: crate::AudioNode::start
//! [`AudioNode::stop`]: crate::AudioNode::stop

pub mod effect;
pub mod source;

pub use effect::{AudioWorklet, BiquadFilter, ChannelMerger, ChannelSplitter, Delay, Gain, IirFilter};
pub use source::{AudioBufferSource, ConstantSource, Oscillator};

use crate::config::ChannelConfig;
use crate::error::Result;
use crate::worklet::ParamDescriptor;

/// A parameter a node kind owns, with its initial value.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ParamInit {
    pub descriptor: ParamDescriptor,
    pub value: f32,
}

impl ParamInit {
    pub fn new(name: &str, default_value: f32, value: f32) -> Self {
        Self {
            descriptor: ParamDescriptor::new(name, default_value),
            value,
        }
    }

    pub fn with_range(mut self, min_value: f32, max_value: f32) -> Self {
        self.descriptor = self.descriptor.with_range(min_value, max_value);
        self
    }
}

/// A node kind with its static options.
#[derive(Clone, Debug)]
pub enum NodeKind {
    Destination(ChannelConfig),
    Gain(Gain),
    BiquadFilter(BiquadFilter),
    Delay(Delay),
    IirFilter(IirFilter),
    ChannelMerger(ChannelMerger),
    ChannelSplitter(ChannelSplitter),
    AudioWorklet(AudioWorklet),
    Oscillator(Oscillator),
    AudioBufferSource(AudioBufferSource),
    ConstantSource(ConstantSource),
}

macro_rules! node_kind_from {
    ($($kind:ident),*) => {
        $(
            impl From<$kind> for NodeKind {
                fn from(options: $kind) -> Self {
                    NodeKind::$kind(options)
                }
            }
        )*
    };
}

node_kind_from!(
    Gain,
    BiquadFilter,
    Delay,
    IirFilter,
    ChannelMerger,
    ChannelSplitter,
    AudioWorklet,
    Oscillator,
    AudioBufferSource,
    ConstantSource
);

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Destination(_) => "destination",
            NodeKind::Gain(_) => "gain",
            NodeKind::BiquadFilter(_) => "biquad filter",
            NodeKind::Delay(_) => "delay",
            NodeKind::IirFilter(_) => "IIR filter",
            NodeKind::ChannelMerger(_) => "channel merger",
            NodeKind::ChannelSplitter(_) => "channel splitter",
            NodeKind::AudioWorklet(_) => "audio worklet",
            NodeKind::Oscillator(_) => "oscillator",
            NodeKind::AudioBufferSource(_) => "audio buffer source",
            NodeKind::ConstantSource(_) => "constant source",
        }
    }

    pub fn number_of_inputs(&self) -> usize {
        match self {
            NodeKind::ChannelMerger(merger) => merger.number_of_inputs,
            NodeKind::AudioWorklet(worklet) => worklet.options.number_of_inputs,
            NodeKind::Oscillator(_) | NodeKind::AudioBufferSource(_) | NodeKind::ConstantSource(_) => 0,
            _ => 1,
        }
    }

    pub fn number_of_outputs(&self) -> usize {
        match self {
            NodeKind::Destination(_) => 0,
            NodeKind::ChannelSplitter(splitter) => splitter.number_of_outputs,
            NodeKind::AudioWorklet(worklet) => worklet.options.number_of_outputs,
            _ => 1,
        }
    }

    /// Whether the node is played through `start`/`stop`.
    pub fn is_scheduled_source(&self) -> bool {
        matches!(
            self,
            NodeKind::Oscillator(_) | NodeKind::AudioBufferSource(_) | NodeKind::ConstantSource(_)
        )
    }

    pub fn channel_config(&self) -> ChannelConfig {
        match self {
            NodeKind::Destination(channel) => *channel,
            NodeKind::Gain(gain) => gain.channel,
            NodeKind::BiquadFilter(filter) => filter.channel,
            NodeKind::Delay(delay) => delay.channel,
            NodeKind::IirFilter(filter) => filter.channel,
            NodeKind::ChannelMerger(merger) => merger.channel_config(),
            NodeKind::ChannelSplitter(splitter) => splitter.channel_config(),
            NodeKind::AudioWorklet(worklet) => worklet.options.channel,
            NodeKind::Oscillator(oscillator) => oscillator.channel,
            NodeKind::AudioBufferSource(source) => source.channel,
            NodeKind::ConstantSource(source) => source.channel,
        }
    }

    pub(crate) fn params(&self, nyquist: f32) -> Vec<ParamInit> {
        match self {
            NodeKind::Destination(_)
            | NodeKind::IirFilter(_)
            | NodeKind::ChannelMerger(_)
            | NodeKind::ChannelSplitter(_) => Vec::new(),
            NodeKind::Gain(gain) => gain.params(),
            NodeKind::BiquadFilter(filter) => filter.params(nyquist),
            NodeKind::Delay(delay) => delay.params(),
            NodeKind::AudioWorklet(worklet) => worklet.params(),
            NodeKind::Oscillator(oscillator) => oscillator.params(nyquist),
            NodeKind::AudioBufferSource(source) => source.params(),
            NodeKind::ConstantSource(source) => source.params(),
        }
    }

    /// Check the options; channel configuration included.
    pub fn validate(&self) -> Result<()> {
        self.channel_config().validate()?;
        match self {
            NodeKind::Delay(delay) => delay.validate(),
            NodeKind::IirFilter(filter) => filter.validate(),
            NodeKind::ChannelMerger(merger) => merger.validate(),
            NodeKind::ChannelSplitter(splitter) => splitter.validate(),
            NodeKind::AudioWorklet(worklet) => worklet.validate(),
            NodeKind::AudioBufferSource(source) => source.validate(),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AudioError;

    #[test]
    fn io_counts_follow_the_kind() {
        let merger = NodeKind::from(ChannelMerger::new(3));
        assert_eq!((merger.number_of_inputs(), merger.number_of_outputs()), (3, 1));
        let splitter = NodeKind::from(ChannelSplitter::new(4));
        assert_eq!((splitter.number_of_inputs(), splitter.number_of_outputs()), (1, 4));
        let source = NodeKind::from(ConstantSource::new(0.5));
        assert_eq!((source.number_of_inputs(), source.number_of_outputs()), (0, 1));
        assert!(source.is_scheduled_source());
    }

    #[test]
    fn params_carry_initial_values() {
        let params = NodeKind::from(BiquadFilter::default().with_frequency(1000.0)).params(22_050.0);
        let names: Vec<_> = params.iter().map(|p| p.descriptor.name.as_str()).collect();
        assert_eq!(names, ["frequency", "detune", "Q", "gain"]);
        assert_eq!(params[0].value, 1000.0);
        assert_eq!(params[0].descriptor.default_value, 350.0);
        assert_eq!(params[0].descriptor.max_value, 22_050.0);
    }

    #[test]
    fn invalid_options_are_rejected() {
        assert!(matches!(
            NodeKind::from(ChannelMerger::new(0)).validate(),
            Err(AudioError::IndexSize(_))
        ));
        assert!(matches!(
            NodeKind::from(Delay::new(200.0)).validate(),
            Err(AudioError::NotSupported(_))
        ));
        assert!(matches!(
            NodeKind::from(IirFilter::new(vec![0.0], vec![1.0])).validate(),
            Err(AudioError::InvalidState(_))
        ));
        assert!(matches!(
            NodeKind::from(Gain::new(1.0).with_channel(ChannelConfig::explicit(33))).validate(),
            Err(AudioError::NotSupported(_))
        ));
    }
}
