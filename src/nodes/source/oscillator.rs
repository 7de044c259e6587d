use crate::config::ChannelConfig;
use crate::native::OscillatorType;
use crate::nodes::ParamInit;

/// A periodic waveform with automatable `frequency` and `detune`.
#[derive(Clone, Debug, PartialEq)]
pub struct Oscillator {
    pub oscillator_type: OscillatorType,
    pub frequency: f32,
    pub detune: f32,
    pub channel: ChannelConfig,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(OscillatorType::Sine, 440.0)
    }
}

impl Oscillator {
    pub fn new(oscillator_type: OscillatorType, frequency: f32) -> Self {
        Self {
            oscillator_type,
            frequency,
            detune: 0.0,
            channel: ChannelConfig::default(),
        }
    }

    /// A sine wave at `frequency` Hz.
    pub fn sine(frequency: f32) -> Self {
        Self::new(OscillatorType::Sine, frequency)
    }

    pub fn with_detune(mut self, detune: f32) -> Self {
        self.detune = detune;
        self
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub(crate) fn params(&self, nyquist: f32) -> Vec<ParamInit> {
        vec![
            ParamInit::new("frequency", 440.0, self.frequency).with_range(-nyquist, nyquist),
            ParamInit::new("detune", 0.0, self.detune),
        ]
    }
}
