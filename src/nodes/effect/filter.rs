use crate::config::ChannelConfig;
use crate::error::Result;
use crate::native::{check_iir_coefficients, BiquadFilterType};
use crate::nodes::ParamInit;

/// A second-order filter with automatable `frequency`, `detune`, `Q` and `gain`.
#[derive(Clone, Debug, PartialEq)]
pub struct BiquadFilter {
    pub filter_type: BiquadFilterType,
    pub frequency: f32,
    pub detune: f32,
    pub q: f32,
    pub gain: f32,
    pub channel: ChannelConfig,
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::new(BiquadFilterType::Lowpass)
    }
}

impl BiquadFilter {
    pub fn new(filter_type: BiquadFilterType) -> Self {
        Self {
            filter_type,
            frequency: 350.0,
            detune: 0.0,
            q: 1.0,
            gain: 0.0,
            channel: ChannelConfig::default(),
        }
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_detune(mut self, detune: f32) -> Self {
        self.detune = detune;
        self
    }

    pub fn with_q(mut self, q: f32) -> Self {
        self.q = q;
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub(crate) fn params(&self, nyquist: f32) -> Vec<ParamInit> {
        vec![
            ParamInit::new("frequency", 350.0, self.frequency).with_range(0.0, nyquist),
            ParamInit::new("detune", 0.0, self.detune),
            ParamInit::new("Q", 1.0, self.q),
            ParamInit::new("gain", 0.0, self.gain),
        ]
    }
}

/// A general IIR filter given by its transfer function coefficients.
///
/// Rendered natively where the host has an IIR filter, in a script processor
/// otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct IirFilter {
    pub feedforward: Vec<f64>,
    /// May be empty, which stands for `[1.0]`
    pub feedback: Vec<f64>,
    pub channel: ChannelConfig,
}

impl IirFilter {
    pub fn new(feedforward: Vec<f64>, feedback: Vec<f64>) -> Self {
        Self {
            feedforward,
            feedback,
            channel: ChannelConfig::default(),
        }
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_iir_coefficients(&self.feedforward, &self.feedback)
    }
}
