use crate::config::ChannelConfig;
use crate::nodes::ParamInit;

/// Scales its input by the automatable `gain` param.
#[derive(Clone, Debug, PartialEq)]
pub struct Gain {
    pub gain: f32,
    pub channel: ChannelConfig,
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Gain {
    pub fn new(gain: f32) -> Self {
        Self {
            gain,
            channel: ChannelConfig::default(),
        }
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub(crate) fn params(&self) -> Vec<ParamInit> {
        vec![ParamInit::new("gain", 1.0, self.gain)]
    }
}
