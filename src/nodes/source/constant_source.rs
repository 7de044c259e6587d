use crate::config::ChannelConfig;
use crate::nodes::ParamInit;

/// Outputs its automatable `offset` once started.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantSource {
    pub offset: f32,
    pub channel: ChannelConfig,
}

impl Default for ConstantSource {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ConstantSource {
    pub fn new(offset: f32) -> Self {
        Self {
            offset,
            channel: ChannelConfig::default(),
        }
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub(crate) fn params(&self) -> Vec<ParamInit> {
        vec![ParamInit::new("offset", 1.0, self.offset)]
    }
}
