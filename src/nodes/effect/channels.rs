use crate::config::{ChannelConfig, ChannelInterpretation, MAX_CHANNELS};
use crate::error::{AudioError, Result};

fn check_count(what: &str, count: usize) -> Result<()> {
    if count == 0 || count > MAX_CHANNELS {
        return Err(AudioError::index_size(format!(
            "a channel {} needs 1..={} ports, not {}",
            what, MAX_CHANNELS, count
        )));
    }
    Ok(())
}

/// Combines the first channel of each input into one output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMerger {
    pub number_of_inputs: usize,
}

impl Default for ChannelMerger {
    fn default() -> Self {
        Self::new(6)
    }
}

impl ChannelMerger {
    pub fn new(number_of_inputs: usize) -> Self {
        Self { number_of_inputs }
    }

    pub(crate) fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::explicit(1)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_count("merger", self.number_of_inputs)
    }
}

/// Routes each channel of its input to its own mono output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSplitter {
    pub number_of_outputs: usize,
}

impl Default for ChannelSplitter {
    fn default() -> Self {
        Self::new(6)
    }
}

impl ChannelSplitter {
    pub fn new(number_of_outputs: usize) -> Self {
        Self { number_of_outputs }
    }

    pub(crate) fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::explicit(self.number_of_outputs.max(1)).with_interpretation(ChannelInterpretation::Discrete)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_count("splitter", self.number_of_outputs)
    }
}
