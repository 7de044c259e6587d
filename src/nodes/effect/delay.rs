use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};
use crate::nodes::ParamInit;

/// Delays its input by the automatable `delayTime` param, in seconds.
///
/// A delay is the only node a cycle may pass through.
#[derive(Clone, Debug, PartialEq)]
pub struct Delay {
    /// Upper bound of `delay_time`, exclusive range `(0, 180)`
    pub max_delay_time: f64,
    pub delay_time: f64,
    pub channel: ChannelConfig,
}

impl Default for Delay {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Delay {
    pub fn new(max_delay_time: f64) -> Self {
        Self {
            max_delay_time,
            delay_time: 0.0,
            channel: ChannelConfig::default(),
        }
    }

    pub fn with_delay_time(mut self, delay_time: f64) -> Self {
        self.delay_time = delay_time;
        self
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub(crate) fn params(&self) -> Vec<ParamInit> {
        vec![ParamInit::new("delayTime", 0.0, self.delay_time as f32).with_range(0.0, self.max_delay_time as f32)]
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.max_delay_time > 0.0 && self.max_delay_time < 180.0) {
            return Err(AudioError::not_supported(format!(
                "maximum delay time {} is outside (0, 180)",
                self.max_delay_time
            )));
        }
        if !(0.0..=self.max_delay_time).contains(&self.delay_time) {
            return Err(AudioError::not_supported(format!(
                "delay time {} is outside 0..={}",
                self.delay_time, self.max_delay_time
            )));
        }
        Ok(())
    }
}
