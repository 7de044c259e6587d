//! Configuration types shared by abstract nodes and native hosts.

use crate::error::{AudioError, Result};

/// Upper bound for channel counts of contexts, nodes and buffers.
pub const MAX_CHANNELS: usize = 32;

/// How the number of channels of a node input is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelCountMode {
    /// The maximum channel count of all connections
    Max,
    /// Like `Max`, clamped to the node's `count`
    ClampedMax,
    /// Always the node's `count`
    Explicit,
}

/// How channels are up- or down-mixed when counts differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelInterpretation {
    /// Mono/stereo speaker rules, discrete for everything else
    Speakers,
    /// Copy matching channels, zero-fill or drop the rest
    Discrete,
}

/// Channel count, count mode and interpretation of a node.
///
/// Validated once when a node is added; rendering never re-validates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelConfig {
    pub count: usize,
    pub mode: ChannelCountMode,
    pub interpretation: ChannelInterpretation,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            count: 2,
            mode: ChannelCountMode::Max,
            interpretation: ChannelInterpretation::Speakers,
        }
    }
}

impl ChannelConfig {
    /// An explicit configuration with `count` channels.
    pub fn explicit(count: usize) -> Self {
        Self {
            count,
            mode: ChannelCountMode::Explicit,
            interpretation: ChannelInterpretation::Speakers,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_mode(mut self, mode: ChannelCountMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_interpretation(mut self, interpretation: ChannelInterpretation) -> Self {
        self.interpretation = interpretation;
        self
    }

    /// Checks the channel count against the supported range.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 || self.count > MAX_CHANNELS {
            return Err(AudioError::not_supported(format!(
                "channel count {} is outside 1..={}",
                self.count, MAX_CHANNELS
            )));
        }
        Ok(())
    }

    /// Number of channels an input computes from its connections' channel counts.
    ///
    /// An input without connections carries a single silent channel.
    pub fn computed_channels(&self, connected: impl IntoIterator<Item = usize>) -> usize {
        let max = connected.into_iter().max();
        match (self.mode, max) {
            (ChannelCountMode::Explicit, _) => self.count,
            (_, None) => 1,
            (ChannelCountMode::Max, Some(max)) => max.max(1),
            (ChannelCountMode::ClampedMax, Some(max)) => max.clamp(1, self.count),
        }
    }
}

/// Options of an offline rendering context.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OfflineContextOptions {
    /// Channels of the rendered buffer
    pub number_of_channels: usize,
    /// Length of the rendered buffer in sample frames
    pub length: usize,
    /// Sample rate in Hz
    pub sample_rate: f32,
}

impl Default for OfflineContextOptions {
    fn default() -> Self {
        Self {
            number_of_channels: 1,
            length: 44_100,
            sample_rate: 44_100.0,
        }
    }
}

impl OfflineContextOptions {
    pub fn new(number_of_channels: usize, length: usize, sample_rate: f32) -> Self {
        Self {
            number_of_channels,
            length,
            sample_rate,
        }
    }

    /// Set the number of channels (builder pattern).
    pub fn with_channels(mut self, number_of_channels: usize) -> Self {
        self.number_of_channels = number_of_channels;
        self
    }

    /// Set the length in frames (builder pattern).
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Set the length from a duration in seconds at the current sample rate.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.length = (seconds * self.sample_rate as f64).round() as usize;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.number_of_channels == 0 || self.number_of_channels > MAX_CHANNELS {
            return Err(AudioError::not_supported(format!(
                "number of channels {} is outside 1..={}",
                self.number_of_channels, MAX_CHANNELS
            )));
        }
        if self.length == 0 {
            return Err(AudioError::not_supported("length must be at least one frame"));
        }
        if !(3_000.0..=768_000.0).contains(&self.sample_rate) {
            return Err(AudioError::not_supported(format!(
                "sample rate {} is outside 3000..=768000",
                self.sample_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computed_channels_follow_count_mode() {
        let max = ChannelConfig::default();
        assert_eq!(max.computed_channels([1, 4]), 4);
        assert_eq!(max.computed_channels([]), 1);

        let clamped = max.with_mode(ChannelCountMode::ClampedMax);
        assert_eq!(clamped.computed_channels([1, 4]), 2);

        let explicit = ChannelConfig::explicit(3);
        assert_eq!(explicit.computed_channels([1]), 3);
        assert_eq!(explicit.computed_channels([]), 3);
    }

    #[test]
    fn context_options_are_validated() {
        assert!(OfflineContextOptions::default().validate().is_ok());
        assert!(OfflineContextOptions::default().with_channels(0).validate().is_err());
        assert!(OfflineContextOptions::default().with_length(0).validate().is_err());
        assert!(OfflineContextOptions::default().with_sample_rate(100.0).validate().is_err());
    }

    #[test]
    fn duration_uses_sample_rate() {
        let options = OfflineContextOptions::default()
            .with_sample_rate(48_000.0)
            .with_duration(0.5);
        assert_eq!(options.length, 24_000);
    }
}
