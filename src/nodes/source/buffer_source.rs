use crate::buffer::AudioBuffer;
use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};
use crate::nodes::ParamInit;

/// Plays back an [`AudioBuffer`], optionally looping a region of it.
#[derive(Clone, Debug)]
pub struct AudioBufferSource {
    pub buffer: Option<AudioBuffer>,
    pub looping: bool,
    /// Loop region in seconds; `loop_end == 0.0` loops the whole buffer
    pub loop_start: f64,
    pub loop_end: f64,
    pub playback_rate: f32,
    pub detune: f32,
    pub channel: ChannelConfig,
}

impl Default for AudioBufferSource {
    fn default() -> Self {
        Self {
            buffer: None,
            looping: false,
            loop_start: 0.0,
            loop_end: 0.0,
            playback_rate: 1.0,
            detune: 0.0,
            channel: ChannelConfig::default(),
        }
    }
}

impl AudioBufferSource {
    pub fn new(buffer: AudioBuffer) -> Self {
        Self {
            buffer: Some(buffer),
            ..Default::default()
        }
    }

    /// Loop the whole buffer.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    pub fn with_loop_points(mut self, loop_start: f64, loop_end: f64) -> Self {
        self.looping = true;
        self.loop_start = loop_start;
        self.loop_end = loop_end;
        self
    }

    pub fn with_playback_rate(mut self, playback_rate: f32) -> Self {
        self.playback_rate = playback_rate;
        self
    }

    pub fn with_detune(mut self, detune: f32) -> Self {
        self.detune = detune;
        self
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    pub(crate) fn params(&self) -> Vec<ParamInit> {
        vec![
            ParamInit::new("playbackRate", 1.0, self.playback_rate),
            ParamInit::new("detune", 0.0, self.detune),
        ]
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.loop_start < 0.0 || self.loop_end < 0.0 || !self.loop_start.is_finite() || !self.loop_end.is_finite() {
            return Err(AudioError::not_supported("loop points must be finite and non-negative"));
        }
        Ok(())
    }
}
