use dasp_graph::Buffer;

use super::{Schedule, SourceMessage};
use crate::error::Result;
use crate::host::processor::{reset_output, Channels, HostProcessor, ProcessContext};
use crate::native::BufferSourceOptions;

/// Plays back a snapshot of a buffer, optionally looping a region of it.
///
/// Parameters are `playbackRate` and `detune`.
pub(crate) struct BufferSource {
    data: Vec<Vec<f32>>,
    buffer_rate: f64,
    looping: bool,
    loop_start: f64,
    loop_end: f64,
    position: f64,
    schedule: Schedule,
}

impl BufferSource {
    pub fn new(options: &BufferSourceOptions) -> Result<Self> {
        let mut data = Vec::new();
        let mut buffer_rate = 0.0;
        if let Some(buffer) = &options.buffer {
            buffer_rate = buffer.sample_rate() as f64;
            for ch in 0..buffer.number_of_channels() {
                let mut channel = Vec::new();
                buffer.with_channel_data(ch, &mut |samples| channel.extend_from_slice(samples))?;
                data.push(channel);
            }
        }
        Ok(Self {
            data,
            buffer_rate,
            looping: options.looping,
            loop_start: options.loop_start,
            loop_end: options.loop_end,
            position: 0.0,
            schedule: Schedule::default(),
        })
    }

    fn frames(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    /// Loop region in buffer frames, falling back to the whole buffer.
    fn loop_bounds(&self) -> (f64, f64) {
        let len = self.frames() as f64;
        let start = (self.loop_start * self.buffer_rate).clamp(0.0, len);
        let end = (self.loop_end * self.buffer_rate).clamp(0.0, len);
        if self.loop_end > 0.0 && start < end {
            (start, end)
        } else {
            (0.0, len)
        }
    }

    #[inline]
    fn interpolate(&self, channel: &[f32], position: f64, loop_bounds: (f64, f64)) -> f32 {
        let index = position.floor() as usize;
        let frac = (position - position.floor()) as f32;
        let current = channel.get(index).copied().unwrap_or(0.0);
        if frac == 0.0 {
            return current;
        }
        let mut next_index = index + 1;
        if self.looping && next_index as f64 >= loop_bounds.1 {
            next_index = loop_bounds.0.floor() as usize;
        }
        let next = channel.get(next_index).copied().unwrap_or(0.0);
        current + (next - current) * frac
    }
}

impl HostProcessor for BufferSource {
    type Message = SourceMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = SourceMessage>,
        _inputs: &[Channels],
        params: &[Buffer],
        outputs: &mut [Channels],
    ) {
        for msg in messages {
            self.schedule.handle(msg);
        }
        let output = &mut outputs[0];
        reset_output(output, self.data.len().max(1));

        let len = self.frames() as f64;
        let bounds = self.loop_bounds();
        let rate_ratio = self.buffer_rate / ctx.sample_rate as f64;
        for i in 0..ctx.buffer_size {
            if !self.schedule.is_playing(ctx.time(i)) {
                continue;
            }
            if self.data.is_empty() {
                continue;
            }
            if self.looping {
                let (start, end) = bounds;
                if self.position >= end && end > start {
                    self.position = start + (self.position - end) % (end - start);
                }
            } else if self.position >= len {
                self.schedule.finish();
                break;
            }
            for (out, channel) in output.iter_mut().zip(&self.data) {
                out[i] = self.interpolate(channel, self.position, bounds);
            }
            let rate = params[0][i] as f64 * (params[1][i] as f64 / 1200.0).exp2();
            self.position += rate.max(0.0) * rate_ratio;
        }
        if !self.schedule.has_ended() && !self.looping && !self.data.is_empty() && self.position >= len {
            self.schedule.finish();
        }
        self.schedule.finish_if_stopped(ctx.end_time());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::buffer::HostBuffer;
    use crate::host::CopyChannelSupport;
    use std::sync::Arc;

    fn ctx() -> ProcessContext {
        ProcessContext {
            sample_rate: 100.0,
            buffer_size: Buffer::LEN,
            frame: 0,
        }
    }

    fn ones() -> [Buffer; 2] {
        let mut rate = Buffer::SILENT;
        rate.iter_mut().for_each(|r| *r = 1.0);
        [rate, Buffer::SILENT]
    }

    #[test]
    fn looped_two_frame_buffer_is_constant() {
        let buffer = HostBuffer::from_channels(vec![vec![1.0, 1.0]], 100.0, CopyChannelSupport::Full);
        let options = BufferSourceOptions {
            buffer: Some(Arc::new(buffer)),
            looping: true,
            ..Default::default()
        };
        let mut source = BufferSource::new(&options).unwrap();
        let mut outputs = vec![Vec::new()];
        source.process(&ctx(), [SourceMessage::Start(0.0)].into_iter(), &[], &ones(), &mut outputs);
        assert!(outputs[0][0].iter().all(|&s| s == 1.0));
    }

    #[test]
    fn one_shot_playback_ends_after_the_buffer() {
        let buffer = HostBuffer::from_channels(vec![vec![0.5; 10]], 100.0, CopyChannelSupport::Full);
        let options = BufferSourceOptions {
            buffer: Some(Arc::new(buffer)),
            ..Default::default()
        };
        let mut source = BufferSource::new(&options).unwrap();
        let mut outputs = vec![Vec::new()];
        source.process(&ctx(), [SourceMessage::Start(0.0)].into_iter(), &[], &ones(), &mut outputs);
        assert_eq!(outputs[0][0][9], 0.5);
        assert_eq!(outputs[0][0][10], 0.0);
        assert!(source.schedule.has_ended());
    }
}
