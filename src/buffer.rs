//! Rendered (or user-created) sample buffers with a uniform copy API.
//!
//! Hosts differ in their `copy_from_channel`/`copy_to_channel` support: some
//! lack both methods, some reject an offset at or past the buffer length. An
//! [`AudioBuffer`] picks a [`CopyStrategy`] once, when it is created, and
//! behaves the same on every host afterwards.

use std::fmt;

use crate::error::{AudioError, Result};
use crate::native::{NativeAudioBuffer, NativeBuffer};

/// How an [`AudioBuffer`] implements its windowed channel copies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CopyStrategy {
    /// The host's own methods
    Native,
    /// The host's methods for offsets below the length, nothing otherwise
    Narrow,
    /// Copies through the per-channel data accessor
    Full,
}

/// A planar buffer of `f32` samples.
#[derive(Clone)]
pub struct AudioBuffer {
    native: NativeBuffer,
    copy: CopyStrategy,
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("number_of_channels", &self.number_of_channels())
            .field("length", &self.length())
            .field("sample_rate", &self.sample_rate())
            .field("copy", &self.copy)
            .finish()
    }
}

impl AudioBuffer {
    pub(crate) fn new(native: NativeBuffer, copy: CopyStrategy) -> Self {
        Self { native, copy }
    }

    pub fn number_of_channels(&self) -> usize {
        self.native.number_of_channels()
    }

    pub fn length(&self) -> usize {
        self.native.length()
    }

    pub fn sample_rate(&self) -> f32 {
        self.native.sample_rate()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.length() as f64 / self.sample_rate() as f64
    }

    pub fn copy_strategy(&self) -> CopyStrategy {
        self.copy
    }

    /// The host buffer behind this one.
    pub fn native(&self) -> &NativeBuffer {
        &self.native
    }

    /// Run `f` on the whole of `channel`.
    pub fn with_channel_data(&self, channel: usize, f: &mut dyn FnMut(&mut [f32])) -> Result<()> {
        self.check_channel(channel)?;
        self.native.with_channel_data(channel, f)
    }

    /// A copy of the samples of `channel`.
    pub fn get_channel_data(&self, channel: usize) -> Result<Vec<f32>> {
        let mut data = Vec::with_capacity(self.length());
        self.with_channel_data(channel, &mut |samples| data.extend_from_slice(samples))?;
        Ok(data)
    }

    /// Copy samples of `channel`, starting at frame `offset`, into `destination`.
    ///
    /// Copies `min(destination.len(), length - offset)` frames; an offset at
    /// or past the length copies nothing.
    pub fn copy_from_channel(&self, destination: &mut [f32], channel: usize, offset: usize) -> Result<()> {
        self.check_channel(channel)?;
        match self.copy {
            CopyStrategy::Native => self.native_copy()?.copy_from_channel(destination, channel, offset),
            CopyStrategy::Narrow if offset < self.length() => {
                self.native_copy()?.copy_from_channel(destination, channel, offset)
            }
            CopyStrategy::Narrow => Ok(()),
            CopyStrategy::Full => copy_from_channel_polyfill(&*self.native, destination, channel, offset),
        }
    }

    /// Copy `source` into `channel`, starting at frame `offset`.
    pub fn copy_to_channel(&self, source: &[f32], channel: usize, offset: usize) -> Result<()> {
        self.check_channel(channel)?;
        match self.copy {
            CopyStrategy::Native => self.native_copy()?.copy_to_channel(source, channel, offset),
            CopyStrategy::Narrow if offset < self.length() => {
                self.native_copy()?.copy_to_channel(source, channel, offset)
            }
            CopyStrategy::Narrow => Ok(()),
            CopyStrategy::Full => copy_to_channel_polyfill(&*self.native, source, channel, offset),
        }
    }

    fn check_channel(&self, channel: usize) -> Result<()> {
        let count = self.number_of_channels();
        if channel >= count {
            return Err(AudioError::index_size(format!(
                "channel {} out of range for a buffer with {} channels",
                channel, count
            )));
        }
        Ok(())
    }

    fn native_copy(&self) -> Result<&dyn crate::native::ChannelCopy> {
        self.native
            .channel_copy()
            .ok_or_else(|| AudioError::invalid_state("the host buffer lost its copy methods"))
    }
}

fn copy_from_channel_polyfill(
    buffer: &dyn NativeAudioBuffer,
    destination: &mut [f32],
    channel: usize,
    offset: usize,
) -> Result<()> {
    buffer.with_channel_data(channel, &mut |data| {
        let source = data.get(offset..).unwrap_or_default();
        let frames = source.len().min(destination.len());
        destination[..frames].copy_from_slice(&source[..frames]);
    })
}

fn copy_to_channel_polyfill(buffer: &dyn NativeAudioBuffer, source: &[f32], channel: usize, offset: usize) -> Result<()> {
    buffer.with_channel_data(channel, &mut |data| {
        if let Some(destination) = data.get_mut(offset..) {
            let frames = source.len().min(destination.len());
            destination[..frames].copy_from_slice(&source[..frames]);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CopyChannelSupport, HostProfile, SoftwareContext};
    use crate::native::NativeOfflineContext;
    use crate::OfflineContextOptions;

    fn buffer(support: CopyChannelSupport, copy: CopyStrategy) -> AudioBuffer {
        let profile = HostProfile::complete().with_copy_channel(support);
        let host = SoftwareContext::with_profile(OfflineContextOptions::default(), profile).unwrap();
        AudioBuffer::new(host.create_buffer(2, 8, 44_100.0).unwrap(), copy)
    }

    fn all_strategies() -> Vec<AudioBuffer> {
        vec![
            buffer(CopyChannelSupport::Full, CopyStrategy::Native),
            buffer(CopyChannelSupport::NoOffsetPastLength, CopyStrategy::Narrow),
            buffer(CopyChannelSupport::Missing, CopyStrategy::Full),
        ]
    }

    #[test]
    fn full_length_round_trip() {
        for buffer in all_strategies() {
            let samples: Vec<f32> = (0..8).map(|i| i as f32 / 8.0).collect();
            buffer.copy_to_channel(&samples, 1, 0).unwrap();
            let mut out = [0.0; 8];
            buffer.copy_from_channel(&mut out, 1, 0).unwrap();
            assert_eq!(out.as_slice(), samples.as_slice(), "{:?}", buffer.copy_strategy());
            assert_eq!(buffer.get_channel_data(0).unwrap(), vec![0.0; 8]);
        }
    }

    #[test]
    fn windowed_round_trip() {
        for buffer in all_strategies() {
            buffer.copy_to_channel(&[1.0, 2.0, 3.0, 4.0], 0, 6).unwrap();
            let mut out = [9.0; 4];
            buffer.copy_from_channel(&mut out, 0, 5).unwrap();
            assert_eq!(out, [0.0, 1.0, 2.0, 9.0], "{:?}", buffer.copy_strategy());
        }
    }

    #[test]
    fn offsets_at_or_past_the_length_copy_nothing() {
        for buffer in all_strategies() {
            buffer.copy_to_channel(&[1.0], 0, 8).unwrap();
            buffer.copy_to_channel(&[1.0], 0, 100).unwrap();
            let mut out = [5.0; 2];
            buffer.copy_from_channel(&mut out, 0, 8).unwrap();
            assert_eq!(out, [5.0; 2]);
            assert_eq!(buffer.get_channel_data(0).unwrap(), vec![0.0; 8]);
        }
    }

    #[test]
    fn channel_out_of_range_is_index_size() {
        for buffer in all_strategies() {
            let result = buffer.copy_from_channel(&mut [0.0; 2], 2, 0);
            assert!(matches!(result, Err(AudioError::IndexSize(_))));
            let result = buffer.copy_to_channel(&[0.0; 2], 5, 0);
            assert!(matches!(result, Err(AudioError::IndexSize(_))));
        }
    }
}
