use parking_lot::RwLock;

use crate::error::{AudioError, Result};
use crate::native::{ChannelCopy, NativeAudioBuffer};

use super::CopyChannelSupport;

/// Planar sample storage of the software host.
pub(crate) struct HostBuffer {
    channels: RwLock<Vec<Vec<f32>>>,
    length: usize,
    sample_rate: f32,
    copy: CopyChannelSupport,
}

impl HostBuffer {
    pub fn new(number_of_channels: usize, length: usize, sample_rate: f32, copy: CopyChannelSupport) -> Self {
        Self::from_channels(vec![vec![0.0; length]; number_of_channels], sample_rate, copy)
    }

    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: f32, copy: CopyChannelSupport) -> Self {
        let length = channels.first().map_or(0, Vec::len);
        Self {
            channels: RwLock::new(channels),
            length,
            sample_rate,
            copy,
        }
    }

    /// Check a windowed copy, returning `false` when nothing is to be copied.
    fn check_window(&self, offset: usize) -> Result<bool> {
        if offset < self.length {
            return Ok(true);
        }
        match self.copy {
            CopyChannelSupport::NoOffsetPastLength => Err(AudioError::index_size(format!(
                "offset {} is not below the buffer length {}",
                offset, self.length
            ))),
            _ => Ok(false),
        }
    }
}

fn channel_error(channel: usize, count: usize) -> AudioError {
    AudioError::index_size(format!(
        "channel {} out of range for a buffer with {} channels",
        channel, count
    ))
}

impl NativeAudioBuffer for HostBuffer {
    fn number_of_channels(&self) -> usize {
        self.channels.read().len()
    }

    fn length(&self) -> usize {
        self.length
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn with_channel_data(&self, channel: usize, f: &mut dyn FnMut(&mut [f32])) -> Result<()> {
        let mut channels = self.channels.write();
        let count = channels.len();
        let data = channels
            .get_mut(channel)
            .ok_or_else(|| channel_error(channel, count))?;
        f(data);
        Ok(())
    }

    fn channel_copy(&self) -> Option<&dyn ChannelCopy> {
        match self.copy {
            CopyChannelSupport::Missing => None,
            _ => Some(self),
        }
    }
}

impl ChannelCopy for HostBuffer {
    fn copy_from_channel(&self, destination: &mut [f32], channel: usize, offset: usize) -> Result<()> {
        let count = self.number_of_channels();
        if channel >= count {
            return Err(channel_error(channel, count));
        }
        if !self.check_window(offset)? {
            return Ok(());
        }
        let channels = self.channels.read();
        let source = &channels[channel][offset..];
        let frames = source.len().min(destination.len());
        destination[..frames].copy_from_slice(&source[..frames]);
        Ok(())
    }

    fn copy_to_channel(&self, source: &[f32], channel: usize, offset: usize) -> Result<()> {
        let count = self.number_of_channels();
        if channel >= count {
            return Err(channel_error(channel, count));
        }
        if !self.check_window(offset)? {
            return Ok(());
        }
        let mut channels = self.channels.write();
        let destination = &mut channels[channel][offset..];
        let frames = source.len().min(destination.len());
        destination[..frames].copy_from_slice(&source[..frames]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_are_windowed() {
        let buffer = HostBuffer::new(1, 4, 44_100.0, CopyChannelSupport::Full);
        buffer.copy_to_channel(&[1.0, 2.0, 3.0], 0, 2).unwrap();
        let mut out = [0.0; 4];
        buffer.copy_from_channel(&mut out, 0, 0).unwrap();
        assert_eq!(out, [0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn offset_at_length_depends_on_support() {
        let full = HostBuffer::new(1, 4, 44_100.0, CopyChannelSupport::Full);
        assert!(full.copy_to_channel(&[1.0], 0, 4).is_ok());

        let narrow = HostBuffer::new(1, 4, 44_100.0, CopyChannelSupport::NoOffsetPastLength);
        assert!(narrow.copy_to_channel(&[1.0], 0, 4).is_err());
        assert!(narrow.copy_to_channel(&[1.0], 0, 3).is_ok());
    }

    #[test]
    fn missing_support_hides_copy_methods() {
        let buffer = HostBuffer::new(1, 4, 44_100.0, CopyChannelSupport::Missing);
        assert!(buffer.channel_copy().is_none());
    }
}
