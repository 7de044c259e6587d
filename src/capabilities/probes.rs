//! Feature probes run against a native context.
//!
//! A probe answers `Ok(false)` only when the host reports missing support the
//! way a lacking host does; every other failure propagates.

use hashbrown::HashMap;

use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};
use crate::native::{BufferSourceOptions, NativeOfflineContext};
use crate::worklet::{AudioWorkletProcessor, ProcessorDefinition};

/// Name under which the worklet probe registers its processor.
pub const PROBE_PROCESSOR_NAME: &str = "__einklang_probe__";

fn supported_unless_not_supported<T>(result: Result<T>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(err) if err.is_not_supported() => Ok(false),
        Err(err) => Err(err),
    }
}

pub fn test_constant_source_support(native: &dyn NativeOfflineContext) -> Result<bool> {
    supported_unless_not_supported(native.create_constant_source(ChannelConfig::default()))
}

pub fn test_iir_filter_support(native: &dyn NativeOfflineContext) -> Result<bool> {
    supported_unless_not_supported(native.create_iir_filter(&[1.0], &[1.0], ChannelConfig::default()))
}

struct Silence;

impl AudioWorkletProcessor for Silence {
    fn process(
        &mut self,
        _inputs: &[Vec<Vec<f32>>],
        _outputs: &mut [Vec<Vec<f32>>],
        _parameters: &HashMap<String, Vec<f32>>,
    ) -> bool {
        false
    }
}

/// Whether the host exposes a worklet that accepts a module.
pub async fn test_audio_worklet_support(native: &dyn NativeOfflineContext) -> Result<bool> {
    let Some(worklet) = native.audio_worklet() else {
        return Ok(false);
    };
    let definition = ProcessorDefinition::new(|_| Box::new(Silence));
    supported_unless_not_supported(worklet.add_module(PROBE_PROCESSOR_NAME, definition).await)
}

/// Whether `stop()` may be called twice on a throwaway buffer source.
pub fn test_stop_consecutive_calls_support(native: &dyn NativeOfflineContext) -> Result<bool> {
    let source = native.create_buffer_source(BufferSourceOptions::default(), ChannelConfig::default())?;
    source.start(0.0)?;
    source.stop(0.0)?;
    match source.stop(0.0) {
        Ok(()) => Ok(true),
        Err(AudioError::InvalidState(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Whether windowed copies accept an offset equal to the buffer length.
///
/// A host without copy methods reports `false`.
pub fn test_copy_channel_methods_subarray_support(native: &dyn NativeOfflineContext) -> Result<bool> {
    let buffer = native.create_buffer(1, 1, native.sample_rate())?;
    let Some(copy) = buffer.channel_copy() else {
        return Ok(false);
    };
    let mut scratch = [0.0; 2];
    let result = copy
        .copy_from_channel(&mut scratch, 0, 1)
        .and_then(|()| copy.copy_to_channel(&scratch, 0, 1));
    match result {
        Ok(()) => Ok(true),
        Err(AudioError::IndexSize(_) | AudioError::InvalidAccess(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CopyChannelSupport, HostProfile, SoftwareContext};
    use crate::OfflineContextOptions;

    fn host(profile: HostProfile) -> SoftwareContext {
        SoftwareContext::with_profile(OfflineContextOptions::default().with_length(64), profile).unwrap()
    }

    #[test]
    fn probes_follow_the_host_profile() {
        let complete = host(HostProfile::complete());
        assert_eq!(test_constant_source_support(&complete), Ok(true));
        assert_eq!(test_iir_filter_support(&complete), Ok(true));
        assert_eq!(test_stop_consecutive_calls_support(&complete), Ok(true));
        assert_eq!(test_copy_channel_methods_subarray_support(&complete), Ok(true));

        let minimal = host(HostProfile::minimal());
        assert_eq!(test_constant_source_support(&minimal), Ok(false));
        assert_eq!(test_iir_filter_support(&minimal), Ok(false));
        assert_eq!(test_stop_consecutive_calls_support(&minimal), Ok(false));
        assert_eq!(test_copy_channel_methods_subarray_support(&minimal), Ok(false));
    }

    #[test]
    fn narrow_copy_defect_is_detected() {
        let profile = HostProfile::complete().with_copy_channel(CopyChannelSupport::NoOffsetPastLength);
        assert_eq!(test_copy_channel_methods_subarray_support(&host(profile)), Ok(false));
    }

    #[tokio::test]
    async fn worklet_probe_needs_a_worklet() {
        assert_eq!(test_audio_worklet_support(&host(HostProfile::complete())).await, Ok(true));
        assert_eq!(test_audio_worklet_support(&host(HostProfile::minimal())).await, Ok(false));
    }
}
