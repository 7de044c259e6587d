use delegate::delegate;

use crate::capabilities::CapabilityCache;
use crate::config::ChannelConfig;
use crate::error::Result;
use crate::native::{
    create_native_audio_buffer_source, BufferSourceOptions, ContextId, EndedCallback, Endpoint, NativeAudioNode,
    NativeAudioParam, NativeNode, NativeOfflineContext, NativeParam, NativeScheduledSource, NativeSource,
};

/// A constant source made of a looped two-sample buffer of ones feeding a gain.
///
/// The gain's `gain` param doubles as `offset`.
pub struct ConstantSourceFaker {
    source: NativeSource,
    gain: NativeNode,
}

impl ConstantSourceFaker {
    pub fn new(native: &dyn NativeOfflineContext, cache: &CapabilityCache, channel: ChannelConfig) -> Result<Self> {
        let buffer = native.create_buffer(1, 2, native.sample_rate())?;
        buffer.with_channel_data(0, &mut |data| data.fill(1.0))?;
        let options = BufferSourceOptions {
            buffer: Some(buffer),
            looping: true,
            ..Default::default()
        };
        let source = create_native_audio_buffer_source(native, cache, options, ChannelConfig::default())?;
        let gain = native.create_gain(channel)?;
        source.connect(0, gain.as_ref(), 0)?;
        Ok(Self { source, gain })
    }
}

impl NativeAudioNode for ConstantSourceFaker {
    delegate! {
        to self.gain {
            fn context_id(&self) -> ContextId;
            fn number_of_inputs(&self) -> usize;
            fn number_of_outputs(&self) -> usize;
            fn channel_config(&self) -> ChannelConfig;
            fn set_channel_config(&self, config: ChannelConfig) -> Result<()>;
            fn input(&self, input: usize) -> Result<Endpoint>;
            fn output(&self, output: usize) -> Result<Endpoint>;
            fn connect(&self, output: usize, destination: &dyn NativeAudioNode, input: usize) -> Result<()>;
            fn connect_param(&self, output: usize, param: &dyn NativeAudioParam) -> Result<()>;
            fn disconnect(&self, output: Option<usize>) -> Result<()>;
        }
    }

    fn param(&self, name: &str) -> Option<NativeParam> {
        match name {
            "offset" => self.gain.param("gain"),
            _ => None,
        }
    }
}

impl NativeScheduledSource for ConstantSourceFaker {
    delegate! {
        to self.source {
            fn start(&self, when: f64) -> Result<()>;
            fn stop(&self, when: f64) -> Result<()>;
            fn set_onended(&self, callback: Option<EndedCallback>);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostProfile, SoftwareContext};
    use crate::OfflineContextOptions;
    use approx::assert_relative_eq;

    #[tokio::test]
    async fn outputs_offset_between_start_and_stop() {
        let options = OfflineContextOptions::new(1, 256, 6400.0);
        let host = SoftwareContext::with_profile(options, HostProfile::minimal()).unwrap();
        let cache = CapabilityCache::new();
        let faker = ConstantSourceFaker::new(&host, &cache, ChannelConfig::default()).unwrap();
        faker.param("offset").unwrap().set_value(0.75).unwrap();
        faker.connect(0, host.destination().as_ref(), 0).unwrap();
        // frames 64..192
        faker.start(0.01).unwrap();
        faker.stop(0.03).unwrap();

        let buffer = host.start_rendering().await.unwrap();
        let mut samples = Vec::new();
        buffer.with_channel_data(0, &mut |data| samples.extend_from_slice(data)).unwrap();
        for (frame, sample) in samples.iter().enumerate() {
            let expected = if (64..192).contains(&frame) { 0.75 } else { 0.0 };
            assert_relative_eq!(*sample, expected);
        }
    }

    #[test]
    fn only_offset_is_exposed() {
        let host = SoftwareContext::with_profile(OfflineContextOptions::default(), HostProfile::minimal()).unwrap();
        let faker = ConstantSourceFaker::new(&host, &CapabilityCache::new(), ChannelConfig::default()).unwrap();
        assert!(faker.param("offset").is_some());
        assert!(faker.param("gain").is_none());
        assert_eq!(faker.number_of_outputs(), 1);
    }
}
