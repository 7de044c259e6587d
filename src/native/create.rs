//! Capability-aware construction of native nodes.
//!
//! Each helper asks the [`CapabilityCache`] whether the host implements a
//! primitive correctly and either creates the native primitive or a faked
//! composite built from other primitives. Callers only see the variant enums,
//! which implement the same native traits either way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use delegate::delegate;
use tracing::{debug, warn};

use super::{
    BufferSourceOptions, ContextId, EndedCallback, Endpoint, NativeAudioNode, NativeAudioParam,
    NativeIirFilter, NativeNode, NativeOfflineContext, NativeParam, NativeScheduledSource, NativeSource,
    OscillatorType,
};
use crate::capabilities::{probes, Capability, CapabilityCache, CapabilityKey};
use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};
use crate::fakers::{AudioWorkletFaker, ConstantSourceFaker, IirFilterFaker};
use crate::worklet::{AudioWorkletNodeOptions, ProcessorDefinition};

/// Longest coefficient vector an IIR filter accepts.
pub const MAX_IIR_COEFFICIENTS: usize = 20;

/// Check IIR coefficients the way every host must.
///
/// An empty `feedback` slice stands for `[1.0]`.
pub(crate) fn check_iir_coefficients(feedforward: &[f64], feedback: &[f64]) -> Result<()> {
    if feedforward.is_empty() || feedforward.len() > MAX_IIR_COEFFICIENTS {
        return Err(AudioError::not_supported(format!(
            "{} feedforward coefficients given, 1..={} allowed",
            feedforward.len(),
            MAX_IIR_COEFFICIENTS
        )));
    }
    if feedback.len() > MAX_IIR_COEFFICIENTS {
        return Err(AudioError::not_supported(format!(
            "{} feedback coefficients given, at most {} allowed",
            feedback.len(),
            MAX_IIR_COEFFICIENTS
        )));
    }
    if feedforward.iter().all(|&c| c == 0.0) {
        return Err(AudioError::invalid_state("feedforward coefficients must not all be zero"));
    }
    if feedback.first() == Some(&0.0) {
        return Err(AudioError::invalid_state("the first feedback coefficient must not be zero"));
    }
    Ok(())
}

fn key(capability: Capability, native: &dyn NativeOfflineContext) -> CapabilityKey {
    CapabilityKey::new(capability, native.id())
}

/// Wrap `source` in a [`StopConsecutiveCallsGuard`] if the host needs one.
pub(crate) fn guard_consecutive_stop_calls(
    native: &dyn NativeOfflineContext,
    cache: &CapabilityCache,
    source: NativeSource,
) -> Result<NativeSource> {
    let supported = cache.cache_test_result(key(Capability::StopConsecutiveCalls, native), || {
        probes::test_stop_consecutive_calls_support(native)
    })?;
    if supported {
        return Ok(source);
    }
    Ok(Arc::new(StopConsecutiveCallsGuard::new(native, source)?))
}

/// Create a buffer source whose `stop` tolerates consecutive calls.
pub fn create_native_audio_buffer_source(
    native: &dyn NativeOfflineContext,
    cache: &CapabilityCache,
    options: BufferSourceOptions,
    channel: ChannelConfig,
) -> Result<NativeSource> {
    let source = native.create_buffer_source(options, channel)?;
    guard_consecutive_stop_calls(native, cache, source)
}

/// Create an oscillator whose `stop` tolerates consecutive calls.
pub fn create_native_oscillator(
    native: &dyn NativeOfflineContext,
    cache: &CapabilityCache,
    oscillator_type: OscillatorType,
    channel: ChannelConfig,
) -> Result<NativeSource> {
    let source = native.create_oscillator(oscillator_type, channel)?;
    guard_consecutive_stop_calls(native, cache, source)
}

/// A native constant source, or one faked from a looped buffer source.
pub fn create_native_constant_source(
    native: &dyn NativeOfflineContext,
    cache: &CapabilityCache,
    channel: ChannelConfig,
) -> Result<ConstantSourceVariant> {
    let supported = cache.cache_test_result(key(Capability::ConstantSource, native), || {
        probes::test_constant_source_support(native)
    })?;
    if supported {
        let source = native.create_constant_source(channel)?;
        return Ok(ConstantSourceVariant::Native(guard_consecutive_stop_calls(native, cache, source)?));
    }
    warn!(context = ?native.id(), "host lacks a constant source, faking it");
    Ok(ConstantSourceVariant::Faked(ConstantSourceFaker::new(native, cache, channel)?))
}

/// A native IIR filter, or one faked with a script processor.
pub fn create_native_iir_filter(
    native: &dyn NativeOfflineContext,
    cache: &CapabilityCache,
    feedforward: &[f64],
    feedback: &[f64],
    channel: ChannelConfig,
) -> Result<IirFilterVariant> {
    check_iir_coefficients(feedforward, feedback)?;
    let supported = cache.cache_test_result(key(Capability::IirFilter, native), || {
        probes::test_iir_filter_support(native)
    })?;
    if supported {
        return Ok(IirFilterVariant::Native(native.create_iir_filter(feedforward, feedback, channel)?));
    }
    warn!(context = ?native.id(), "host lacks an IIR filter, faking it");
    Ok(IirFilterVariant::Faked(IirFilterFaker::new(native, feedforward, feedback, channel)?))
}

/// A native worklet node, or one faked with a script processor.
///
/// On hosts with worklet support the processor is registered under `name`
/// before the node is created.
pub async fn create_native_audio_worklet_node(
    native: &dyn NativeOfflineContext,
    cache: &CapabilityCache,
    name: &str,
    definition: &ProcessorDefinition,
    options: &AudioWorkletNodeOptions,
) -> Result<AudioWorkletNodeVariant> {
    let supported = cache
        .cache_test_result_async(key(Capability::AudioWorklet, native), || {
            probes::test_audio_worklet_support(native)
        })
        .await?;
    if let (true, Some(worklet)) = (supported, native.audio_worklet()) {
        worklet.add_module(name, definition.clone()).await?;
        debug!(%name, "creating native worklet node");
        return Ok(AudioWorkletNodeVariant::Native(worklet.create_node(name, options)?));
    }
    warn!(context = ?native.id(), %name, "host lacks audio worklets, faking the node");
    Ok(AudioWorkletNodeVariant::Faked(AudioWorkletFaker::new(native, cache, definition, options)?))
}

pub enum ConstantSourceVariant {
    Native(NativeSource),
    Faked(ConstantSourceFaker),
}

pub enum IirFilterVariant {
    Native(Arc<dyn NativeIirFilter>),
    Faked(IirFilterFaker),
}

pub enum AudioWorkletNodeVariant {
    Native(NativeNode),
    Faked(AudioWorkletFaker),
}

impl ConstantSourceVariant {
    pub fn is_faked(&self) -> bool {
        matches!(self, ConstantSourceVariant::Faked(_))
    }
}

impl IirFilterVariant {
    pub fn is_faked(&self) -> bool {
        matches!(self, IirFilterVariant::Faked(_))
    }
}

impl AudioWorkletNodeVariant {
    pub fn is_faked(&self) -> bool {
        matches!(self, AudioWorkletNodeVariant::Faked(_))
    }
}

macro_rules! delegate_audio_node {
    ($variant:ident) => {
        impl NativeAudioNode for $variant {
            delegate! {
                to match self {
                    $variant::Native(node) => node,
                    $variant::Faked(node) => node,
                } {
                    fn context_id(&self) -> ContextId;
                    fn number_of_inputs(&self) -> usize;
                    fn number_of_outputs(&self) -> usize;
                    fn channel_config(&self) -> ChannelConfig;
                    fn set_channel_config(&self, config: ChannelConfig) -> Result<()>;
                    fn input(&self, input: usize) -> Result<Endpoint>;
                    fn output(&self, output: usize) -> Result<Endpoint>;
                    fn param(&self, name: &str) -> Option<NativeParam>;
                    fn connect(&self, output: usize, destination: &dyn NativeAudioNode, input: usize) -> Result<()>;
                    fn connect_param(&self, output: usize, param: &dyn NativeAudioParam) -> Result<()>;
                    fn disconnect(&self, output: Option<usize>) -> Result<()>;
                }
            }
        }
    };
}

delegate_audio_node!(ConstantSourceVariant);
delegate_audio_node!(IirFilterVariant);
delegate_audio_node!(AudioWorkletNodeVariant);

impl NativeScheduledSource for ConstantSourceVariant {
    delegate! {
        to match self {
            ConstantSourceVariant::Native(node) => node,
            ConstantSourceVariant::Faked(node) => node,
        } {
            fn start(&self, when: f64) -> Result<()>;
            fn stop(&self, when: f64) -> Result<()>;
            fn set_onended(&self, callback: Option<EndedCallback>);
        }
    }
}

impl NativeIirFilter for IirFilterVariant {
    delegate! {
        to match self {
            IirFilterVariant::Native(node) => node,
            IirFilterVariant::Faked(node) => node,
        } {
            fn get_frequency_response(
                &self,
                frequency_hz: &[f32],
                magnitude: &mut [f32],
                phase: &mut [f32],
            ) -> Result<()>;
        }
    }
}

/// Routes a source through a gain so a rejected repeated `stop` can still
/// silence it at the requested time.
pub struct StopConsecutiveCallsGuard {
    source: NativeSource,
    gain: NativeNode,
    stopped: AtomicBool,
}

impl StopConsecutiveCallsGuard {
    pub fn new(native: &dyn NativeOfflineContext, source: NativeSource) -> Result<Self> {
        let gain = native.create_gain(source.channel_config())?;
        for output in 0..source.number_of_outputs() {
            source.connect(output, gain.as_ref(), 0)?;
        }
        Ok(Self {
            source,
            gain,
            stopped: AtomicBool::new(false),
        })
    }
}

impl NativeAudioNode for StopConsecutiveCallsGuard {
    delegate! {
        to self.source {
            fn context_id(&self) -> ContextId;
            fn number_of_inputs(&self) -> usize;
            fn number_of_outputs(&self) -> usize;
            fn channel_config(&self) -> ChannelConfig;
            fn input(&self, input: usize) -> Result<Endpoint>;
            fn param(&self, name: &str) -> Option<NativeParam>;
        }
        to self.gain {
            fn output(&self, output: usize) -> Result<Endpoint>;
            fn connect(&self, output: usize, destination: &dyn NativeAudioNode, input: usize) -> Result<()>;
            fn connect_param(&self, output: usize, param: &dyn NativeAudioParam) -> Result<()>;
            fn disconnect(&self, output: Option<usize>) -> Result<()>;
        }
    }

    /// The gain carries the source's channels and follows its configuration.
    fn set_channel_config(&self, config: ChannelConfig) -> Result<()> {
        self.source.set_channel_config(config)?;
        self.gain.set_channel_config(config)
    }
}

impl NativeScheduledSource for StopConsecutiveCallsGuard {
    fn start(&self, when: f64) -> Result<()> {
        self.source.start(when)
    }

    fn stop(&self, when: f64) -> Result<()> {
        if !self.stopped.load(Ordering::SeqCst) {
            self.source.stop(when)?;
            self.stopped.store(true, Ordering::SeqCst);
            return Ok(());
        }
        match self.source.stop(when) {
            Err(AudioError::InvalidState(_)) => {
                debug!(when, "host rejected a repeated stop, muting instead");
                let gain = self
                    .gain
                    .param("gain")
                    .ok_or_else(|| AudioError::invalid_state("gain node without gain param"))?;
                gain.set_value_at_time(0.0, when)
            }
            result => result,
        }
    }

    fn set_onended(&self, callback: Option<EndedCallback>) {
        self.source.set_onended(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostProfile, SoftwareContext};
    use crate::OfflineContextOptions;

    #[test]
    fn guarded_sources_configure_their_gain() {
        let profile = HostProfile::complete().with_consecutive_stop_calls(false);
        let host = SoftwareContext::with_profile(OfflineContextOptions::default(), profile).unwrap();
        let source = host
            .create_oscillator(OscillatorType::Sine, ChannelConfig::explicit(1))
            .unwrap();
        let guard = StopConsecutiveCallsGuard::new(&host, source).unwrap();

        guard.set_channel_config(ChannelConfig::explicit(2)).unwrap();
        assert_eq!(guard.channel_config(), ChannelConfig::explicit(2));
        assert_eq!(guard.gain.channel_config(), ChannelConfig::explicit(2));
    }

    #[test]
    fn iir_coefficients_are_validated() {
        assert!(check_iir_coefficients(&[1.0], &[]).is_ok());
        assert!(matches!(check_iir_coefficients(&[], &[1.0]), Err(AudioError::NotSupported(_))));
        assert!(matches!(check_iir_coefficients(&[1.0; 21], &[1.0]), Err(AudioError::NotSupported(_))));
        assert!(matches!(check_iir_coefficients(&[1.0], &[1.0; 21]), Err(AudioError::NotSupported(_))));
        assert!(matches!(check_iir_coefficients(&[0.0, 0.0], &[1.0]), Err(AudioError::InvalidState(_))));
        assert!(matches!(check_iir_coefficients(&[1.0], &[0.0, 1.0]), Err(AudioError::InvalidState(_))));
    }
}
