//! Contracts of a native audio host.
//!
//! The offline renderer never touches a host directly: it talks to these traits.
//! A host may lack some primitives (`create_constant_source`, `create_iir_filter`,
//! `audio_worklet`) or implement others with defects; the renderer probes for
//! that through the [`CapabilityCache`](crate::CapabilityCache) and fakes what is
//! missing.
//!
//! Native nodes are shared handles (`Arc<dyn ...>`). Connections are expressed
//! through [`Endpoint`]s so a composite node can route an incoming connection to
//! whichever inner primitive implements that input.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::automation::AutomationEvent;
use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};
use crate::worklet::{AudioWorkletNodeOptions, ProcessorDefinition};

mod create;

pub use create::{
    create_native_audio_buffer_source, create_native_audio_worklet_node,
    create_native_constant_source, create_native_iir_filter, create_native_oscillator,
    AudioWorkletNodeVariant, ConstantSourceVariant, IirFilterVariant, StopConsecutiveCallsGuard,
    MAX_IIR_COEFFICIENTS,
};
pub(crate) use create::check_iir_coefficients;

/// A boxed, `Send` future, used wherever a trait method is asynchronous.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type NativeNode = Arc<dyn NativeAudioNode>;
pub type NativeSource = Arc<dyn NativeScheduledSource>;
pub type NativeParam = Arc<dyn NativeAudioParam>;
pub type NativeBuffer = Arc<dyn NativeAudioBuffer>;
pub type NativeContextRef = Arc<dyn NativeOfflineContext>;

/// Identity of a native context, used as memo and capability-cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContextId(u64);

impl ContextId {
    /// A process-unique id for a freshly created native context.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which side of a native primitive a connection attaches to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Port {
    Input(usize),
    Output(usize),
    Param(usize),
}

/// A connection point on a host primitive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Endpoint {
    pub context: ContextId,
    /// Host-specific primitive index
    pub node: u32,
    pub port: Port,
}

/// A host-provided (or faked composite) processing primitive.
pub trait NativeAudioNode: Send + Sync {
    fn context_id(&self) -> ContextId;

    fn number_of_inputs(&self) -> usize;

    fn number_of_outputs(&self) -> usize;

    fn channel_config(&self) -> ChannelConfig;

    fn set_channel_config(&self, config: ChannelConfig) -> Result<()>;

    /// The primitive endpoint an upstream connection into `input` attaches to.
    fn input(&self, input: usize) -> Result<Endpoint>;

    /// The primitive endpoint that produces `output`.
    fn output(&self, output: usize) -> Result<Endpoint>;

    /// Look up a parameter by its name ("gain", "offset", "frequency", ...).
    fn param(&self, name: &str) -> Option<NativeParam>;

    fn connect(&self, output: usize, destination: &dyn NativeAudioNode, input: usize) -> Result<()>;

    fn connect_param(&self, output: usize, param: &dyn NativeAudioParam) -> Result<()>;

    /// Remove connections from `output`, or from every output when `None`.
    fn disconnect(&self, output: Option<usize>) -> Result<()>;
}

/// A native source with `start`/`stop` scheduling and an `ended` notification.
pub trait NativeScheduledSource: NativeAudioNode {
    fn start(&self, when: f64) -> Result<()>;

    fn stop(&self, when: f64) -> Result<()>;

    /// Install (or clear) the callback fired once playback has ended.
    fn set_onended(&self, callback: Option<EndedCallback>);
}

pub type EndedCallback = Box<dyn FnMut() + Send>;

/// A native IIR filter.
pub trait NativeIirFilter: NativeAudioNode {
    /// Magnitude and phase response at the given frequencies in Hz.
    ///
    /// All three slices must have the same length; empty slices are valid.
    fn get_frequency_response(
        &self,
        frequency_hz: &[f32],
        magnitude: &mut [f32],
        phase: &mut [f32],
    ) -> Result<()>;
}

/// A schedulable native parameter.
pub trait NativeAudioParam: Send + Sync {
    /// Where audio-rate connections into this param attach.
    fn endpoint(&self) -> Endpoint;

    fn default_value(&self) -> f32;

    fn min_value(&self) -> f32;

    fn max_value(&self) -> f32;

    fn value(&self) -> f32;

    fn set_value(&self, value: f32) -> Result<()>;

    /// Queue an automation event; events are applied in time order.
    fn schedule(&self, event: AutomationEvent) -> Result<()>;

    fn set_value_at_time(&self, value: f32, time: f64) -> Result<()> {
        self.schedule(AutomationEvent::SetValue { value, time })
    }

    fn linear_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<()> {
        self.schedule(AutomationEvent::LinearRamp { value, end_time })
    }

    fn exponential_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<()> {
        self.schedule(AutomationEvent::ExponentialRamp { value, end_time })
    }

    fn set_target_at_time(&self, target: f32, start_time: f64, time_constant: f64) -> Result<()> {
        self.schedule(AutomationEvent::SetTarget {
            target,
            start_time,
            time_constant,
        })
    }

    fn cancel_scheduled_values(&self, time: f64) -> Result<()> {
        self.schedule(AutomationEvent::Cancel { time })
    }
}

/// Sample storage returned by a host's offline render.
pub trait NativeAudioBuffer: Send + Sync {
    fn number_of_channels(&self) -> usize;

    fn length(&self) -> usize;

    fn sample_rate(&self) -> f32;

    /// Per-channel data accessor; `f` sees the whole channel.
    fn with_channel_data(&self, channel: usize, f: &mut dyn FnMut(&mut [f32])) -> Result<()>;

    /// The host's own copy methods, if it has any.
    fn channel_copy(&self) -> Option<&dyn ChannelCopy>;
}

/// Windowed channel copies, as a host implements them.
pub trait ChannelCopy: Send + Sync {
    fn copy_from_channel(&self, destination: &mut [f32], channel: usize, offset: usize) -> Result<()>;

    fn copy_to_channel(&self, source: &[f32], channel: usize, offset: usize) -> Result<()>;
}

/// Called once per processed block: `(inputs, outputs, playback_time)`.
///
/// `inputs` and `outputs` hold one `Vec` per channel of block length.
pub type ScriptProcessorCallback = Box<dyn FnMut(&[Vec<f32>], &mut [Vec<f32>], f64) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BiquadFilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Lowshelf,
    Highshelf,
    Peaking,
    Notch,
    Allpass,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OscillatorType {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Fully-defaulted options for a native buffer source.
#[derive(Clone, Default)]
pub struct BufferSourceOptions {
    pub buffer: Option<NativeBuffer>,
    pub looping: bool,
    pub loop_start: f64,
    /// `0.0` loops the whole buffer
    pub loop_end: f64,
}

/// A host's audio worklet facility.
pub trait NativeAudioWorklet: Send + Sync {
    /// Register a processor under `name`.
    fn add_module(&self, name: &str, definition: ProcessorDefinition) -> BoxFuture<'_, Result<()>>;

    fn create_node(&self, name: &str, options: &AudioWorkletNodeOptions) -> Result<NativeNode>;
}

/// A native offline context: the render target of the engine.
pub trait NativeOfflineContext: Send + Sync {
    fn id(&self) -> ContextId;

    fn sample_rate(&self) -> f32;

    /// Frames of the buffer produced by [`start_rendering`](Self::start_rendering).
    fn length(&self) -> usize;

    fn number_of_channels(&self) -> usize;

    /// Frames processed per host processing step.
    fn render_quantum_size(&self) -> usize {
        128
    }

    fn destination(&self) -> NativeNode;

    fn create_buffer(&self, number_of_channels: usize, length: usize, sample_rate: f32) -> Result<NativeBuffer>;

    fn create_gain(&self, channel: ChannelConfig) -> Result<NativeNode>;

    fn create_delay(&self, max_delay_time: f64, channel: ChannelConfig) -> Result<NativeNode>;

    fn create_biquad_filter(&self, filter_type: BiquadFilterType, channel: ChannelConfig) -> Result<NativeNode>;

    fn create_oscillator(&self, oscillator_type: OscillatorType, channel: ChannelConfig) -> Result<NativeSource>;

    fn create_buffer_source(&self, options: BufferSourceOptions, channel: ChannelConfig) -> Result<NativeSource>;

    fn create_channel_merger(&self, number_of_inputs: usize) -> Result<NativeNode>;

    fn create_channel_splitter(&self, number_of_outputs: usize) -> Result<NativeNode>;

    fn create_script_processor(
        &self,
        buffer_size: usize,
        number_of_input_channels: usize,
        number_of_output_channels: usize,
        callback: ScriptProcessorCallback,
    ) -> Result<NativeNode>;

    fn create_constant_source(&self, _channel: ChannelConfig) -> Result<NativeSource> {
        Err(AudioError::not_supported("this host has no constant source"))
    }

    fn create_iir_filter(
        &self,
        _feedforward: &[f64],
        _feedback: &[f64],
        _channel: ChannelConfig,
    ) -> Result<Arc<dyn NativeIirFilter>> {
        Err(AudioError::not_supported("this host has no IIR filter"))
    }

    fn audio_worklet(&self) -> Option<&dyn NativeAudioWorklet> {
        None
    }

    /// Render the native graph into a buffer of `length` frames.
    fn start_rendering(&self) -> BoxFuture<'_, Result<NativeBuffer>>;
}
