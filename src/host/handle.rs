//! Handles through which the native traits reach host nodes.
//!
//! Handles never touch processor state directly: control data travels through
//! the nodes' message queues and is applied at the start of the next quantum.

use std::sync::Arc;

use parking_lot::Mutex;
use petgraph::graph::NodeIndex;
use rtrb::{Producer, PushError};
use tracing::warn;

use crate::automation::AutomationEvent;
use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};
use crate::native::{
    ContextId, EndedCallback, Endpoint, NativeAudioNode, NativeAudioParam, NativeIirFilter,
    NativeParam, NativeScheduledSource, Port,
};

use super::engine::{ParamMessage, ParamSpec};
use super::processors::{IirCoefficients, SourceMessage};
use super::Shared;

/// Push `msg`, draining the node's queues once when the ring is full.
fn send<M>(shared: &Shared, node: NodeIndex, sender: &Mutex<Producer<M>>, msg: M) -> Result<()> {
    let mut sender = sender.lock();
    match sender.push(msg) {
        Ok(()) => Ok(()),
        Err(PushError::Full(msg)) => {
            shared.engine.lock().drain(node);
            sender
                .push(msg)
                .map_err(|_| AudioError::invalid_state("control queue is full"))
        }
    }
}

pub(crate) struct HostParam {
    shared: Arc<Shared>,
    node: NodeIndex,
    index: usize,
    spec: ParamSpec,
    value: Mutex<f32>,
    sender: Mutex<Producer<ParamMessage>>,
}

impl HostParam {
    pub fn new(shared: Arc<Shared>, node: NodeIndex, index: usize, spec: ParamSpec, sender: Producer<ParamMessage>) -> Self {
        Self {
            shared,
            node,
            index,
            value: Mutex::new(spec.default),
            spec,
            sender: Mutex::new(sender),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

impl NativeAudioParam for HostParam {
    fn endpoint(&self) -> Endpoint {
        Endpoint {
            context: self.shared.id,
            node: self.node.index() as u32,
            port: Port::Param(self.index),
        }
    }

    fn default_value(&self) -> f32 {
        self.spec.default
    }

    fn min_value(&self) -> f32 {
        self.spec.min
    }

    fn max_value(&self) -> f32 {
        self.spec.max
    }

    fn value(&self) -> f32 {
        *self.value.lock()
    }

    fn set_value(&self, value: f32) -> Result<()> {
        *self.value.lock() = value;
        send(&self.shared, self.node, &self.sender, ParamMessage::SetValue(value))
    }

    fn schedule(&self, event: AutomationEvent) -> Result<()> {
        event.validate()?;
        send(&self.shared, self.node, &self.sender, ParamMessage::Schedule(event))
    }
}

/// A host node without control messages of its own.
pub(crate) struct HostNode {
    pub(super) shared: Arc<Shared>,
    pub(super) index: NodeIndex,
    pub(super) inputs: usize,
    pub(super) outputs: usize,
    pub(super) params: Vec<Arc<HostParam>>,
}

impl HostNode {
    fn endpoint(&self, port: Port) -> Endpoint {
        Endpoint {
            context: self.shared.id,
            node: self.index.index() as u32,
            port,
        }
    }
}

impl NativeAudioNode for HostNode {
    fn context_id(&self) -> ContextId {
        self.shared.id
    }

    fn number_of_inputs(&self) -> usize {
        self.inputs
    }

    fn number_of_outputs(&self) -> usize {
        self.outputs
    }

    fn channel_config(&self) -> ChannelConfig {
        self.shared.engine.lock().channel_config(self.index)
    }

    fn set_channel_config(&self, config: ChannelConfig) -> Result<()> {
        config.validate()?;
        self.shared.engine.lock().set_channel_config(self.index, config);
        Ok(())
    }

    fn input(&self, input: usize) -> Result<Endpoint> {
        if input >= self.inputs {
            return Err(AudioError::index_size(format!(
                "input {} out of range ({} inputs)",
                input, self.inputs
            )));
        }
        Ok(self.endpoint(Port::Input(input)))
    }

    fn output(&self, output: usize) -> Result<Endpoint> {
        if output >= self.outputs {
            return Err(AudioError::index_size(format!(
                "output {} out of range ({} outputs)",
                output, self.outputs
            )));
        }
        Ok(self.endpoint(Port::Output(output)))
    }

    fn param(&self, name: &str) -> Option<NativeParam> {
        self.params
            .iter()
            .find(|param| param.name() == name)
            .map(|param| param.clone() as NativeParam)
    }

    fn connect(&self, output: usize, destination: &dyn NativeAudioNode, input: usize) -> Result<()> {
        let from = self.output(output)?;
        let to = destination.input(input)?;
        self.shared.connect(from, to)
    }

    fn connect_param(&self, output: usize, param: &dyn NativeAudioParam) -> Result<()> {
        let from = self.output(output)?;
        self.shared.connect(from, param.endpoint())
    }

    fn disconnect(&self, output: Option<usize>) -> Result<()> {
        if let Some(output) = output {
            self.output(output)?;
        }
        self.shared.engine.lock().disconnect(self.index, output);
        Ok(())
    }
}

#[derive(Default)]
struct SourceState {
    started: bool,
    stopped: bool,
}

/// A host node scheduled through `start`/`stop`.
pub(crate) struct HostSource {
    node: HostNode,
    sender: Mutex<Producer<SourceMessage>>,
    state: Mutex<SourceState>,
}

impl HostSource {
    pub fn new(node: HostNode, sender: Producer<SourceMessage>) -> Self {
        Self {
            node,
            sender: Mutex::new(sender),
            state: Mutex::new(SourceState::default()),
        }
    }

    fn send(&self, msg: SourceMessage) -> Result<()> {
        send(&self.node.shared, self.node.index, &self.sender, msg)
    }
}

fn check_time(when: f64) -> Result<()> {
    if !when.is_finite() || when < 0.0 {
        return Err(AudioError::not_supported(format!(
            "time {} must be finite and non-negative",
            when
        )));
    }
    Ok(())
}

impl NativeAudioNode for HostSource {
    delegate::delegate! {
        to self.node {
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

impl NativeScheduledSource for HostSource {
    fn start(&self, when: f64) -> Result<()> {
        check_time(when)?;
        let mut state = self.state.lock();
        if state.started {
            return Err(AudioError::invalid_state("start may only be called once"));
        }
        self.send(SourceMessage::Start(when))?;
        state.started = true;
        Ok(())
    }

    fn stop(&self, when: f64) -> Result<()> {
        check_time(when)?;
        let mut state = self.state.lock();
        if !state.started {
            return Err(AudioError::invalid_state("stop called before start"));
        }
        if state.stopped && !self.node.shared.profile.consecutive_stop_calls {
            return Err(AudioError::invalid_state("stop called twice"));
        }
        self.send(SourceMessage::Stop(when))?;
        state.stopped = true;
        Ok(())
    }

    fn set_onended(&self, callback: Option<EndedCallback>) {
        if let Err(err) = self.send(SourceMessage::OnEnded(callback)) {
            warn!(%err, "could not install ended callback");
        }
    }
}

/// A native IIR filter of the software host.
pub(crate) struct HostIirFilter {
    node: HostNode,
    coefficients: IirCoefficients,
}

impl HostIirFilter {
    pub fn new(node: HostNode, coefficients: IirCoefficients) -> Self {
        Self { node, coefficients }
    }
}

impl NativeAudioNode for HostIirFilter {
    delegate::delegate! {
        to self.node {
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

impl NativeIirFilter for HostIirFilter {
    fn get_frequency_response(&self, frequency_hz: &[f32], magnitude: &mut [f32], phase: &mut [f32]) -> Result<()> {
        let sample_rate = self.node.shared.options.sample_rate as f64;
        self.coefficients
            .frequency_response(sample_rate, frequency_hz, magnitude, phase)
    }
}
