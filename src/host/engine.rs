//! The software host's processing graph.
//!
//! Nodes are processed in depth-first post-order from the destination, one
//! render quantum at a time. A connection that closes a cycle reads the
//! upstream node's output of the previous quantum.

use dasp_graph::Buffer;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, EdgeRef, Reversed};
use petgraph::Direction::{Incoming, Outgoing};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, trace, warn};

use crate::automation::{AutomationEvent, Timeline};
use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};
use crate::native::{Endpoint, Port};

use super::mixing::{mix_into, mix_to_mono};
use super::processor::{Channels, ErasedProcessor, ProcessContext};

/// Capacity of every control queue.
pub(crate) const QUEUE_SIZE: usize = 256;

/// Name, default and nominal range of a host parameter.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ParamSpec {
    pub name: String,
    pub default: f32,
    pub min: f32,
    pub max: f32,
}

impl ParamSpec {
    pub fn new(name: &str, default: f32) -> Self {
        Self {
            name: name.to_owned(),
            default,
            min: f32::MIN,
            max: f32::MAX,
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Shape of a host node.
#[derive(Clone, Debug)]
pub(crate) struct NodeSpec {
    pub kind: &'static str,
    pub inputs: usize,
    pub outputs: usize,
    pub channel: ChannelConfig,
    pub params: Vec<ParamSpec>,
}

impl NodeSpec {
    pub fn new(kind: &'static str, inputs: usize, outputs: usize, channel: ChannelConfig) -> Self {
        Self {
            kind,
            inputs,
            outputs,
            channel,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }
}

pub(crate) enum ParamMessage {
    SetValue(f32),
    Schedule(AutomationEvent),
}

struct ParamState {
    spec: ParamSpec,
    value: f32,
    timeline: Timeline,
    receiver: Consumer<ParamMessage>,
}

impl ParamState {
    fn drain(&mut self) {
        while let Ok(msg) = self.receiver.pop() {
            match msg {
                ParamMessage::SetValue(value) => self.value = value,
                ParamMessage::Schedule(event) => {
                    if let Err(err) = self.timeline.insert(event) {
                        warn!(param = %self.spec.name, %err, "dropped automation event");
                    }
                }
            }
        }
    }
}

struct HostNodeState {
    kind: &'static str,
    processor: Box<dyn ErasedProcessor>,
    inputs: usize,
    outputs: Vec<Channels>,
    channel: ChannelConfig,
    params: Vec<ParamState>,
}

/// How an edge attaches to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Audio { output: usize, input: usize },
    Param { output: usize, param: usize },
}

impl Route {
    fn output(&self) -> usize {
        match *self {
            Route::Audio { output, .. } | Route::Param { output, .. } => output,
        }
    }
}

pub(crate) struct Engine {
    graph: DiGraph<HostNodeState, Route>,
    ctx: ProcessContext,
    destination: NodeIndex,
}

impl Engine {
    /// An engine whose graph holds only the destination node.
    pub fn new(sample_rate: f32, destination: NodeSpec, processor: Box<dyn ErasedProcessor>) -> Self {
        let mut graph = DiGraph::with_capacity(64, 64);
        let state = HostNodeState {
            kind: destination.kind,
            processor,
            inputs: destination.inputs,
            outputs: vec![vec![Buffer::SILENT]; destination.outputs],
            channel: destination.channel,
            params: Vec::new(),
        };
        let destination = graph.add_node(state);
        Self {
            graph,
            ctx: ProcessContext {
                sample_rate,
                buffer_size: Buffer::LEN,
                frame: 0,
            },
            destination,
        }
    }

    pub fn destination(&self) -> NodeIndex {
        self.destination
    }

    /// Add a node, returning its index and one control queue per parameter.
    pub fn add_node(
        &mut self,
        spec: NodeSpec,
        processor: Box<dyn ErasedProcessor>,
    ) -> (NodeIndex, Vec<Producer<ParamMessage>>) {
        let mut senders = Vec::with_capacity(spec.params.len());
        let params = spec
            .params
            .into_iter()
            .map(|spec| {
                let (producer, consumer) = RingBuffer::new(QUEUE_SIZE);
                senders.push(producer);
                ParamState {
                    value: spec.default,
                    spec,
                    timeline: Timeline::new(),
                    receiver: consumer,
                }
            })
            .collect();
        let index = self.graph.add_node(HostNodeState {
            kind: spec.kind,
            processor,
            inputs: spec.inputs,
            outputs: vec![vec![Buffer::SILENT]; spec.outputs],
            channel: spec.channel,
            params,
        });
        debug!(kind = spec.kind, node = index.index(), "added host node");
        (index, senders)
    }

    fn node_index(&self, endpoint: &Endpoint) -> Result<NodeIndex> {
        let index = NodeIndex::new(endpoint.node as usize);
        if self.graph.node_weight(index).is_none() {
            return Err(AudioError::invalid_access(format!(
                "no host node {}",
                endpoint.node
            )));
        }
        Ok(index)
    }

    /// Connect an output endpoint to an input or parameter endpoint.
    ///
    /// Connecting the same pair twice has no effect.
    pub fn connect(&mut self, from: Endpoint, to: Endpoint) -> Result<()> {
        let source = self.node_index(&from)?;
        let target = self.node_index(&to)?;
        let output = match from.port {
            Port::Output(output) if output < self.graph[source].outputs.len() => output,
            port => return Err(AudioError::index_size(format!("{:?} is not an output", port))),
        };
        let route = match to.port {
            Port::Input(input) if input < self.graph[target].inputs => Route::Audio { output, input },
            Port::Param(param) if param < self.graph[target].params.len() => Route::Param { output, param },
            port => {
                return Err(AudioError::index_size(format!(
                    "{:?} does not exist on {}",
                    port, self.graph[target].kind
                )))
            }
        };
        let exists = self
            .graph
            .edges_directed(source, Outgoing)
            .any(|edge| edge.target() == target && *edge.weight() == route);
        if !exists {
            self.graph.add_edge(source, target, route);
        }
        Ok(())
    }

    /// Remove connections leaving `node` from `output`, or from all outputs.
    pub fn disconnect(&mut self, node: NodeIndex, output: Option<usize>) {
        self.graph.retain_edges(|graph, edge| {
            let leaves_node = graph.edge_endpoints(edge).map(|(source, _)| source) == Some(node);
            let matches = output.map_or(true, |output| graph[edge].output() == output);
            !(leaves_node && matches)
        });
    }

    pub fn channel_config(&self, node: NodeIndex) -> ChannelConfig {
        self.graph[node].channel
    }

    pub fn set_channel_config(&mut self, node: NodeIndex, channel: ChannelConfig) {
        self.graph[node].channel = channel;
    }

    /// Apply queued control messages of `node` outside of processing.
    pub fn drain(&mut self, node: NodeIndex) {
        let state = &mut self.graph[node];
        state.processor.drain();
        for param in &mut state.params {
            param.drain();
        }
    }

    fn processing_order(&self) -> Vec<NodeIndex> {
        let reversed = Reversed(&self.graph);
        let mut dfs = DfsPostOrder::new(reversed, self.destination);
        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(node) = dfs.next(reversed) {
            order.push(node);
        }
        order
    }

    /// Process quanta until `length` frames of the destination are rendered.
    pub fn render(&mut self, length: usize, channels: usize) -> Vec<Vec<f32>> {
        let order = self.processing_order();
        debug!(nodes = order.len(), length, "rendering host graph");

        let mut result = vec![vec![0.0; length]; channels];
        let mut written = 0;
        while written < length {
            for &node in &order {
                self.process_node(node);
            }
            let frames = (length - written).min(Buffer::LEN);
            let rendered = &self.graph[self.destination].outputs[0];
            for (data, buffer) in result.iter_mut().zip(rendered) {
                data[written..written + frames].copy_from_slice(&buffer[..frames]);
            }
            written += frames;
            self.ctx.frame += Buffer::LEN as u64;
            trace!(frame = self.ctx.frame, written, "processed quantum");
        }
        result
    }

    fn process_node(&mut self, node: NodeIndex) {
        let ctx = self.ctx;
        let state = &self.graph[node];

        let mut inputs: Vec<Channels> = Vec::with_capacity(state.inputs);
        for port in 0..state.inputs {
            let sources: Vec<(NodeIndex, usize)> = self
                .graph
                .edges_directed(node, Incoming)
                .filter_map(|edge| match *edge.weight() {
                    Route::Audio { output, input } if input == port => Some((edge.source(), output)),
                    _ => None,
                })
                .collect();
            let channels = state
                .channel
                .computed_channels(sources.iter().map(|&(s, o)| self.graph[s].outputs[o].len()));
            let mut mixed = vec![Buffer::SILENT; channels];
            for (source, output) in sources {
                mix_into(&mut mixed, &self.graph[source].outputs[output], state.channel.interpretation);
            }
            inputs.push(mixed);
        }

        let mut connected = vec![Buffer::SILENT; state.params.len()];
        for edge in self.graph.edges_directed(node, Incoming) {
            if let Route::Param { output, param } = *edge.weight() {
                mix_to_mono(&mut connected[param], &self.graph[edge.source()].outputs[output]);
            }
        }

        let state = &mut self.graph[node];
        let mut params = Vec::with_capacity(state.params.len());
        for (param, signal) in state.params.iter_mut().zip(connected) {
            param.drain();
            let mut values = Buffer::SILENT;
            param.timeline.fill(param.value, ctx.time(0), ctx.sample_rate, &mut values);
            for (value, input) in values.iter_mut().zip(signal.iter()) {
                *value = (*value + input).clamp(param.spec.min, param.spec.max);
            }
            params.push(values);
        }

        let HostNodeState { processor, outputs, .. } = state;
        processor.process_erased(&ctx, &inputs, &params, outputs);
    }
}
