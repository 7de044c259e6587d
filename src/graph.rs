//! Abstract audio graph - owns node and param data and their connections

use std::sync::Arc;

use parking_lot::Mutex;

use crate::automation::Timeline;
use crate::config::ChannelConfig;
use crate::error::{AudioError, Result};
use crate::native::EndedCallback;
use crate::nodes::{NodeKind, ParamInit};
use crate::worklet::ParamDescriptor;

/// Identifier of a node within its context.
///
/// You typically don't interact with this directly - use
/// [`AudioNode`](crate::AudioNode) instead.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

/// Identifier of a param within its context.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ParamId(pub(crate) u32);

/// An audio connection into a node input.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Connection {
    pub source: NodeId,
    pub output: usize,
    pub input: usize,
}

/// An audio-rate connection into a param.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ParamConnection {
    pub source: NodeId,
    pub output: usize,
}

pub type SharedEndedCallback = Arc<Mutex<EndedCallback>>;

/// Recorded `start`/`stop` calls of a scheduled source.
#[derive(Clone, Default)]
pub struct SourceSchedule {
    pub start: Option<f64>,
    pub stops: Vec<f64>,
    pub onended: Option<SharedEndedCallback>,
}

pub(crate) struct NodeData {
    pub kind: NodeKind,
    pub channel: ChannelConfig,
    /// Incoming connections in the order they were made
    pub inputs: Vec<Connection>,
    pub params: Vec<ParamId>,
    pub schedule: SourceSchedule,
}

#[derive(Clone, Debug)]
pub struct ParamData {
    pub owner: NodeId,
    pub descriptor: ParamDescriptor,
    /// Intrinsic value, applied before any automation
    pub value: f32,
    pub timeline: Timeline,
    pub inputs: Vec<ParamConnection>,
}

/// Everything a renderer needs to know about one node, detached from the graph.
#[derive(Clone)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    pub channel: ChannelConfig,
    pub inputs: Vec<Connection>,
    pub params: Vec<ParamData>,
    pub schedule: SourceSchedule,
}

/// Arena of the nodes and params of one context.
#[derive(Default)]
pub(crate) struct AudioGraph {
    nodes: Vec<NodeData>,
    params: Vec<ParamData>,
}

fn index_error(what: &str, index: usize, count: usize) -> AudioError {
    AudioError::index_size(format!("{} {} out of range ({} available)", what, index, count))
}

impl AudioGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; `kind` must already be validated.
    pub fn add_node(&mut self, kind: NodeKind, params: Vec<ParamInit>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let params = params
            .into_iter()
            .map(|init| {
                let param = ParamId(self.params.len() as u32);
                self.params.push(ParamData {
                    owner: id,
                    descriptor: init.descriptor,
                    value: init.value,
                    timeline: Timeline::new(),
                    inputs: Vec::new(),
                });
                param
            })
            .collect();
        self.nodes.push(NodeData {
            channel: kind.channel_config(),
            kind,
            inputs: Vec::new(),
            params,
            schedule: SourceSchedule::default(),
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0 as usize]
    }

    pub fn param(&self, id: ParamId) -> &ParamData {
        &self.params[id.0 as usize]
    }

    pub fn param_mut(&mut self, id: ParamId) -> &mut ParamData {
        &mut self.params[id.0 as usize]
    }

    /// The param of `node` called `name`.
    pub fn find_param(&self, node: NodeId, name: &str) -> Option<ParamId> {
        self.node(node)
            .params
            .iter()
            .copied()
            .find(|&param| self.param(param).descriptor.name == name)
    }

    fn check_output(&self, node: NodeId, output: usize) -> Result<()> {
        let outputs = self.node(node).kind.number_of_outputs();
        if output >= outputs {
            return Err(index_error("output", output, outputs));
        }
        Ok(())
    }

    /// Connect `output` of `from` to `input` of `to`. Repeated connections
    /// are ignored.
    pub fn connect(&mut self, from: NodeId, output: usize, to: NodeId, input: usize) -> Result<()> {
        self.check_output(from, output)?;
        let inputs = self.node(to).kind.number_of_inputs();
        if input >= inputs {
            return Err(index_error("input", input, inputs));
        }
        let connection = Connection {
            source: from,
            output,
            input,
        };
        let node = self.node_mut(to);
        if !node.inputs.contains(&connection) {
            node.inputs.push(connection);
        }
        Ok(())
    }

    pub fn connect_param(&mut self, from: NodeId, output: usize, param: ParamId) -> Result<()> {
        self.check_output(from, output)?;
        let connection = ParamConnection { source: from, output };
        let param = self.param_mut(param);
        if !param.inputs.contains(&connection) {
            param.inputs.push(connection);
        }
        Ok(())
    }

    /// Remove connections leaving `output` of `from`, or every output when `None`.
    pub fn disconnect(&mut self, from: NodeId, output: Option<usize>) -> Result<()> {
        if let Some(output) = output {
            self.check_output(from, output)?;
        }
        let leaves = |source: NodeId, out: usize| source == from && output.map_or(true, |o| o == out);
        for node in &mut self.nodes {
            node.inputs.retain(|c| !leaves(c.source, c.output));
        }
        for param in &mut self.params {
            param.inputs.retain(|c| !leaves(c.source, c.output));
        }
        Ok(())
    }

    pub fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        let node = self.node(id);
        NodeSnapshot {
            id,
            kind: node.kind.clone(),
            channel: node.channel,
            inputs: node.inputs.clone(),
            params: node.params.iter().map(|&param| self.param(param).clone()).collect(),
            schedule: node.schedule.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{ChannelSplitter, ConstantSource, Gain};

    fn add(graph: &mut AudioGraph, kind: impl Into<NodeKind>) -> NodeId {
        let kind = kind.into();
        let params = kind.params(22_050.0);
        graph.add_node(kind, params)
    }

    #[test]
    fn connections_keep_their_order_and_are_deduplicated() {
        let mut graph = AudioGraph::new();
        let a = add(&mut graph, ConstantSource::new(1.0));
        let b = add(&mut graph, ConstantSource::new(2.0));
        let gain = add(&mut graph, Gain::new(0.5));
        graph.connect(b, 0, gain, 0).unwrap();
        graph.connect(a, 0, gain, 0).unwrap();
        graph.connect(b, 0, gain, 0).unwrap();
        let sources: Vec<_> = graph.node(gain).inputs.iter().map(|c| c.source).collect();
        assert_eq!(sources, [b, a]);
    }

    #[test]
    fn ports_are_range_checked() {
        let mut graph = AudioGraph::new();
        let splitter = add(&mut graph, ChannelSplitter::new(2));
        let gain = add(&mut graph, Gain::new(1.0));
        assert!(graph.connect(splitter, 1, gain, 0).is_ok());
        assert!(matches!(graph.connect(splitter, 2, gain, 0), Err(AudioError::IndexSize(_))));
        assert!(matches!(graph.connect(gain, 0, splitter, 1), Err(AudioError::IndexSize(_))));
    }

    #[test]
    fn disconnect_removes_audio_and_param_connections() {
        let mut graph = AudioGraph::new();
        let source = add(&mut graph, ConstantSource::new(1.0));
        let gain = add(&mut graph, Gain::new(1.0));
        let param = graph.find_param(gain, "gain").unwrap();
        graph.connect(source, 0, gain, 0).unwrap();
        graph.connect_param(source, 0, param).unwrap();
        graph.disconnect(source, None).unwrap();
        assert!(graph.node(gain).inputs.is_empty());
        assert!(graph.param(param).inputs.is_empty());
    }
}
