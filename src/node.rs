//! Handles to the nodes of an [`OfflineAudioContext`](crate::OfflineAudioContext).

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ChannelConfig;
use crate::context::ContextInner;
use crate::error::{AudioError, Result};
use crate::graph::{NodeId, NodeSnapshot};
use crate::native::EndedCallback;
use crate::param::AudioParam;

/// A node of an offline context.
///
/// Handles are cheap to clone; every clone refers to the same node. All
/// methods take `&self` and may be called from any thread.
#[derive(Clone)]
pub struct AudioNode {
    context: Arc<ContextInner>,
    id: NodeId,
}

impl fmt::Debug for AudioNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioNode")
            .field("id", &self.id)
            .field("kind", &self.context.graph().lock().node(self.id).kind.name())
            .finish()
    }
}

/// Two handles are equal when they refer to the same node of the same context.
impl PartialEq for AudioNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.context, &other.context)
    }
}

impl Eq for AudioNode {}

fn check_time(what: &str, when: f64) -> Result<()> {
    if !when.is_finite() || when < 0.0 {
        return Err(AudioError::not_supported(format!(
            "{} time {} must be finite and non-negative",
            what, when
        )));
    }
    Ok(())
}

impl AudioNode {
    pub(crate) fn new(context: Arc<ContextInner>, id: NodeId) -> Self {
        Self { context, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn context(&self) -> &Arc<ContextInner> {
        &self.context
    }

    /// Another node of the same context.
    pub(crate) fn sibling(&self, id: NodeId) -> AudioNode {
        AudioNode::new(self.context.clone(), id)
    }

    /// The node's current data, detached from the graph.
    pub(crate) fn snapshot(&self) -> NodeSnapshot {
        self.context.graph().lock().snapshot(self.id)
    }

    fn check_same_context(&self, other: &Arc<ContextInner>) -> Result<()> {
        if !Arc::ptr_eq(&self.context, other) {
            return Err(AudioError::invalid_access("cannot connect nodes of different contexts"));
        }
        Ok(())
    }

    pub fn number_of_inputs(&self) -> usize {
        self.context.graph().lock().node(self.id).kind.number_of_inputs()
    }

    pub fn number_of_outputs(&self) -> usize {
        self.context.graph().lock().node(self.id).kind.number_of_outputs()
    }

    pub fn channel_config(&self) -> ChannelConfig {
        self.context.graph().lock().node(self.id).channel
    }

    /// Connect output 0 to input 0 of `destination`.
    pub fn connect(&self, destination: &AudioNode) -> Result<()> {
        self.connect_with(destination, 0, 0)
    }

    /// Connect `output` of this node to `input` of `destination`.
    ///
    /// Connecting the same ports twice has no further effect.
    pub fn connect_with(&self, destination: &AudioNode, output: usize, input: usize) -> Result<()> {
        self.check_same_context(&destination.context)?;
        self.context
            .graph()
            .lock()
            .connect(self.id, output, destination.id, input)
    }

    /// Connect output 0 to `param`, adding this node's signal to its value.
    pub fn connect_param(&self, param: &AudioParam) -> Result<()> {
        self.connect_param_with(param, 0)
    }

    pub fn connect_param_with(&self, param: &AudioParam, output: usize) -> Result<()> {
        self.check_same_context(param.context())?;
        self.context
            .graph()
            .lock()
            .connect_param(self.id, output, param.id())
    }

    /// Remove the outgoing connections of `output`, or of every output.
    pub fn disconnect(&self, output: Option<usize>) -> Result<()> {
        self.context.graph().lock().disconnect(self.id, output)
    }

    /// The param called `name`, if the node has one.
    pub fn param(&self, name: &str) -> Option<AudioParam> {
        let id = self.context.graph().lock().find_param(self.id, name)?;
        Some(AudioParam::new(self.context.clone(), id))
    }

    /// Every param of the node, in declaration order.
    pub fn params(&self) -> Vec<AudioParam> {
        let ids = self.context.graph().lock().node(self.id).params.clone();
        ids.into_iter()
            .map(|id| AudioParam::new(self.context.clone(), id))
            .collect()
    }

    fn check_source(&self, operation: &str) -> Result<()> {
        let graph = self.context.graph().lock();
        let kind = &graph.node(self.id).kind;
        if !kind.is_scheduled_source() {
            return Err(AudioError::invalid_state(format!(
                "cannot {} a {} node",
                operation,
                kind.name()
            )));
        }
        Ok(())
    }

    /// Start a source at `when` seconds. A source starts at most once.
    pub fn start(&self, when: f64) -> Result<()> {
        self.check_source("start")?;
        check_time("start", when)?;
        let mut graph = self.context.graph().lock();
        let schedule = &mut graph.node_mut(self.id).schedule;
        if schedule.start.is_some() {
            return Err(AudioError::invalid_state("the source has already been started"));
        }
        schedule.start = Some(when);
        Ok(())
    }

    /// Stop a started source at `when` seconds.
    ///
    /// May be called repeatedly; the latest call decides when the source stops.
    pub fn stop(&self, when: f64) -> Result<()> {
        self.check_source("stop")?;
        check_time("stop", when)?;
        let mut graph = self.context.graph().lock();
        let schedule = &mut graph.node_mut(self.id).schedule;
        if schedule.start.is_none() {
            return Err(AudioError::invalid_state("the source has not been started"));
        }
        schedule.stops.push(when);
        Ok(())
    }

    /// Call `callback` once the rendered source has ended.
    pub fn set_onended<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.check_source("observe the end of")?;
        let callback: EndedCallback = Box::new(callback);
        self.context.graph().lock().node_mut(self.id).schedule.onended = Some(Arc::new(Mutex::new(callback)));
        Ok(())
    }
}
