use std::sync::Arc;

use tracing::debug;

use super::memo::{self, Claim, MemoSlot};
use super::{render_param, AudioNodeRenderer};
use crate::error::{AudioError, Result};
use crate::graph::{NodeId, NodeSnapshot, SourceSchedule};
use crate::native::{BoxFuture, NativeContextRef, NativeNode, NativeScheduledSource};
use crate::node::AudioNode;

/// The nodes whose renders are in progress above the node being rendered,
/// innermost first.
///
/// A node found on its own path was reached through a feedback loop and
/// connects to the node its owner already constructed.
#[derive(Clone, Copy)]
pub struct RenderPath<'a> {
    node: &'a AudioNode,
    parent: Option<&'a RenderPath<'a>>,
}

impl<'a> RenderPath<'a> {
    pub fn contains(&self, node: &AudioNode) -> bool {
        let mut step = Some(self);
        while let Some(current) = step {
            if current.node == node {
                return true;
            }
            step = current.parent;
        }
        false
    }
}

/// Render `node` with `renderer`, constructing its native node at most once
/// per native context.
///
/// The memo entry is claimed before the returned future is first polled.
/// The owner constructs the native node, publishes it, renders and connects
/// every input in connection order and finally renders the node's params.
/// Other callers get the owner's final result, except a caller whose `path`
/// already contains `node`, which gets the published node.
pub fn render_node<'a, R>(
    renderer: &'a R,
    node: &'a AudioNode,
    native: &'a NativeContextRef,
    path: Option<&'a RenderPath<'a>>,
) -> BoxFuture<'a, Result<NativeNode>>
where
    R: AudioNodeRenderer + ?Sized,
{
    let claim = renderer.memo().claim(native.id());
    Box::pin(async move {
        let slot = match claim {
            Claim::Owner(slot) => slot,
            Claim::Waiter(receiver) if path.is_some_and(|path| path.contains(node)) => {
                debug!(node = ?node.id(), context = ?native.id(), "memo hit through feedback");
                return memo::wait_constructed(receiver).await;
            }
            Claim::Waiter(receiver) => {
                debug!(node = ?node.id(), context = ?native.id(), "memo hit");
                return memo::wait(receiver).await;
            }
        };
        let here = RenderPath { node, parent: path };
        let result = construct(renderer, node, native, &slot, &here).await;
        slot.finish(result)
    })
}

async fn construct<R>(
    renderer: &R,
    node: &AudioNode,
    native: &NativeContextRef,
    slot: &MemoSlot,
    path: &RenderPath<'_>,
) -> Result<NativeNode>
where
    R: AudioNodeRenderer + ?Sized,
{
    let snapshot = node.snapshot();
    let cache = node.context().cache().clone();
    let native_node = renderer.create_native(&snapshot, native, &cache).await?;
    debug!(
        node = ?snapshot.id,
        kind = snapshot.kind.name(),
        context = ?native.id(),
        "constructed native node"
    );
    slot.publish(&native_node);

    for connection in &snapshot.inputs {
        let upstream = render_upstream(node, connection.source, native, path).await?;
        upstream.connect(connection.output, native_node.as_ref(), connection.input)?;
    }

    for param in &snapshot.params {
        let native_param = native_node.param(&param.descriptor.name).ok_or_else(|| {
            AudioError::invalid_state(format!(
                "native {} has no param {:?}",
                snapshot.kind.name(),
                param.descriptor.name
            ))
        })?;
        render_param(param, native_param.as_ref())?;
        for connection in &param.inputs {
            let upstream = render_upstream(node, connection.source, native, path).await?;
            upstream.connect_param(connection.output, native_param.as_ref())?;
        }
    }
    Ok(native_node)
}

async fn render_upstream(
    node: &AudioNode,
    source: NodeId,
    native: &NativeContextRef,
    path: &RenderPath<'_>,
) -> Result<NativeNode> {
    let source = node.sibling(source);
    let renderer = node
        .context()
        .registry()
        .get(&source)
        .ok_or_else(|| AudioError::invalid_state(format!("no renderer registered for {:?}", source.id())))?;
    renderer.render_on_path(&source, native, Some(path)).await
}

/// Replay the recorded `start` and the latest `stop` of a source onto its
/// native node.
pub(crate) fn replay_schedule(source: &dyn NativeScheduledSource, schedule: &SourceSchedule) -> Result<()> {
    if let Some(callback) = &schedule.onended {
        let callback = Arc::clone(callback);
        source.set_onended(Some(Box::new(move || {
            let mut ended = callback.lock();
            (*ended)();
        })));
    }
    if let Some(start) = schedule.start {
        source.start(start)?;
    }
    if let Some(&stop) = schedule.stops.last() {
        source.stop(stop)?;
    }
    Ok(())
}

/// The error of a renderer handed a node of another kind.
pub(crate) fn kind_mismatch(expected: &str, node: &NodeSnapshot) -> AudioError {
    AudioError::invalid_state(format!(
        "{} renderer cannot render a {} node",
        expected,
        node.kind.name()
    ))
}
