//! Offline rendering: turning the abstract graph into a native one.
//!
//! Every node of an [`OfflineAudioContext`](crate::OfflineAudioContext) has an
//! [`AudioNodeRenderer`], kept in the context's [`RendererRegistry`]. Rendering
//! the destination renders everything upstream of it through
//! [`render_node`], which constructs each native node at most once per native
//! context.

pub mod memo;
mod param;
pub mod registry;
pub mod renderers;
mod start_rendering;
mod traversal;

pub use memo::RenderMemo;
pub use param::render_param;
pub use registry::RendererRegistry;
pub use start_rendering::start_rendering;
pub use traversal::{render_node, RenderPath};

pub(crate) use start_rendering::patch_buffer;
pub(crate) use traversal::replay_schedule;

use crate::capabilities::CapabilityCache;
use crate::error::Result;
use crate::graph::NodeSnapshot;
use crate::native::{BoxFuture, NativeContextRef, NativeNode};
use crate::node::AudioNode;

/// Renders one abstract node into a native context.
pub trait AudioNodeRenderer: Send + Sync {
    /// The memo keyed by native context.
    fn memo(&self) -> &RenderMemo;

    /// Construct the native (or faked) primitive for `node`, without wiring
    /// any of its inputs or params.
    fn create_native<'a>(
        &'a self,
        node: &'a NodeSnapshot,
        native: &'a NativeContextRef,
        cache: &'a CapabilityCache,
    ) -> BoxFuture<'a, Result<NativeNode>>;

    /// Render `node` and everything upstream of it into `native`.
    fn render<'a>(&'a self, node: &'a AudioNode, native: &'a NativeContextRef) -> BoxFuture<'a, Result<NativeNode>> {
        self.render_on_path(node, native, None)
    }

    /// Render `node` as an input of the nodes on `path`.
    fn render_on_path<'a>(
        &'a self,
        node: &'a AudioNode,
        native: &'a NativeContextRef,
        path: Option<&'a RenderPath<'a>>,
    ) -> BoxFuture<'a, Result<NativeNode>> {
        render_node(self, node, native, path)
    }
}
