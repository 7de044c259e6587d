//! Per-renderer, per-context single-flight memo.
//!
//! The first render request for a native context claims the entry and becomes
//! its owner; every later request subscribes to the entry and waits for the
//! owner's result. An entry moves through
//!
//! ```text
//! Pending -> Constructed(node) -> Done(node)
//!        \                    \
//!         `-------------------`-> Failed(error)
//! ```
//!
//! Waiters normally wait for `Done` or `Failed`. Only a node reached again
//! through a feedback loop, while its own owner is still wiring inputs, is
//! satisfied by `Constructed`; see [`wait_constructed`].

use std::sync::Arc;

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{AudioError, Result};
use crate::native::{ContextId, NativeNode};

#[derive(Clone)]
pub enum MemoState {
    Pending,
    /// The native node exists; its inputs may not be wired yet
    Constructed(NativeNode),
    Done(NativeNode),
    Failed(AudioError),
}

impl MemoState {
    fn is_settled(&self) -> bool {
        matches!(self, MemoState::Done(_) | MemoState::Failed(_))
    }

    fn resolved(&self) -> Option<Result<NativeNode>> {
        match self {
            MemoState::Pending => None,
            MemoState::Constructed(node) | MemoState::Done(node) => Some(Ok(node.clone())),
            MemoState::Failed(err) => Some(Err(err.clone())),
        }
    }
}

/// Outcome of [`RenderMemo::claim`].
pub enum Claim {
    /// The caller renders the node and must resolve the slot
    Owner(MemoSlot),
    /// Someone else does; wait with [`wait`]
    Waiter(watch::Receiver<MemoState>),
}

#[derive(Default)]
pub struct RenderMemo {
    entries: Mutex<HashMap<ContextId, Arc<watch::Sender<MemoState>>>>,
}

impl RenderMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the entry of `context`, or subscribe to it if it exists.
    ///
    /// Synchronous, so callers claim before their first await.
    pub fn claim(&self, context: ContextId) -> Claim {
        match self.entries.lock().entry(context) {
            Entry::Occupied(entry) => Claim::Waiter(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (sender, _) = watch::channel(MemoState::Pending);
                let sender = entry.insert(Arc::new(sender)).clone();
                Claim::Owner(MemoSlot {
                    sender,
                    finished: false,
                })
            }
        }
    }

    /// The current state for `context`, if the entry exists.
    pub fn state(&self, context: ContextId) -> Option<MemoState> {
        self.entries
            .lock()
            .get(&context)
            .map(|sender| sender.borrow().clone())
    }
}

/// Wait until the owner of an entry has finished, successfully or not.
pub async fn wait(receiver: watch::Receiver<MemoState>) -> Result<NativeNode> {
    wait_until(receiver, MemoState::is_settled).await
}

/// Wait until the owner of an entry has constructed its node or failed.
///
/// Only for callers rendering on behalf of that owner: the node may still be
/// missing inputs and params, and its render may yet fail.
pub async fn wait_constructed(receiver: watch::Receiver<MemoState>) -> Result<NativeNode> {
    wait_until(receiver, |state| !matches!(state, MemoState::Pending)).await
}

async fn wait_until(
    mut receiver: watch::Receiver<MemoState>,
    ready: impl FnMut(&MemoState) -> bool,
) -> Result<NativeNode> {
    let resolved = match receiver.wait_for(ready).await {
        Ok(state) => state.resolved(),
        Err(_) => None,
    };
    resolved.unwrap_or_else(|| Err(AudioError::invalid_state("the render of this node was abandoned")))
}

/// Write access to a claimed entry.
///
/// Dropping an unfinished slot fails the entry, so waiters never hang on an
/// abandoned render.
pub struct MemoSlot {
    sender: Arc<watch::Sender<MemoState>>,
    finished: bool,
}

impl MemoSlot {
    /// Make the constructed node visible to waiters before its inputs are wired.
    pub fn publish(&self, node: &NativeNode) {
        self.sender.send_replace(MemoState::Constructed(node.clone()));
    }

    /// Resolve the entry and hand the result back to the owner.
    pub fn finish(mut self, result: Result<NativeNode>) -> Result<NativeNode> {
        let state = match &result {
            Ok(node) => MemoState::Done(node.clone()),
            Err(err) => MemoState::Failed(err.clone()),
        };
        self.sender.send_replace(state);
        self.finished = true;
        result
    }
}

impl Drop for MemoSlot {
    fn drop(&mut self) {
        if !self.finished {
            self.sender.send_replace(MemoState::Failed(AudioError::invalid_state(
                "the render of this node was abandoned",
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::host::SoftwareContext;
    use crate::native::NativeOfflineContext;
    use crate::OfflineContextOptions;

    fn node() -> (ContextId, NativeNode) {
        let host = SoftwareContext::new(OfflineContextOptions::default()).unwrap();
        (host.id(), host.create_gain(ChannelConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn second_claim_waits_for_the_owner() {
        let memo = RenderMemo::new();
        let (context, gain) = node();
        let Claim::Owner(slot) = memo.claim(context) else {
            panic!("first claim must own the entry");
        };
        let Claim::Waiter(receiver) = memo.claim(context) else {
            panic!("second claim must wait");
        };
        let waiter = tokio::spawn(wait(receiver));
        slot.finish(Ok(gain.clone())).unwrap();
        let node = waiter.await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&node, &gain));
    }

    #[tokio::test]
    async fn published_node_satisfies_only_reentrant_waiters() {
        let memo = RenderMemo::new();
        let (context, gain) = node();
        let Claim::Owner(slot) = memo.claim(context) else {
            panic!("first claim must own the entry");
        };
        slot.publish(&gain);
        let Claim::Waiter(receiver) = memo.claim(context) else {
            panic!("second claim must wait");
        };
        assert!(wait_constructed(receiver.clone()).await.is_ok());
        assert!(matches!(memo.state(context), Some(MemoState::Constructed(_))));

        let waiter = tokio::spawn(wait(receiver));
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        let err = AudioError::invalid_access("upstream failed");
        slot.finish(Err(err.clone())).err().unwrap();
        assert_eq!(waiter.await.unwrap().err(), Some(err));
    }

    #[tokio::test]
    async fn failures_are_shared() {
        let memo = RenderMemo::new();
        let (context, _) = node();
        let Claim::Owner(slot) = memo.claim(context) else {
            panic!("first claim must own the entry");
        };
        let err = AudioError::not_supported("nope");
        assert_eq!(slot.finish(Err(err.clone())).err(), Some(err.clone()));
        let Claim::Waiter(receiver) = memo.claim(context) else {
            panic!("failed entries are not retried");
        };
        assert_eq!(wait(receiver).await.err(), Some(err));
    }

    #[tokio::test]
    async fn dropped_owner_fails_waiters() {
        let memo = RenderMemo::new();
        let (context, _) = node();
        let Claim::Owner(slot) = memo.claim(context) else {
            panic!("first claim must own the entry");
        };
        let Claim::Waiter(receiver) = memo.claim(context) else {
            panic!("second claim must wait");
        };
        drop(slot);
        assert!(matches!(wait(receiver).await, Err(AudioError::InvalidState(_))));
    }
}
