//! Memoized feature probes.
//!
//! Native hosts differ in which primitives they offer and which defects they
//! carry. Whether a host supports something is determined once by a probe and
//! cached under a [`CapabilityKey`]. The cache is never invalidated.

pub mod probes;

use std::future::Future;
use std::sync::{Arc, LazyLock};

use hashbrown::HashMap;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{AudioError, Result};
use crate::native::ContextId;

/// A host feature whose presence is probed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    ConstantSource,
    IirFilter,
    AudioWorklet,
    /// `stop()` may be called again on a stopped source
    StopConsecutiveCalls,
    /// Buffer copy methods accept an offset equal to the buffer length
    CopyChannelMethodsSubarray,
}

/// Cache key: a capability, optionally scoped to one native context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CapabilityKey {
    pub capability: Capability,
    /// `None` when the result holds for the whole process
    pub context: Option<ContextId>,
}

impl CapabilityKey {
    /// A key scoped to one native context.
    pub fn new(capability: Capability, context: ContextId) -> Self {
        Self {
            capability,
            context: Some(context),
        }
    }

    /// A process-wide key.
    pub fn global(capability: Capability) -> Self {
        Self {
            capability,
            context: None,
        }
    }
}

#[derive(Default)]
struct Slot {
    // serializes synchronous probes of one key
    sync_guard: Mutex<()>,
    value: OnceCell<bool>,
}

/// Process-wide-capable store of probe results.
#[derive(Default)]
pub struct CapabilityCache {
    slots: Mutex<HashMap<CapabilityKey, Arc<Slot>>>,
}

static GLOBAL: LazyLock<Arc<CapabilityCache>> = LazyLock::new(|| Arc::new(CapabilityCache::new()));

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every context that does not bring its own.
    pub fn global() -> Arc<CapabilityCache> {
        GLOBAL.clone()
    }

    fn slot(&self, key: CapabilityKey) -> Arc<Slot> {
        self.slots.lock().entry(key).or_default().clone()
    }

    /// The cached result for `key`, if a probe has completed.
    pub fn get(&self, key: CapabilityKey) -> Option<bool> {
        self.slots.lock().get(&key).and_then(|slot| slot.value.get().copied())
    }

    /// Return the cached result for `key`, running `test` on the first call.
    ///
    /// Only successful results are cached; an error propagates and the next
    /// call probes again.
    pub fn cache_test_result<F>(&self, key: CapabilityKey, test: F) -> Result<bool>
    where
        F: FnOnce() -> Result<bool>,
    {
        let slot = self.slot(key);
        if let Some(value) = slot.value.get() {
            return Ok(*value);
        }
        let _guard = slot.sync_guard.lock();
        if let Some(value) = slot.value.get() {
            return Ok(*value);
        }
        let value = test()?;
        debug!(?key, value, "probed capability");
        // an async probe of the same key may have finished first
        let _ = slot.value.set(value);
        Ok(slot.value.get().copied().unwrap_or(value))
    }

    /// Like [`cache_test_result`](Self::cache_test_result) for asynchronous
    /// probes. Concurrent callers await the same in-flight probe.
    pub async fn cache_test_result_async<F, Fut>(&self, key: CapabilityKey, test: F) -> Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let slot = self.slot(key);
        let value = slot
            .value
            .get_or_try_init(|| async move {
                let value = test().await?;
                debug!(?key, value, "probed capability");
                Ok::<bool, AudioError>(value)
            })
            .await?;
        Ok(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn sync_probe_runs_once() {
        let cache = CapabilityCache::new();
        let key = CapabilityKey::global(Capability::IirFilter);
        let runs = AtomicUsize::new(0);
        for _ in 0..3 {
            let value = cache
                .cache_test_result(key, || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(true)
                })
                .unwrap();
            assert!(value);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(key), Some(true));
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = CapabilityCache::new();
        let key = CapabilityKey::global(Capability::ConstantSource);
        let err = cache.cache_test_result(key, || Err(AudioError::invalid_state("probe failed")));
        assert!(err.is_err());
        assert_eq!(cache.get(key), None);
        assert_eq!(cache.cache_test_result(key, || Ok(false)), Ok(false));
    }

    #[tokio::test]
    async fn concurrent_async_probes_share_one_run() {
        let cache = Arc::new(CapabilityCache::new());
        let key = CapabilityKey::global(Capability::AudioWorklet);
        let runs = Arc::new(AtomicUsize::new(0));

        let probe = |cache: Arc<CapabilityCache>, runs: Arc<AtomicUsize>| async move {
            cache
                .cache_test_result_async(key, || async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok(true)
                })
                .await
        };
        let (a, b) = tokio::join!(
            probe(cache.clone(), runs.clone()),
            probe(cache.clone(), runs.clone())
        );
        assert_eq!((a, b), (Ok(true), Ok(true)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sync_probe_runs_once_across_threads() {
        let cache = Arc::new(CapabilityCache::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let key = CapabilityKey::global(Capability::StopConsecutiveCalls);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (cache, runs) = (cache.clone(), runs.clone());
                std::thread::spawn(move || {
                    cache.cache_test_result(key, || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        Ok(false)
                    })
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(false));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
