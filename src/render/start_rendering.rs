use tracing::{info, warn};

use crate::buffer::{AudioBuffer, CopyStrategy};
use crate::capabilities::{probes, Capability, CapabilityCache, CapabilityKey};
use crate::error::{AudioError, Result};
use crate::native::{NativeBuffer, NativeContextRef, NativeOfflineContext};
use crate::node::AudioNode;

/// Render everything upstream of `destination` into `native`, run the host
/// render and hand back the result with uniform copy methods.
pub async fn start_rendering(destination: &AudioNode, native: &NativeContextRef) -> Result<AudioBuffer> {
    let context = destination.context();
    info!(
        context = ?native.id(),
        length = native.length(),
        sample_rate = native.sample_rate(),
        "rendering offline graph"
    );
    let renderer = context
        .registry()
        .get(destination)
        .ok_or_else(|| AudioError::invalid_state("the destination has no renderer"))?;
    renderer.render(destination, native).await?;

    let rendered = native.start_rendering().await?;
    let buffer = patch_buffer(rendered, &**native, context.cache())?;
    info!(
        context = ?native.id(),
        frames = buffer.length(),
        channels = buffer.number_of_channels(),
        "finished offline render"
    );
    Ok(buffer)
}

/// Wrap a host buffer, picking the copy strategy its host calls for.
pub(crate) fn patch_buffer(
    buffer: NativeBuffer,
    native: &dyn NativeOfflineContext,
    cache: &CapabilityCache,
) -> Result<AudioBuffer> {
    if buffer.channel_copy().is_none() {
        warn!(context = ?native.id(), "buffer lacks copy methods, installing full polyfill");
        return Ok(AudioBuffer::new(buffer, CopyStrategy::Full));
    }
    let key = CapabilityKey::new(Capability::CopyChannelMethodsSubarray, native.id());
    let supported = cache.cache_test_result(key, || probes::test_copy_channel_methods_subarray_support(native))?;
    if supported {
        return Ok(AudioBuffer::new(buffer, CopyStrategy::Native));
    }
    warn!(context = ?native.id(), "buffer copy methods reject offsets past the length, installing narrow polyfill");
    Ok(AudioBuffer::new(buffer, CopyStrategy::Narrow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CopyChannelSupport, HostProfile, SoftwareContext};
    use crate::OfflineContextOptions;

    fn strategy(support: CopyChannelSupport) -> CopyStrategy {
        let profile = HostProfile::complete().with_copy_channel(support);
        let host = SoftwareContext::with_profile(OfflineContextOptions::default(), profile).unwrap();
        let cache = CapabilityCache::new();
        let buffer = host.create_buffer(1, 4, 44_100.0).unwrap();
        patch_buffer(buffer, &host, &cache).unwrap().copy_strategy()
    }

    #[test]
    fn copy_strategy_follows_the_host() {
        assert_eq!(strategy(CopyChannelSupport::Full), CopyStrategy::Native);
        assert_eq!(strategy(CopyChannelSupport::NoOffsetPastLength), CopyStrategy::Narrow);
        assert_eq!(strategy(CopyChannelSupport::Missing), CopyStrategy::Full);
    }
}
