use tracing::trace;

use crate::error::Result;
use crate::graph::ParamData;
use crate::native::NativeAudioParam;

/// Apply the intrinsic value of `param`, then replay its automation in
/// chronological order.
pub fn render_param(param: &ParamData, native: &dyn NativeAudioParam) -> Result<()> {
    native.set_value(param.value)?;
    for event in param.timeline.events() {
        native.schedule(event.clone())?;
    }
    trace!(
        name = %param.descriptor.name,
        value = param.value,
        events = param.timeline.events().len(),
        "rendered param"
    );
    Ok(())
}
