//! Handles to automatable node parameters.

use std::fmt;
use std::sync::Arc;

use crate::automation::AutomationEvent;
use crate::context::ContextInner;
use crate::error::{AudioError, Result};
use crate::graph::{NodeId, ParamId};

/// An automatable parameter of an [`AudioNode`](crate::AudioNode).
///
/// The intrinsic [`value`](Self::value) applies from time zero; automation
/// events are recorded here and replayed onto the native param when the
/// context renders. Scheduling methods return `&Self` so calls can be chained.
///
/// ```
/// # use std::sync::Arc;
/// # use einklang::host::SoftwareContext;
/// # use einklang::nodes::Gain;
/// # use einklang::{OfflineAudioContext, OfflineContextOptions};
/// # let context = OfflineAudioContext::new(Arc::new(SoftwareContext::new(OfflineContextOptions::default()).unwrap()));
/// let gain = context.add(Gain::new(1.0)).unwrap();
/// let param = gain.param("gain").unwrap();
/// param
///     .set_value_at_time(0.0, 0.5)
///     .and_then(|p| p.linear_ramp_to_value_at_time(1.0, 1.0))
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AudioParam {
    context: Arc<ContextInner>,
    id: ParamId,
}

impl fmt::Debug for AudioParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.context.graph().lock();
        let param = graph.param(self.id);
        f.debug_struct("AudioParam")
            .field("name", &param.descriptor.name)
            .field("value", &param.value)
            .finish()
    }
}

impl AudioParam {
    pub(crate) fn new(context: Arc<ContextInner>, id: ParamId) -> Self {
        Self { context, id }
    }

    pub(crate) fn id(&self) -> ParamId {
        self.id
    }

    pub(crate) fn context(&self) -> &Arc<ContextInner> {
        &self.context
    }

    /// The node owning this param.
    pub fn owner(&self) -> NodeId {
        self.context.graph().lock().param(self.id).owner
    }

    pub fn name(&self) -> String {
        self.context.graph().lock().param(self.id).descriptor.name.clone()
    }

    pub fn default_value(&self) -> f32 {
        self.context.graph().lock().param(self.id).descriptor.default_value
    }

    pub fn min_value(&self) -> f32 {
        self.context.graph().lock().param(self.id).descriptor.min_value
    }

    pub fn max_value(&self) -> f32 {
        self.context.graph().lock().param(self.id).descriptor.max_value
    }

    /// The intrinsic value.
    pub fn value(&self) -> f32 {
        self.context.graph().lock().param(self.id).value
    }

    pub fn set_value(&self, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(AudioError::not_supported(format!("param value {} is not finite", value)));
        }
        self.context.graph().lock().param_mut(self.id).value = value;
        Ok(())
    }

    /// The recorded automation, in chronological order.
    pub fn events(&self) -> Vec<AutomationEvent> {
        self.context.graph().lock().param(self.id).timeline.events().to_vec()
    }

    fn schedule(&self, event: AutomationEvent) -> Result<&Self> {
        self.context
            .graph()
            .lock()
            .param_mut(self.id)
            .timeline
            .insert(event)?;
        Ok(self)
    }

    pub fn set_value_at_time(&self, value: f32, time: f64) -> Result<&Self> {
        self.schedule(AutomationEvent::SetValue { value, time })
    }

    pub fn linear_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<&Self> {
        self.schedule(AutomationEvent::LinearRamp { value, end_time })
    }

    /// Ramp exponentially; `value` must not be zero.
    pub fn exponential_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<&Self> {
        self.schedule(AutomationEvent::ExponentialRamp { value, end_time })
    }

    pub fn set_target_at_time(&self, target: f32, start_time: f64, time_constant: f64) -> Result<&Self> {
        self.schedule(AutomationEvent::SetTarget {
            target,
            start_time,
            time_constant,
        })
    }

    /// Follow `values` over `duration` seconds; needs at least two values.
    pub fn set_value_curve_at_time(&self, values: &[f32], start_time: f64, duration: f64) -> Result<&Self> {
        self.schedule(AutomationEvent::SetValueCurve {
            values: values.into(),
            start_time,
            duration,
        })
    }

    /// Drop every event at or after `time`.
    pub fn cancel_scheduled_values(&self, time: f64) -> Result<&Self> {
        self.schedule(AutomationEvent::Cancel { time })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::automation::AutomationEvent;
    use crate::error::AudioError;
    use crate::host::SoftwareContext;
    use crate::nodes::ConstantSource;
    use crate::{OfflineAudioContext, OfflineContextOptions};

    fn offset() -> super::AudioParam {
        let native = SoftwareContext::new(OfflineContextOptions::default()).unwrap();
        let context = OfflineAudioContext::new(Arc::new(native));
        context.add(ConstantSource::new(0.5)).unwrap().param("offset").unwrap()
    }

    #[test]
    fn events_are_kept_in_time_order() {
        let param = offset();
        param
            .linear_ramp_to_value_at_time(1.0, 2.0)
            .and_then(|p| p.set_value_at_time(0.0, 1.0))
            .unwrap();
        assert_eq!(
            param.events(),
            [
                AutomationEvent::SetValue { value: 0.0, time: 1.0 },
                AutomationEvent::LinearRamp {
                    value: 1.0,
                    end_time: 2.0
                },
            ]
        );
        param.cancel_scheduled_values(1.5).unwrap();
        assert_eq!(param.events().len(), 1);
    }

    #[test]
    fn invalid_events_are_rejected() {
        let param = offset();
        assert!(matches!(
            param.exponential_ramp_to_value_at_time(0.0, 1.0),
            Err(AudioError::NotSupported(_))
        ));
        assert!(matches!(
            param.set_value_curve_at_time(&[1.0], 0.0, 1.0),
            Err(AudioError::InvalidState(_))
        ));
        assert!(matches!(param.set_value(f32::NAN), Err(AudioError::NotSupported(_))));
        assert!(param.events().is_empty());
    }

    #[test]
    fn descriptor_is_exposed() {
        let param = offset();
        assert_eq!(param.name(), "offset");
        assert_eq!(param.value(), 0.5);
        param.set_value(0.75).unwrap();
        assert_eq!(param.value(), 0.75);
    }
}
