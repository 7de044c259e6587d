//! Parameter automation events and their evaluation.
//!
//! Abstract params record events into a [`Timeline`]; the param renderer replays
//! the timeline onto native params, and the reference host evaluates the same
//! timeline per sample.

use std::sync::Arc;

use crate::error::{AudioError, Result};

/// A scheduled change of a parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum AutomationEvent {
    /// Jump to `value` at `time`
    SetValue { value: f32, time: f64 },
    /// Ramp linearly from the previous event to `value` at `end_time`
    LinearRamp { value: f32, end_time: f64 },
    /// Ramp exponentially from the previous event to `value` at `end_time`
    ExponentialRamp { value: f32, end_time: f64 },
    /// Approach `target` exponentially starting at `start_time`
    SetTarget {
        target: f32,
        start_time: f64,
        time_constant: f64,
    },
    /// Follow `values`, linearly interpolated, over `duration` seconds
    SetValueCurve {
        values: Arc<[f32]>,
        start_time: f64,
        duration: f64,
    },
    /// Remove every event at or after `time`
    Cancel { time: f64 },
}

impl AutomationEvent {
    /// The time this event is ordered by.
    pub fn time(&self) -> f64 {
        match self {
            AutomationEvent::SetValue { time, .. } => *time,
            AutomationEvent::LinearRamp { end_time, .. } => *end_time,
            AutomationEvent::ExponentialRamp { end_time, .. } => *end_time,
            AutomationEvent::SetTarget { start_time, .. } => *start_time,
            AutomationEvent::SetValueCurve { start_time, .. } => *start_time,
            AutomationEvent::Cancel { time } => *time,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let time = self.time();
        if !time.is_finite() || time < 0.0 {
            return Err(AudioError::not_supported(format!(
                "automation time {} must be finite and non-negative",
                time
            )));
        }
        match self {
            AutomationEvent::ExponentialRamp { value, .. } if *value == 0.0 => Err(
                AudioError::not_supported("exponential ramps cannot target zero"),
            ),
            AutomationEvent::SetTarget { time_constant, .. } if *time_constant < 0.0 => Err(
                AudioError::not_supported("time constant must be non-negative"),
            ),
            AutomationEvent::SetValueCurve { values, duration, .. } => {
                if values.len() < 2 {
                    Err(AudioError::invalid_state("value curves need at least two values"))
                } else if !(*duration > 0.0) || !duration.is_finite() {
                    Err(AudioError::not_supported("curve duration must be positive"))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

/// The curve a parameter follows after the most recent event.
#[derive(Clone, Debug)]
enum Segment {
    Hold(f64),
    Target {
        from: f64,
        target: f64,
        start: f64,
        time_constant: f64,
    },
    Curve {
        values: Arc<[f32]>,
        start: f64,
        duration: f64,
    },
}

impl Segment {
    fn eval(&self, t: f64) -> f64 {
        match self {
            Segment::Hold(v) => *v,
            Segment::Target {
                from,
                target,
                start,
                time_constant,
            } => {
                if *time_constant == 0.0 {
                    *target
                } else {
                    target + (from - target) * (-(t - start) / time_constant).exp()
                }
            }
            Segment::Curve {
                values,
                start,
                duration,
            } => {
                let last = values.len() - 1;
                if t >= start + duration {
                    return values[last] as f64;
                }
                let pos = ((t - start) / duration).max(0.0) * last as f64;
                let k = (pos.floor() as usize).min(last);
                if k == last {
                    return values[last] as f64;
                }
                let frac = pos - k as f64;
                values[k] as f64 + (values[k + 1] as f64 - values[k] as f64) * frac
            }
        }
    }
}

/// Chronologically ordered automation events of one parameter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    events: Vec<AutomationEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event, keeping events with equal times in insertion order.
    ///
    /// `Cancel` is applied immediately and never stored.
    pub fn insert(&mut self, event: AutomationEvent) -> Result<()> {
        event.validate()?;
        if let AutomationEvent::Cancel { time } = event {
            self.events.retain(|e| e.time() < time);
            return Ok(());
        }
        let time = event.time();
        let pos = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(pos, event);
        Ok(())
    }

    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The automated value at time `t`, starting from the intrinsic `value`.
    pub fn value_at(&self, value: f32, t: f64) -> f32 {
        let mut segment = Segment::Hold(value as f64);
        let mut prev_time = 0.0;

        for event in &self.events {
            match event {
                AutomationEvent::SetValue { value, time } => {
                    if t < *time {
                        return segment.eval(t) as f32;
                    }
                    segment = Segment::Hold(*value as f64);
                    prev_time = *time;
                }
                AutomationEvent::LinearRamp { value, end_time } => {
                    let v0 = segment.eval(prev_time);
                    let v1 = *value as f64;
                    if t < *end_time {
                        if *end_time <= prev_time {
                            return v1 as f32;
                        }
                        let frac = (t - prev_time) / (end_time - prev_time);
                        return (v0 + (v1 - v0) * frac) as f32;
                    }
                    segment = Segment::Hold(v1);
                    prev_time = *end_time;
                }
                AutomationEvent::ExponentialRamp { value, end_time } => {
                    let v0 = segment.eval(prev_time);
                    let v1 = *value as f64;
                    if t < *end_time {
                        if v0 == 0.0 || v0.signum() != v1.signum() {
                            return v0 as f32;
                        }
                        if *end_time <= prev_time {
                            return v1 as f32;
                        }
                        let frac = (t - prev_time) / (end_time - prev_time);
                        return (v0 * (v1 / v0).powf(frac)) as f32;
                    }
                    segment = Segment::Hold(v1);
                    prev_time = *end_time;
                }
                AutomationEvent::SetTarget {
                    target,
                    start_time,
                    time_constant,
                } => {
                    if t < *start_time {
                        return segment.eval(t) as f32;
                    }
                    segment = Segment::Target {
                        from: segment.eval(*start_time),
                        target: *target as f64,
                        start: *start_time,
                        time_constant: *time_constant,
                    };
                    prev_time = *start_time;
                }
                AutomationEvent::SetValueCurve {
                    values,
                    start_time,
                    duration,
                } => {
                    if t < *start_time {
                        return segment.eval(t) as f32;
                    }
                    segment = Segment::Curve {
                        values: values.clone(),
                        start: *start_time,
                        duration: *duration,
                    };
                    prev_time = start_time + duration;
                }
                AutomationEvent::Cancel { .. } => {}
            }
        }

        segment.eval(t) as f32
    }

    /// Fill `out` with values for consecutive frames starting at `start_time`.
    pub fn fill(&self, value: f32, start_time: f64, sample_rate: f32, out: &mut [f32]) {
        if self.events.is_empty() {
            out.iter_mut().for_each(|s| *s = value);
            return;
        }
        let period = 1.0 / sample_rate as f64;
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = self.value_at(value, start_time + i as f64 * period);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn holds_intrinsic_value_without_events() {
        let timeline = Timeline::new();
        assert_eq!(timeline.value_at(0.7, 3.0), 0.7);
    }

    #[test]
    fn set_value_takes_effect_at_its_time() {
        let mut timeline = Timeline::new();
        timeline.insert(AutomationEvent::SetValue { value: 2.0, time: 1.0 }).unwrap();
        assert_eq!(timeline.value_at(1.0, 0.5), 1.0);
        assert_eq!(timeline.value_at(1.0, 1.0), 2.0);
    }

    #[test]
    fn linear_ramp_interpolates_from_previous_event() {
        let mut timeline = Timeline::new();
        timeline.insert(AutomationEvent::SetValue { value: 0.0, time: 0.0 }).unwrap();
        timeline.insert(AutomationEvent::LinearRamp { value: 1.0, end_time: 2.0 }).unwrap();
        assert_relative_eq!(timeline.value_at(5.0, 1.0), 0.5);
        assert_relative_eq!(timeline.value_at(5.0, 3.0), 1.0);
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut timeline = Timeline::new();
        timeline.insert(AutomationEvent::SetValue { value: 1.0, time: 0.0 }).unwrap();
        timeline.insert(AutomationEvent::ExponentialRamp { value: 4.0, end_time: 2.0 }).unwrap();
        assert_relative_eq!(timeline.value_at(1.0, 1.0), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn set_target_approaches_target() {
        let mut timeline = Timeline::new();
        timeline
            .insert(AutomationEvent::SetTarget { target: 0.0, start_time: 0.0, time_constant: 1.0 })
            .unwrap();
        assert_relative_eq!(timeline.value_at(1.0, 1.0), (-1.0f32).exp(), epsilon = 1e-6);
    }

    #[test]
    fn value_curve_interpolates_and_holds_last_value() {
        let mut timeline = Timeline::new();
        let values: Arc<[f32]> = Arc::from(vec![0.0, 1.0, 0.0]);
        timeline
            .insert(AutomationEvent::SetValueCurve { values, start_time: 1.0, duration: 2.0 })
            .unwrap();
        assert_relative_eq!(timeline.value_at(0.3, 0.5), 0.3);
        assert_relative_eq!(timeline.value_at(0.3, 1.5), 0.5);
        assert_relative_eq!(timeline.value_at(0.3, 2.0), 1.0);
        assert_relative_eq!(timeline.value_at(0.3, 4.0), 0.0);
    }

    #[test]
    fn cancel_removes_later_events() {
        let mut timeline = Timeline::new();
        timeline.insert(AutomationEvent::SetValue { value: 2.0, time: 1.0 }).unwrap();
        timeline.insert(AutomationEvent::SetValue { value: 3.0, time: 2.0 }).unwrap();
        timeline.insert(AutomationEvent::Cancel { time: 1.5 }).unwrap();
        assert_eq!(timeline.events().len(), 1);
        assert_eq!(timeline.value_at(0.0, 5.0), 2.0);
    }

    #[test]
    fn invalid_events_are_rejected() {
        let mut timeline = Timeline::new();
        assert!(timeline.insert(AutomationEvent::SetValue { value: 1.0, time: -1.0 }).is_err());
        assert!(timeline
            .insert(AutomationEvent::ExponentialRamp { value: 0.0, end_time: 1.0 })
            .is_err());
    }
}
