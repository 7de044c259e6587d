//! Processors of the software host's primitives.

mod biquad;
mod buffer_source;
mod channels;
mod constant_source;
mod delay;
mod gain;
mod iir;
mod oscillator;
mod script;
mod worklet;

pub(crate) use biquad::BiquadFilter;
pub(crate) use buffer_source::BufferSource;
pub(crate) use channels::{ChannelMerger, ChannelSplitter, Destination};
pub(crate) use constant_source::ConstantSource;
pub(crate) use delay::Delay;
pub(crate) use gain::Gain;
pub(crate) use iir::{IirCoefficients, IirFilter};
pub(crate) use oscillator::Oscillator;
pub(crate) use script::ScriptProcessor;
pub(crate) use worklet::WorkletProcessor;

use crate::native::EndedCallback;

/// Control messages of scheduled sources.
pub(crate) enum SourceMessage {
    Start(f64),
    Stop(f64),
    OnEnded(Option<EndedCallback>),
}

/// Start/stop bookkeeping shared by every scheduled source.
#[derive(Default)]
pub(crate) struct Schedule {
    start: Option<f64>,
    stop: Option<f64>,
    ended: bool,
    onended: Option<EndedCallback>,
}

impl Schedule {
    pub fn handle(&mut self, msg: SourceMessage) {
        match msg {
            SourceMessage::Start(when) => self.start = Some(when),
            SourceMessage::Stop(when) => self.stop = Some(when),
            SourceMessage::OnEnded(callback) => self.onended = callback,
        }
    }

    /// Whether the source produces sound at context time `t`.
    #[inline]
    pub fn is_playing(&self, t: f64) -> bool {
        !self.ended
            && self.start.is_some_and(|start| t >= start)
            && self.stop.map_or(true, |stop| t < stop)
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// End playback and fire the `ended` callback, once.
    pub fn finish(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        if let Some(callback) = self.onended.as_mut() {
            callback();
        }
    }

    /// Finish once the stop time falls before `end_time`.
    pub fn finish_if_stopped(&mut self, end_time: f64) {
        if self.start.is_some() && self.stop.is_some_and(|stop| stop <= end_time) {
            self.finish();
        }
    }
}
