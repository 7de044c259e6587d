//! Nodes that process their inputs.

mod channels;
mod delay;
mod filter;
mod gain;
mod worklet;

pub use channels::{ChannelMerger, ChannelSplitter};
pub use delay::Delay;
pub use filter::{BiquadFilter, IirFilter};
pub use gain::Gain;
pub use worklet::AudioWorklet;
