//! One renderer per node kind.
//!
//! Renderers only construct; wiring inputs and params is left to
//! [`render_node`](super::render_node).

macro_rules! renderer {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Default)]
        pub struct $name {
            memo: $crate::render::RenderMemo,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }
        }
    };
}

pub(crate) use renderer;

mod effects;
mod sources;
mod worklet;

pub use effects::{
    BiquadFilterRenderer, ChannelMergerRenderer, ChannelSplitterRenderer, DelayRenderer, DestinationRenderer,
    GainRenderer, IirFilterRenderer,
};
pub use sources::{AudioBufferSourceRenderer, ConstantSourceRenderer, OscillatorRenderer};
pub use worklet::AudioWorkletRenderer;
