//! Composite stand-ins for primitives a host lacks.
//!
//! Each faker wires several native primitives together and implements the
//! same native traits as the primitive it replaces, so the rest of the crate
//! cannot tell the difference.

mod audio_worklet;
mod constant_source;
mod iir_filter;

pub use audio_worklet::AudioWorkletFaker;
pub use constant_source::ConstantSourceFaker;
pub use iir_filter::IirFilterFaker;
