//! Scheduled sources: no inputs, played between `start` and `stop`.

mod buffer_source;
mod constant_source;
mod oscillator;

pub use buffer_source::AudioBufferSource;
pub use constant_source::ConstantSource;
pub use oscillator::Oscillator;
