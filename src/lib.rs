//! # Einklang
//!
//! A standardized audio graph rendered offline on top of native audio hosts
//! that are only partially compliant.
//!
//! Build a graph on an [`OfflineAudioContext`], then
//! [`start_rendering`](OfflineAudioContext::start_rendering) it. Rendering
//! turns every abstract node into a native one through its
//! [`AudioNodeRenderer`](render::AudioNodeRenderer), constructing each native
//! node exactly once even when the graph fans out or loops back on itself.
//! Primitives the host lacks (constant sources, IIR filters, audio worklets)
//! are faked from the ones it has; known host defects are detected by probes,
//! cached in a [`CapabilityCache`], and worked around.
//!
//! ## Quick Start
//!
//! ```
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use std::sync::Arc;
//! use einklang::host::{HostProfile, SoftwareContext};
//! use einklang::nodes::{ConstantSource, Gain};
//! use einklang::{OfflineAudioContext, OfflineContextOptions};
//!
//! // A host without constant sources: the renderer fakes one.
//! let options = OfflineContextOptions::new(1, 4410, 44_100.0);
//! let host = SoftwareContext::with_profile(options, HostProfile::minimal()).unwrap();
//! let context = OfflineAudioContext::new(Arc::new(host));
//!
//! let source = context.add(ConstantSource::new(1.0)).unwrap();
//! let gain = context.add(Gain::new(0.5)).unwrap();
//! source.connect(&gain).unwrap();
//! gain.connect(&context.destination()).unwrap();
//! source.start(0.0).unwrap();
//!
//! let rendered = context.start_rendering().await.unwrap();
//! assert_eq!(rendered.length(), 4410);
//! # });
//! ```
//!
//! ## Hosts
//!
//! A host implements the traits in [`native`]. The crate ships a software
//! host, [`host::SoftwareContext`], whose [`HostProfile`](host::HostProfile)
//! switches optional primitives and defects on and off.

mod automation;
mod buffer;
mod capabilities;
mod config;
mod context;
mod error;
mod fakers;
mod iir;
mod node;
mod param;
mod worklet;

pub mod graph;
pub mod host;
pub mod native;
pub mod nodes;
pub mod render;

pub use automation::{AutomationEvent, Timeline};
pub use buffer::{AudioBuffer, CopyStrategy};
pub use capabilities::{probes, Capability, CapabilityCache, CapabilityKey};
pub use config::{ChannelConfig, ChannelCountMode, ChannelInterpretation, OfflineContextOptions, MAX_CHANNELS};
pub use context::OfflineAudioContext;
pub use error::{AudioError, Result};
pub use fakers::{AudioWorkletFaker, ConstantSourceFaker, IirFilterFaker};
pub use node::AudioNode;
pub use param::AudioParam;
pub use worklet::{AudioWorkletNodeOptions, AudioWorkletProcessor, ParamDescriptor, ProcessorDefinition};
