use crate::error::{AudioError, Result};
use crate::nodes::ParamInit;
use crate::worklet::{AudioWorkletNodeOptions, ProcessorDefinition};

/// A node running the processor registered under `name`.
///
/// The processor must have been registered with
/// [`OfflineAudioContext::add_audio_worklet_module`](crate::OfflineAudioContext::add_audio_worklet_module)
/// before the node is added.
#[derive(Clone, Debug)]
pub struct AudioWorklet {
    pub name: String,
    pub options: AudioWorkletNodeOptions,
    pub(crate) definition: Option<ProcessorDefinition>,
}

impl AudioWorklet {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, AudioWorkletNodeOptions::default())
    }

    pub fn with_options(name: impl Into<String>, options: AudioWorkletNodeOptions) -> Self {
        Self {
            name: name.into(),
            options,
            definition: None,
        }
    }

    /// Attach the registered definition and resolve the options against it.
    pub(crate) fn bind(&mut self, definition: ProcessorDefinition) -> Result<()> {
        self.options = self.options.clone().resolve()?;
        self.definition = Some(definition);
        Ok(())
    }

    pub(crate) fn definition(&self) -> Result<&ProcessorDefinition> {
        self.definition
            .as_ref()
            .ok_or_else(|| AudioError::invalid_state(format!("no processor named {:?}", self.name)))
    }

    pub(crate) fn params(&self) -> Vec<ParamInit> {
        self.definition
            .iter()
            .flat_map(|definition| &definition.parameter_descriptors)
            .map(|descriptor| ParamInit {
                descriptor: descriptor.clone(),
                value: self.options.initial_value(descriptor),
            })
            .collect()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for descriptor in &self.definition()?.parameter_descriptors {
            if descriptor.min_value > descriptor.max_value {
                return Err(AudioError::not_supported(format!(
                    "parameter {:?} has an empty range",
                    descriptor.name
                )));
            }
        }
        self.options.clone().resolve().map(drop)
    }
}
