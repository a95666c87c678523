use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::invoker::CapabilityInvoker;
use crate::item::{FieldValue, Item};

use super::progress::{NoopProgress, ProgressReporter};

/// Collaborators shared by every phase of one run. Read-only once built.
#[derive(Clone)]
pub struct ExecutionContext {
    pub invoker: Arc<dyn CapabilityInvoker>,
    /// Base for relative prompt-file and input paths.
    pub pipeline_directory: PathBuf,
    /// Constant fields visible to every prompt.
    pub parameters: IndexMap<String, FieldValue>,
    pub progress: Arc<dyn ProgressReporter>,
}

impl ExecutionContext {
    pub fn new(invoker: Arc<dyn CapabilityInvoker>) -> Self {
        Self {
            invoker,
            pipeline_directory: PathBuf::from("."),
            parameters: IndexMap::new(),
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_pipeline_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.pipeline_directory = directory.into();
        self
    }

    pub fn with_parameters(mut self, parameters: IndexMap<String, FieldValue>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// The fields a prompt template sees for `item`.
    pub(crate) fn prompt_fields(&self, item: &Item) -> Item {
        if self.parameters.is_empty() {
            item.clone()
        } else {
            item.with_parameters(&self.parameters)
        }
    }

    /// The parameters as an item, for templates rendered outside any item.
    pub(crate) fn parameter_fields(&self) -> Item {
        self.parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
