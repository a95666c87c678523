//! Prompt sources: inline text or a file next to the pipeline definition.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, PipelineExecutionError, PipelinePhase};
use crate::template::Template;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    Inline(String),
    File(String),
}

impl PromptSource {
    /// Enforces that exactly one of `prompt` and `promptFile` is set.
    pub fn from_fields(
        owner: &str,
        prompt: &Option<String>,
        prompt_file: &Option<String>,
    ) -> Result<Self, ConfigError> {
        match (prompt, prompt_file) {
            (Some(_), Some(_)) => Err(ConfigError::validation(format!(
                "{} cannot have both 'prompt' and 'promptFile'",
                owner
            ))),
            (None, None) => Err(ConfigError::validation(format!(
                "{} must have either 'prompt' or 'promptFile'",
                owner
            ))),
            (Some(text), None) => Ok(Self::Inline(text.clone())),
            (None, Some(path)) => Ok(Self::File(path.clone())),
        }
    }

    /// Loads and parses the template. A missing prompt file is reported
    /// against `phase`, the first phase that needs it.
    pub async fn load(
        &self,
        pipeline_directory: &Path,
        phase: PipelinePhase,
    ) -> Result<Template, PipelineExecutionError> {
        match self {
            Self::Inline(text) => Ok(Template::parse(text)),
            Self::File(relative) => {
                let path = resolve_path(pipeline_directory, relative);
                debug!("Loading prompt file {}", path.display());
                let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    PipelineExecutionError::new(
                        phase,
                        format!("Failed to read prompt file '{}': {}", path.display(), e),
                    )
                })?;
                Ok(Template::parse(&text))
            }
        }
    }
}

/// Resolves `path` against the pipeline directory unless it is absolute.
pub fn resolve_path(pipeline_directory: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        pipeline_directory.join(candidate)
    }
}
