use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The pipeline phase an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePhase {
    Validation,
    Filter,
    Map,
    Reduce,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Filter => "filter",
            Self::Map => "map",
            Self::Reduce => "reduce",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only error that crosses a phase boundary.
///
/// Structural problems (bad configuration, unknown phase types, missing
/// prompt files) surface as this error and abort the run. Per-item failures
/// never do; they are recorded in the phase results instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{phase}] {message}")]
pub struct PipelineExecutionError {
    pub phase: PipelinePhase,
    pub message: String,
}

impl PipelineExecutionError {
    pub fn new(phase: PipelinePhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(PipelinePhase::Validation, message)
    }

    pub fn filter(message: impl Into<String>) -> Self {
        Self::new(PipelinePhase::Filter, message)
    }

    pub fn map(message: impl Into<String>) -> Self {
        Self::new(PipelinePhase::Map, message)
    }

    pub fn reduce(message: impl Into<String>) -> Self {
        Self::new(PipelinePhase::Reduce, message)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read pipeline file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse pipeline YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Failed to parse pipeline JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Pipeline validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid rule on field '{field}': {reason}")]
    InvalidRule { field: String, reason: String },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<ConfigError> for PipelineExecutionError {
    fn from(err: ConfigError) -> Self {
        match err {
            // Keep the raw message so callers can match on the invariant text.
            ConfigError::Validation { message } => PipelineExecutionError::validation(message),
            other => PipelineExecutionError::validation(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read input file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse CSV input '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to parse JSON input '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV delimiter {delimiter:?} must be a single ASCII character")]
    InvalidDelimiter { delimiter: char },

    #[error("JSON input '{path}' must be an array of objects")]
    NotAnArray { path: PathBuf },

    #[error("Input must define either 'items' or 'from'")]
    NoSource,
}

impl From<InputError> for PipelineExecutionError {
    fn from(err: InputError) -> Self {
        PipelineExecutionError::validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineExecutionError>;
