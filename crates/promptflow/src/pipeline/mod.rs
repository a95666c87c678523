pub mod context;
pub mod progress;
pub mod runner;

pub use context::ExecutionContext;
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{execute_pipeline, ExecutionOptions, ExecutionStats, Pipeline, PipelineResult};
