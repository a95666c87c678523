pub mod concurrency;
pub mod config;
pub mod error;
pub mod filter;
pub mod input;
pub mod invoker;
pub mod item;
pub mod map;
pub mod pipeline;
pub mod prompt;
pub mod reduce;
pub mod response;
pub mod telemetry;
pub mod template;

pub use config::{
    load_pipeline_config, load_pipeline_config_from_str, ConfigFormat, FilterConfig, MapConfig,
    PipelineConfig, ReduceConfig,
};
pub use error::{ConfigError, InputError, PipelineExecutionError, PipelinePhase, Result};
pub use filter::{run_filter, FilterKind, FilterResult, FilterStats};
pub use invoker::{CapabilityInvoker, FnInvoker, InvokeResult};
pub use item::{FieldValue, Item};
pub use map::{run_map, MapResult};
pub use pipeline::{
    execute_pipeline, BroadcastProgress, ExecutionContext, ExecutionOptions, ExecutionStats,
    Pipeline, PipelineResult, ProgressEvent, ProgressReporter,
};
pub use reduce::{run_reduce, ReduceOutput, ReduceResult, ReduceStats};
pub use response::MapOutput;
pub use telemetry::{init_tracing, TelemetryConfig, TelemetryError};
pub use template::{render, Template};
