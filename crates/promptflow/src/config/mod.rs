pub mod loader;
pub mod schema;

pub use loader::{load_pipeline_config, load_pipeline_config_from_str, ConfigFormat};
pub use schema::{
    AiFilterConfig, CombineMode, FilterConfig, InputConfig, InputSource, MapConfig,
    PipelineConfig, ReduceConfig, Rule, RuleMode, RuleOperator, RuleSet, UncertainDecision,
    DEFAULT_PARALLEL,
};
