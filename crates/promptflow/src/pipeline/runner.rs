use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::PipelineExecutionError;
use crate::filter::{FilterPlan, FilterResult};
use crate::input::load_items;
use crate::invoker::CapabilityInvoker;
use crate::map::{run_map, MapResult};
use crate::reduce::{ReducePlan, ReduceResult};

use super::context::ExecutionContext;
use super::progress::{NoopProgress, ProgressReporter};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Items loaded from the input, before filtering.
    pub total_items: usize,
    /// Items that reached the map phase.
    pub mapped_items: usize,
    pub successful_maps: usize,
    pub failed_maps: usize,
}

/// Everything a run produced. `filter_result` is `None` exactly when no
/// filter was configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub run_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_result: Option<FilterResult>,
    pub map_results: Vec<MapResult>,
    pub reduce_result: ReduceResult,
    pub stats: ExecutionStats,
}

/// Caller-supplied collaborators for [`execute_pipeline`].
#[derive(Clone)]
pub struct ExecutionOptions {
    pub invoker: Arc<dyn CapabilityInvoker>,
    /// Directory the pipeline definition lives in; relative paths resolve
    /// against it.
    pub pipeline_directory: PathBuf,
    pub progress: Option<Arc<dyn ProgressReporter>>,
}

impl ExecutionOptions {
    pub fn new(
        invoker: Arc<dyn CapabilityInvoker>,
        pipeline_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            invoker,
            pipeline_directory: pipeline_directory.into(),
            progress: None,
        }
    }
}

pub struct Pipeline {
    invoker: Arc<dyn CapabilityInvoker>,
    pipeline_directory: PathBuf,
    progress: Arc<dyn ProgressReporter>,
}

impl Pipeline {
    pub fn new(
        invoker: Arc<dyn CapabilityInvoker>,
        pipeline_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            invoker,
            pipeline_directory: pipeline_directory.into(),
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn from_options(options: ExecutionOptions) -> Self {
        let pipeline = Self::new(options.invoker, options.pipeline_directory);
        match options.progress {
            Some(progress) => pipeline.with_progress(progress),
            None => pipeline,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs validate → load → filter (optional) → map → reduce.
    ///
    /// Structural problems abort the run with a phase-tagged error before
    /// the offending phase starts. Unknown filter/reduce types are caught
    /// before any invocation is made.
    pub async fn run(
        &self,
        config: &PipelineConfig,
    ) -> Result<PipelineResult, PipelineExecutionError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", %run_id, name = %config.name);
        self.run_inner(run_id, config).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        config: &PipelineConfig,
    ) -> Result<PipelineResult, PipelineExecutionError> {
        let started_at = Utc::now();

        // Step 1: Validate and resolve phase plans
        config.validate()?;
        let filter_plan = config
            .filter
            .as_ref()
            .map(FilterPlan::from_config)
            .transpose()?;
        let reduce_plan = ReducePlan::from_config(&config.reduce)?;

        // Step 2: Load input
        let items = load_items(&config.input, &self.pipeline_directory).await?;
        info!("Loaded {} items", items.len());

        let ctx = ExecutionContext::new(Arc::clone(&self.invoker))
            .with_pipeline_directory(self.pipeline_directory.clone())
            .with_parameters(config.input.parameters.clone())
            .with_progress(Arc::clone(&self.progress));

        // Step 3: Filter
        let filter_result = match &filter_plan {
            Some(plan) => Some(
                plan.execute(&items, &ctx)
                    .instrument(info_span!("filter", filter_type = ?plan.kind()))
                    .await?,
            ),
            None => None,
        };
        let map_input = match &filter_result {
            Some(result) => result.included.as_slice(),
            None => items.as_slice(),
        };

        // Step 4: Map
        let map_results = run_map(map_input, &config.map, &ctx)
            .instrument(info_span!("map"))
            .await?;

        // Step 5: Reduce
        let reduce_result = reduce_plan
            .execute(&map_results, &ctx)
            .instrument(info_span!("reduce", reduce_type = %config.reduce.reduce_type))
            .await?;

        let successful_maps = map_results.iter().filter(|r| r.success).count();
        let stats = ExecutionStats {
            started_at,
            finished_at: Utc::now(),
            total_items: items.len(),
            mapped_items: map_results.len(),
            successful_maps,
            failed_maps: map_results.len() - successful_maps,
        };
        info!(
            mapped = stats.mapped_items,
            succeeded = stats.successful_maps,
            failed = stats.failed_maps,
            "Pipeline complete"
        );

        Ok(PipelineResult {
            run_id,
            filter_result,
            map_results,
            reduce_result,
            stats,
        })
    }
}

/// Runs `config` with the given collaborators.
pub async fn execute_pipeline(
    config: &PipelineConfig,
    options: ExecutionOptions,
) -> Result<PipelineResult, PipelineExecutionError> {
    Pipeline::from_options(options).run(config).await
}
