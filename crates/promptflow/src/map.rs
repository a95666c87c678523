//! Map phase: one capability call per item.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::concurrency::run_bounded;
use crate::config::schema::MapConfig;
use crate::error::{PipelineExecutionError, PipelinePhase};
use crate::invoker::invoke_text;
use crate::item::Item;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::progress::ProgressEvent;
use crate::prompt::PromptSource;
use crate::response::{parse_output, MapOutput};

/// Outcome for a single item. `output` is set on success, `error` on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapResult {
    pub item: Item,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<MapOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MapResult {
    pub fn succeeded(item: Item, output: MapOutput) -> Self {
        Self {
            item,
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(item: Item, error: impl Into<String>) -> Self {
        Self {
            item,
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Maps every item through the capability, `parallel` at a time.
///
/// Results come back in input order. A failed call or an unparsable response
/// marks that item's result as failed; it never aborts the phase. Only
/// structural problems (such as an unreadable prompt file) are returned as
/// errors.
pub async fn run_map(
    items: &[Item],
    config: &MapConfig,
    ctx: &ExecutionContext,
) -> Result<Vec<MapResult>, PipelineExecutionError> {
    let source = PromptSource::from_fields("Map", &config.prompt, &config.prompt_file)
        .map_err(PipelineExecutionError::from)?;
    let template = source
        .load(&ctx.pipeline_directory, PipelinePhase::Map)
        .await?;

    ctx.progress.report(ProgressEvent::PhaseStarted {
        phase: PipelinePhase::Map,
        total: items.len(),
    });
    debug!(
        "Mapping {} items with parallelism {}",
        items.len(),
        config.parallelism()
    );

    let results = run_bounded(items, config.parallelism(), |index, item| {
        let prompt = template.render(&ctx.prompt_fields(item));
        async move {
            let outcome = invoke_text(ctx.invoker.as_ref(), &prompt, config.timeout_ms)
                .await
                .and_then(|response| parse_output(&response, &config.output));

            let result = match outcome {
                Ok(output) => MapResult::succeeded(item.clone(), output),
                Err(e) => {
                    warn!(item = %item.label(index), "Map failed: {}", e);
                    MapResult::failed(item.clone(), e)
                }
            };

            ctx.progress.report(ProgressEvent::ItemCompleted {
                phase: PipelinePhase::Map,
                index,
                success: result.success,
            });
            result
        }
    })
    .await;

    let failed = results.iter().filter(|r| !r.success).count();
    info!(
        total = results.len(),
        succeeded = results.len() - failed,
        failed,
        "Map complete"
    );

    ctx.progress.report(ProgressEvent::PhaseCompleted {
        phase: PipelinePhase::Map,
    });
    Ok(results)
}
