use tracing::{debug, warn};

use crate::concurrency::run_bounded;
use crate::config::schema::AiFilterConfig;
use crate::error::{PipelineExecutionError, PipelinePhase};
use crate::invoker::invoke_text;
use crate::item::Item;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::progress::ProgressEvent;
use crate::prompt::PromptSource;
use crate::response::parse_verdict;

/// Asks the capability whether each candidate item should be kept.
///
/// `candidates` are indices into `items`; the returned decisions line up with
/// them. A failed invocation or an unreadable answer falls back to the
/// configured `onError` decision (exclude by default).
pub(crate) async fn ai_decisions(
    items: &[Item],
    candidates: &[usize],
    ai: &AiFilterConfig,
    ctx: &ExecutionContext,
) -> Result<Vec<bool>, PipelineExecutionError> {
    let source = PromptSource::from_fields("AI filter", &ai.prompt, &ai.prompt_file)
        .map_err(PipelineExecutionError::from)?;
    let template = source
        .load(&ctx.pipeline_directory, PipelinePhase::Filter)
        .await?;

    let fallback = ai.on_error.include();
    let decisions = run_bounded(candidates, ai.parallelism(), |_, &index| {
        let item = &items[index];
        let prompt = template.render(&ctx.prompt_fields(item));
        async move {
            let outcome = invoke_text(ctx.invoker.as_ref(), &prompt, ai.timeout_ms)
                .await
                .and_then(|response| parse_verdict(&response));

            let (include, success) = match outcome {
                Ok(verdict) => {
                    debug!(
                        item = %item.label(index),
                        include = verdict.include,
                        reason = verdict.reason.as_deref().unwrap_or(""),
                        "AI filter decision"
                    );
                    (verdict.include, true)
                }
                Err(e) => {
                    warn!(
                        item = %item.label(index),
                        "AI filter could not decide, using fallback include={}: {}",
                        fallback,
                        e
                    );
                    (fallback, false)
                }
            };

            ctx.progress.report(ProgressEvent::ItemCompleted {
                phase: PipelinePhase::Filter,
                index,
                success,
            });
            include
        }
    })
    .await;

    Ok(decisions)
}
