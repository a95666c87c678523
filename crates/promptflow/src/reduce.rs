//! Reduce phase: aggregates the successful map outputs.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::schema::ReduceConfig;
use crate::error::{PipelineExecutionError, PipelinePhase};
use crate::invoker::invoke_text;
use crate::map::MapResult;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::progress::ProgressEvent;
use crate::prompt::PromptSource;
use crate::response::{extract_json, parse_output, MapOutput};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ReduceOutput {
    /// Successful outputs in input order.
    List(Vec<MapOutput>),
    /// Shallow union of all object outputs.
    Json(Map<String, Value>),
    /// One line per successful output.
    Text(String),
    /// The parsed answer of the summarizing call.
    Ai(MapOutput),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceStats {
    pub input_count: usize,
    pub successful_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceResult {
    pub output: ReduceOutput,
    pub stats: ReduceStats,
}

/// A reduce configuration resolved to one of the known strategies.
#[derive(Debug, Clone)]
pub enum ReducePlan {
    List,
    Json,
    Text,
    Ai {
        source: PromptSource,
        output: Vec<String>,
        timeout_ms: Option<u64>,
    },
}

impl ReducePlan {
    pub fn from_config(config: &ReduceConfig) -> Result<Self, PipelineExecutionError> {
        match config.reduce_type.as_str() {
            "list" => Ok(Self::List),
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "ai" => {
                let source =
                    PromptSource::from_fields("AI reduce", &config.prompt, &config.prompt_file)
                        .map_err(PipelineExecutionError::from)?;
                Ok(Self::Ai {
                    source,
                    output: config.output.clone(),
                    timeout_ms: config.timeout_ms,
                })
            }
            other => Err(PipelineExecutionError::reduce(format!(
                "Unknown reduce type: '{}'",
                other
            ))),
        }
    }

    pub async fn execute(
        &self,
        results: &[MapResult],
        ctx: &ExecutionContext,
    ) -> Result<ReduceResult, PipelineExecutionError> {
        ctx.progress.report(ProgressEvent::PhaseStarted {
            phase: PipelinePhase::Reduce,
            total: results.len(),
        });

        let successful: Vec<&MapOutput> = results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.output.as_ref())
            .collect();

        let stats = ReduceStats {
            input_count: results.len(),
            successful_count: successful.len(),
            failed_count: results.len() - successful.len(),
        };

        let output = match self {
            Self::List => ReduceOutput::List(successful.into_iter().cloned().collect()),
            Self::Json => ReduceOutput::Json(merge_objects(&successful)),
            Self::Text => ReduceOutput::Text(join_lines(&successful)),
            Self::Ai {
                source,
                output,
                timeout_ms,
            } => ReduceOutput::Ai(summarize(&successful, source, output, *timeout_ms, ctx).await?),
        };

        info!(
            successful = stats.successful_count,
            failed = stats.failed_count,
            "Reduce complete"
        );
        ctx.progress.report(ProgressEvent::PhaseCompleted {
            phase: PipelinePhase::Reduce,
        });

        Ok(ReduceResult { output, stats })
    }
}

/// Reduces `results` according to `config`.
pub async fn run_reduce(
    results: &[MapResult],
    config: &ReduceConfig,
    ctx: &ExecutionContext,
) -> Result<ReduceResult, PipelineExecutionError> {
    ReducePlan::from_config(config)?.execute(results, ctx).await
}

/// Later outputs overwrite earlier ones on key collision. Text outputs take
/// part when they contain a JSON object.
fn merge_objects(outputs: &[&MapOutput]) -> Map<String, Value> {
    let mut merged = Map::new();
    for output in outputs {
        match output {
            MapOutput::Fields(fields) => {
                for (key, value) in fields {
                    merged.insert(key.clone(), value.clone());
                }
            }
            MapOutput::Text(text) => match serde_json::from_str::<Value>(extract_json(text)) {
                Ok(Value::Object(object)) => merged.extend(object),
                _ => debug!("Skipping non-object output in json reduce"),
            },
        }
    }
    merged
}

fn join_lines(outputs: &[&MapOutput]) -> String {
    outputs
        .iter()
        .map(|output| match output {
            MapOutput::Text(text) => text.clone(),
            fields => fields.to_json().to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn summarize(
    outputs: &[&MapOutput],
    source: &PromptSource,
    fields: &[String],
    timeout_ms: Option<u64>,
    ctx: &ExecutionContext,
) -> Result<MapOutput, PipelineExecutionError> {
    let template = source
        .load(&ctx.pipeline_directory, PipelinePhase::Reduce)
        .await?;

    let values: Vec<Value> = outputs.iter().map(|o| o.to_json()).collect();
    let serialized = serde_json::to_string_pretty(&values).map_err(|e| {
        PipelineExecutionError::reduce(format!("Failed to serialize map results: {}", e))
    })?;

    let prompt = template.render_aggregate(outputs.len(), &serialized, &ctx.parameter_fields());
    let response = invoke_text(ctx.invoker.as_ref(), &prompt, timeout_ms)
        .await
        .map_err(|e| PipelineExecutionError::reduce(format!("AI reduce failed: {}", e)))?;

    parse_output(&response, fields).map_err(|e| {
        PipelineExecutionError::reduce(format!("AI reduce returned an unusable response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::{FnInvoker, InvokeResult};
    use crate::item::Item;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::Arc;

    fn fields(pairs: &[(&str, Value)]) -> MapOutput {
        let map: IndexMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        MapOutput::Fields(map)
    }

    #[test]
    fn test_unknown_type_is_reduce_error() {
        let err = ReducePlan::from_config(&ReduceConfig::of_type("csv")).unwrap_err();
        assert_eq!(err.phase, PipelinePhase::Reduce);
        assert!(err.message.contains("csv"));
    }

    #[test]
    fn test_ai_without_prompt_is_validation_error() {
        let err = ReducePlan::from_config(&ReduceConfig::of_type("ai")).unwrap_err();
        assert_eq!(err.phase, PipelinePhase::Validation);
        assert!(err.message.contains("must have either"));
    }

    #[test]
    fn test_merge_later_wins() {
        let a = fields(&[("x", json!(1)), ("y", json!("a"))]);
        let b = fields(&[("y", json!("b")), ("z", json!(true))]);
        let c = MapOutput::Text(r#"{"z": false}"#.to_string());
        let d = MapOutput::Text("not json".to_string());

        let merged = merge_objects(&[&a, &b, &c, &d]);
        assert_eq!(
            Value::Object(merged),
            json!({"x": 1, "y": "b", "z": false})
        );
    }

    #[test]
    fn test_join_lines_mixes_text_and_fields() {
        let a = MapOutput::Text("first".to_string());
        let b = fields(&[("k", json!(2))]);
        assert_eq!(join_lines(&[&a, &b]), "first\n{\"k\":2}");
    }

    #[test]
    fn test_reduce_output_serialization() {
        let output = ReduceOutput::Text("a\nb".to_string());
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({"type": "text", "value": "a\nb"})
        );
    }

    #[tokio::test]
    async fn test_list_keeps_successful_outputs_without_invoking() {
        let invoker = FnInvoker::new(|_prompt: String| async move {
            InvokeResult::failed("list reduce must not invoke")
        });
        let ctx = ExecutionContext::new(Arc::new(invoker));
        let results = vec![
            MapResult::succeeded(Item::new().with("id", 1i64), MapOutput::Text("one".into())),
            MapResult::failed(Item::new().with("id", 2i64), "boom"),
            MapResult::succeeded(Item::new().with("id", 3i64), MapOutput::Text("three".into())),
        ];

        let reduced = ReducePlan::List.execute(&results, &ctx).await.unwrap();

        assert_eq!(
            reduced.output,
            ReduceOutput::List(vec![
                MapOutput::Text("one".into()),
                MapOutput::Text("three".into())
            ])
        );
        assert_eq!(reduced.stats.input_count, 3);
        assert_eq!(reduced.stats.successful_count, 2);
        assert_eq!(reduced.stats.failed_count, 1);
    }
}
