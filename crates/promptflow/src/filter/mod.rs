//! Filter phase: narrows the item set by rules, AI judgment, or both.

pub mod ai;
pub mod rule;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::schema::{AiFilterConfig, CombineMode, FilterConfig, RuleSet};
use crate::error::{PipelineExecutionError, PipelinePhase};
use crate::item::Item;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::progress::ProgressEvent;

pub use rule::{evaluate, evaluate_rule_set, RuleEvaluator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Rule,
    Ai,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    pub filter_type: FilterKind,
    pub total_items: usize,
    pub included_count: usize,
    pub excluded_count: usize,
}

/// Partition of the input: `included` and `excluded` together hold every
/// input item exactly once, each in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResult {
    pub included: Vec<Item>,
    pub excluded: Vec<Item>,
    pub stats: FilterStats,
}

impl FilterResult {
    fn partition(items: &[Item], decisions: &[bool], kind: FilterKind) -> Self {
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        for (item, keep) in items.iter().zip(decisions) {
            let item = item.with_coerced_id();
            if *keep {
                included.push(item);
            } else {
                excluded.push(item);
            }
        }

        let stats = FilterStats {
            filter_type: kind,
            total_items: items.len(),
            included_count: included.len(),
            excluded_count: excluded.len(),
        };

        Self {
            included,
            excluded,
            stats,
        }
    }
}

/// A filter configuration checked for the blocks its type needs.
#[derive(Debug, Clone)]
pub enum FilterPlan {
    Rule(RuleSet),
    Ai(AiFilterConfig),
    Hybrid {
        rule: RuleSet,
        ai: AiFilterConfig,
        combine: CombineMode,
    },
}

impl FilterPlan {
    pub fn from_config(config: &FilterConfig) -> Result<Self, PipelineExecutionError> {
        if let Some(message) = config.missing_block() {
            return Err(PipelineExecutionError::validation(message));
        }

        match (config.filter_type.as_str(), &config.rule, &config.ai) {
            ("rule", Some(rule), _) => Ok(Self::Rule(rule.clone())),
            ("ai", _, Some(ai)) => Ok(Self::Ai(ai.clone())),
            ("hybrid", Some(rule), Some(ai)) => Ok(Self::Hybrid {
                rule: rule.clone(),
                ai: ai.clone(),
                combine: config.combine_mode,
            }),
            (other, _, _) => Err(PipelineExecutionError::filter(format!(
                "Unknown filter type: '{}'",
                other
            ))),
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Rule(_) => FilterKind::Rule,
            Self::Ai(_) => FilterKind::Ai,
            Self::Hybrid { .. } => FilterKind::Hybrid,
        }
    }

    pub async fn execute(
        &self,
        items: &[Item],
        ctx: &ExecutionContext,
    ) -> Result<FilterResult, PipelineExecutionError> {
        ctx.progress.report(ProgressEvent::PhaseStarted {
            phase: PipelinePhase::Filter,
            total: items.len(),
        });

        let decisions = match self {
            Self::Rule(rule_set) => {
                let evaluator = RuleEvaluator::new(rule_set);
                items.iter().map(|item| evaluator.matches(item)).collect()
            }
            Self::Ai(ai) => {
                let all: Vec<usize> = (0..items.len()).collect();
                ai::ai_decisions(items, &all, ai, ctx).await?
            }
            Self::Hybrid { rule, ai, combine } => {
                hybrid_decisions(items, rule, ai, *combine, ctx).await?
            }
        };

        let result = FilterResult::partition(items, &decisions, self.kind());
        info!(
            filter_type = ?result.stats.filter_type,
            included = result.stats.included_count,
            excluded = result.stats.excluded_count,
            "Filter complete"
        );

        ctx.progress.report(ProgressEvent::PhaseCompleted {
            phase: PipelinePhase::Filter,
        });
        Ok(result)
    }
}

/// Filters `items` according to `config`.
pub async fn run_filter(
    items: &[Item],
    config: &FilterConfig,
    ctx: &ExecutionContext,
) -> Result<FilterResult, PipelineExecutionError> {
    FilterPlan::from_config(config)?.execute(items, ctx).await
}

/// Rule decision first; the AI only sees items the rule leaves undecided
/// (rule true under `and`, rule false under `or`).
async fn hybrid_decisions(
    items: &[Item],
    rule: &RuleSet,
    ai: &AiFilterConfig,
    combine: CombineMode,
    ctx: &ExecutionContext,
) -> Result<Vec<bool>, PipelineExecutionError> {
    let evaluator = RuleEvaluator::new(rule);
    let mut decisions: Vec<bool> = items.iter().map(|item| evaluator.matches(item)).collect();

    let undecided: Vec<usize> = decisions
        .iter()
        .enumerate()
        .filter(|(_, passed)| match combine {
            CombineMode::And => **passed,
            CombineMode::Or => !**passed,
        })
        .map(|(index, _)| index)
        .collect();

    debug!(
        combine = ?combine,
        "Hybrid filter: {} of {} items need an AI decision",
        undecided.len(),
        items.len()
    );

    let ai_results = ai::ai_decisions(items, &undecided, ai, ctx).await?;
    for (index, include) in undecided.into_iter().zip(ai_results) {
        decisions[index] = include;
    }

    Ok(decisions)
}
