use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::PipelineExecutionError;
use crate::item::{FieldValue, Item};

/// Parallelism used by the map phase and the AI filter when no hint is given.
pub const DEFAULT_PARALLEL: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub name: String,
    pub input: InputConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
    pub map: MapConfig,
    pub reduce: ReduceConfig,
}

impl PipelineConfig {
    /// Checks the structural invariants. Runs at load time and again before
    /// execution for configs built in code.
    pub fn validate(&self) -> Result<(), PipelineExecutionError> {
        super::loader::validate_config(self).map_err(PipelineExecutionError::from)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<InputSource>,
    /// Load at most this many items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Constant fields visible to every prompt.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, FieldValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputSource {
    Csv {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delimiter: Option<char>,
    },
    Json {
        path: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// `rule`, `ai` or `hybrid`. Kept as text so that an unknown type is
    /// reported as a filter error rather than a parse error.
    #[serde(rename = "type")]
    pub filter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiFilterConfig>,
    #[serde(default)]
    pub combine_mode: CombineMode,
}

impl FilterConfig {
    /// Message for a known filter type that lacks a block it needs. Unknown
    /// types yield `None`.
    pub fn missing_block(&self) -> Option<&'static str> {
        match (self.filter_type.as_str(), &self.rule, &self.ai) {
            ("rule", None, _) => Some("Rule filter requires a 'rule' block"),
            ("ai", _, None) => Some("AI filter requires an 'ai' block"),
            ("hybrid", None, _) | ("hybrid", _, None) => {
                Some("Hybrid filter requires both a 'rule' and an 'ai' block")
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub mode: RuleMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub field: String,
    pub operator: RuleOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    In,
    NotIn,
    Matches,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineMode {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiFilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<String>,
    /// Fields expected in the response; must contain `include`.
    #[serde(default = "default_ai_filter_output")]
    pub output: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Decision taken when the invocation fails or the answer is unreadable.
    #[serde(default)]
    pub on_error: UncertainDecision,
}

fn default_ai_filter_output() -> Vec<String> {
    vec!["include".to_string()]
}

impl AiFilterConfig {
    pub fn parallelism(&self) -> usize {
        self.parallel.unwrap_or(DEFAULT_PARALLEL)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UncertainDecision {
    #[default]
    Exclude,
    Include,
}

impl UncertainDecision {
    pub fn include(&self) -> bool {
        matches!(self, Self::Include)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<String>,
    /// Fields projected from a JSON response. Empty means free-text output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl MapConfig {
    pub fn parallelism(&self) -> usize {
        self.parallel.unwrap_or(DEFAULT_PARALLEL)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceConfig {
    /// `list`, `json`, `text` or `ai`.
    #[serde(rename = "type")]
    pub reduce_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ReduceConfig {
    pub fn of_type(reduce_type: &str) -> Self {
        Self {
            reduce_type: reduce_type.to_string(),
            prompt: None,
            prompt_file: None,
            output: Vec::new(),
            timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
type: hybrid
rule:
  rules:
    - field: status
      operator: equals
      value: open
ai:
  prompt: "Is {{title}} relevant?"
"#;
        let filter: FilterConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(filter.combine_mode, CombineMode::And);
        let rule = filter.rule.unwrap();
        assert_eq!(rule.mode, RuleMode::All);
        assert_eq!(rule.rules[0].operator, RuleOperator::Equals);

        let ai = filter.ai.unwrap();
        assert_eq!(ai.output, vec!["include".to_string()]);
        assert_eq!(ai.parallelism(), DEFAULT_PARALLEL);
        assert_eq!(ai.on_error, UncertainDecision::Exclude);
    }

    #[test]
    fn test_operator_names_are_camel_case() {
        let rule: Rule =
            serde_json::from_str(r#"{"field": "tag", "operator": "notIn", "value": ["a"]}"#)
                .unwrap();
        assert_eq!(rule.operator, RuleOperator::NotIn);
    }

    #[test]
    fn test_csv_source_with_delimiter() {
        let input: InputConfig =
            serde_yaml::from_str("from:\n  type: csv\n  path: data.csv\n  delimiter: \";\"\n")
                .unwrap();
        match input.from {
            Some(InputSource::Csv { path, delimiter }) => {
                assert_eq!(path, "data.csv");
                assert_eq!(delimiter, Some(';'));
            }
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn test_map_config_free_text_by_default() {
        let map: MapConfig = serde_yaml::from_str("prompt: \"Summarize {{body}}\"").unwrap();
        assert!(map.output.is_empty());
        assert_eq!(map.parallelism(), DEFAULT_PARALLEL);
    }
}
