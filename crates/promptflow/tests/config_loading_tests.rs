//! Loading pipeline definitions from disk.

use tempfile::TempDir;

use promptflow::config::{CombineMode, RuleOperator, UncertainDecision};
use promptflow::{
    load_pipeline_config, load_pipeline_config_from_str, ConfigError, ConfigFormat,
    PipelineExecutionError, PipelinePhase,
};

fn filter_pipeline(filter: &str) -> String {
    format!(
        r#"
name: f
input: {{ items: [{{ id: 1 }}] }}
filter: {filter}
map: {{ prompt: "x" }}
reduce: {{ type: list }}
"#
    )
}

fn load_error(yaml: &str) -> String {
    load_pipeline_config_from_str(yaml, ConfigFormat::Yaml)
        .unwrap_err()
        .to_string()
}

#[test]
fn test_load_yaml_pipeline_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("triage.yaml");
    std::fs::write(
        &path,
        r#"
name: triage
input:
  from:
    type: csv
    path: tickets.csv
    delimiter: ";"
  parameters:
    team: platform
filter:
  type: hybrid
  combineMode: or
  rule:
    mode: any
    rules:
      - { field: labels, operator: contains, value: urgent }
      - { field: priority, operator: in, value: [P0, P1] }
  ai:
    promptFile: prompts/filter.md
    parallel: 2
    onError: include
map:
  promptFile: prompts/map.md
  output: [category, summary]
  parallel: 8
  timeoutMs: 30000
reduce:
  type: ai
  prompt: "{{COUNT}} tickets: {{RESULTS}}"
"#,
    )
    .unwrap();

    let config = load_pipeline_config(&path).unwrap();

    assert_eq!(config.name, "triage");
    let filter = config.filter.as_ref().unwrap();
    assert_eq!(filter.combine_mode, CombineMode::Or);
    let rules = &filter.rule.as_ref().unwrap().rules;
    assert_eq!(rules[1].operator, RuleOperator::In);
    let ai = filter.ai.as_ref().unwrap();
    assert_eq!(ai.parallelism(), 2);
    assert_eq!(ai.on_error, UncertainDecision::Include);
    assert_eq!(ai.output, vec!["include".to_string()]);
    assert_eq!(config.map.parallelism(), 8);
    assert_eq!(config.map.timeout_ms, Some(30000));
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_json_pipeline_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("simple.json");
    std::fs::write(
        &path,
        r#"{
            "name": "simple",
            "input": { "items": [{ "id": 1 }, { "id": 2 }] },
            "map": { "prompt": "{{id}}" },
            "reduce": { "type": "text" }
        }"#,
    )
    .unwrap();

    let config = load_pipeline_config(&path).unwrap();
    assert_eq!(config.input.items.as_ref().map(Vec::len), Some(2));
    assert!(config.filter.is_none());
    assert_eq!(config.map.parallelism(), promptflow::config::DEFAULT_PARALLEL);
}

#[test]
fn test_missing_file() {
    let tmp = TempDir::new().unwrap();
    let err = load_pipeline_config(tmp.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));

    let err = PipelineExecutionError::from(err);
    assert_eq!(err.phase, PipelinePhase::Validation);
}

#[test]
fn test_invalid_pipeline_file_is_rejected_on_load() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.yml");
    std::fs::write(
        &path,
        r#"
name: bad
input:
  items: [{ id: 1 }]
map:
  prompt: "{{id}}"
  promptFile: map.md
reduce:
  type: list
"#,
    )
    .unwrap();

    let err = load_pipeline_config(&path).unwrap_err();
    assert!(err.to_string().contains("cannot have both"));
}

#[test]
fn test_rule_filter_without_rule_block_rejected_on_load() {
    let message = load_error(&filter_pipeline("{ type: rule }"));
    assert!(message.contains("Rule filter requires"));
}

#[test]
fn test_ai_filter_without_ai_block_rejected_on_load() {
    let message = load_error(&filter_pipeline("{ type: ai }"));
    assert!(message.contains("AI filter requires"));
}

#[test]
fn test_hybrid_filter_needs_both_blocks_on_load() {
    let without_ai = filter_pipeline("{ type: hybrid, rule: { rules: [] } }");
    assert!(load_error(&without_ai).contains("Hybrid filter requires"));

    let without_rule = filter_pipeline(r#"{ type: hybrid, ai: { prompt: "{{id}}" } }"#);
    assert!(load_error(&without_rule).contains("Hybrid filter requires"));
}

#[test]
fn test_unknown_filter_type_left_to_filter_phase() {
    let config =
        load_pipeline_config_from_str(&filter_pipeline("{ type: invalid }"), ConfigFormat::Yaml);
    assert!(config.is_ok());
}

#[test]
fn test_non_ascii_delimiter_rejected_on_load() {
    let yaml = r#"
name: csv
input:
  from: { type: csv, path: data.csv, delimiter: "§" }
map: { prompt: "x" }
reduce: { type: list }
"#;
    let message = load_error(yaml);
    assert!(message.contains("single ASCII character"));
}
