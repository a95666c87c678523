use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::config::schema::{FilterConfig, InputSource, PipelineConfig, RuleOperator, RuleSet};
use crate::error::ConfigError;
use crate::prompt::PromptSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// `.json` files are JSON; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!("Loading pipeline from {}", path.display());
    load_pipeline_config_from_str(&content, ConfigFormat::from_path(path))
}

pub fn load_pipeline_config_from_str(
    content: &str,
    format: ConfigFormat,
) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };

    validate_config(&config)?;

    Ok(config)
}

pub(crate) fn validate_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::validation("Pipeline must have a non-empty 'name'"));
    }

    // Input
    match (&config.input.items, &config.input.from) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::validation(
                "Input cannot have both 'items' and 'from'",
            ));
        }
        (None, None) => {
            return Err(ConfigError::validation(
                "Input must have either 'items' or 'from'",
            ));
        }
        _ => {}
    }

    if let Some(InputSource::Csv {
        delimiter: Some(delimiter),
        ..
    }) = &config.input.from
    {
        if !delimiter.is_ascii() {
            return Err(ConfigError::validation(format!(
                "CSV delimiter {:?} must be a single ASCII character",
                delimiter
            )));
        }
    }

    if let Some(filter) = &config.filter {
        validate_filter(filter)?;
    }

    // Map
    PromptSource::from_fields("Map", &config.map.prompt, &config.map.prompt_file)?;
    check_parallel("Map", config.map.parallel)?;

    // Reduce; an unknown type is reported by the reduce phase itself.
    if config.reduce.reduce_type == "ai" {
        PromptSource::from_fields(
            "AI reduce",
            &config.reduce.prompt,
            &config.reduce.prompt_file,
        )?;
    }

    Ok(())
}

fn validate_filter(filter: &FilterConfig) -> Result<(), ConfigError> {
    if let Some(message) = filter.missing_block() {
        return Err(ConfigError::validation(message));
    }

    if let Some(rule_set) = &filter.rule {
        validate_rule_set(rule_set)?;
    }

    if let Some(ai) = &filter.ai {
        PromptSource::from_fields("AI filter", &ai.prompt, &ai.prompt_file)?;
        check_parallel("AI filter", ai.parallel)?;
        if !ai.output.iter().any(|f| f == "include") {
            return Err(ConfigError::validation(
                "AI filter output must contain the 'include' field",
            ));
        }
    }

    Ok(())
}

fn validate_rule_set(rule_set: &RuleSet) -> Result<(), ConfigError> {
    for rule in &rule_set.rules {
        if rule.field.trim().is_empty() {
            return Err(ConfigError::InvalidRule {
                field: rule.field.clone(),
                reason: "Rule field must not be empty".to_string(),
            });
        }

        match rule.operator {
            RuleOperator::Matches => {
                let pattern = rule.value.as_str().ok_or_else(|| ConfigError::InvalidRule {
                    field: rule.field.clone(),
                    reason: "'matches' requires a string pattern".to_string(),
                })?;
                if let Err(e) = Regex::new(pattern) {
                    return Err(ConfigError::InvalidRule {
                        field: rule.field.clone(),
                        reason: format!("Invalid regex pattern: {}", e),
                    });
                }
            }
            RuleOperator::In | RuleOperator::NotIn => {
                if !rule.value.is_array() {
                    return Err(ConfigError::InvalidRule {
                        field: rule.field.clone(),
                        reason: "'in' and 'notIn' require a list value".to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn check_parallel(owner: &str, parallel: Option<usize>) -> Result<(), ConfigError> {
    match parallel {
        Some(0) => Err(ConfigError::validation(format!(
            "{} 'parallel' must be at least 1",
            owner
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_yaml(yaml: &str) -> Result<PipelineConfig, ConfigError> {
        load_pipeline_config_from_str(yaml, ConfigFormat::Yaml)
    }

    fn validation_message(result: Result<PipelineConfig, ConfigError>) -> String {
        match result {
            Err(ConfigError::Validation { message }) => message,
            Err(other) => panic!("expected validation error, got {}", other),
            Ok(_) => panic!("expected validation error, got Ok"),
        }
    }

    #[test]
    fn test_load_valid_pipeline() {
        let config = load_yaml(
            r#"
name: Bug triage
input:
  items:
    - { id: "1", title: "Crash on start" }
filter:
  type: rule
  rule:
    rules:
      - { field: severity, operator: equals, value: critical }
map:
  prompt: "Analyze {{title}}"
  output: [category, priority]
  parallel: 3
reduce:
  type: json
"#,
        )
        .unwrap();

        assert_eq!(config.name, "Bug triage");
        assert_eq!(config.input.items.as_ref().unwrap().len(), 1);
        assert_eq!(config.map.output, vec!["category", "priority"]);
        assert_eq!(config.map.parallelism(), 3);
        assert_eq!(config.reduce.reduce_type, "json");
        assert!(config.filter.is_some());
    }

    #[test]
    fn test_load_json_format() {
        let config = load_pipeline_config_from_str(
            r#"{
                "name": "json pipeline",
                "input": { "items": [{ "a": 1 }] },
                "map": { "promptFile": "map.txt" },
                "reduce": { "type": "list" }
            }"#,
            ConfigFormat::Json,
        )
        .unwrap();

        assert_eq!(config.map.prompt_file.as_deref(), Some("map.txt"));
    }

    #[test]
    fn test_map_with_both_prompt_sources_rejected() {
        let message = validation_message(load_yaml(
            r#"
name: both
input: { items: [] }
map: { prompt: "x", promptFile: "x.txt" }
reduce: { type: list }
"#,
        ));
        assert!(message.contains("cannot have both"), "{}", message);
    }

    #[test]
    fn test_map_without_prompt_rejected() {
        let message = validation_message(load_yaml(
            r#"
name: neither
input: { items: [] }
map: { output: [a] }
reduce: { type: list }
"#,
        ));
        assert!(message.contains("must have either"), "{}", message);
    }

    #[test]
    fn test_ai_reduce_prompt_sources_checked() {
        let both = validation_message(load_yaml(
            r#"
name: r
input: { items: [] }
map: { prompt: "x" }
reduce: { type: ai, prompt: "y", promptFile: "y.txt" }
"#,
        ));
        assert!(both.contains("cannot have both"));

        let neither = validation_message(load_yaml(
            r#"
name: r
input: { items: [] }
map: { prompt: "x" }
reduce: { type: ai }
"#,
        ));
        assert!(neither.contains("must have either"));
    }

    #[test]
    fn test_non_ai_reduce_ignores_prompt() {
        let result = load_yaml(
            r#"
name: r
input: { items: [] }
map: { prompt: "x" }
reduce: { type: list }
"#,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_unknown_filter_type_accepted_at_load_time() {
        let result = load_yaml(
            r#"
name: f
input: { items: [] }
filter: { type: invalid }
map: { prompt: "x" }
reduce: { type: list }
"#,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_non_ascii_csv_delimiter_rejected() {
        let message = validation_message(load_yaml(
            r#"
name: csv
input:
  from: { type: csv, path: data.csv, delimiter: "§" }
map: { prompt: "x" }
reduce: { type: list }
"#,
        ));
        assert!(message.contains("ASCII"));
    }

    #[test]
    fn test_input_requires_exactly_one_source() {
        let message = validation_message(load_yaml(
            r#"
name: i
input: {}
map: { prompt: "x" }
reduce: { type: list }
"#,
        ));
        assert!(message.contains("Input must have either"));
    }

    #[test]
    fn test_invalid_regex_rule_rejected() {
        let result = load_yaml(
            r#"
name: re
input: { items: [] }
filter:
  type: rule
  rule:
    rules:
      - { field: title, operator: matches, value: "([unclosed" }
map: { prompt: "x" }
reduce: { type: list }
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidRule { .. })));
    }

    #[test]
    fn test_ai_filter_output_must_include_include() {
        let message = validation_message(load_yaml(
            r#"
name: ai
input: { items: [] }
filter:
  type: ai
  ai: { prompt: "x", output: [reason] }
map: { prompt: "x" }
reduce: { type: list }
"#,
        ));
        assert!(message.contains("'include'"));
    }

    #[test]
    fn test_zero_parallel_rejected() {
        let message = validation_message(load_yaml(
            r#"
name: p
input: { items: [] }
map: { prompt: "x", parallel: 0 }
reduce: { type: list }
"#,
        ));
        assert!(message.contains("at least 1"));
    }

    #[test]
    fn test_yaml_syntax_error() {
        let result = load_yaml("name: [unterminated");
        assert!(matches!(result, Err(ConfigError::ParseYaml(_))));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("p.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("p.JSON")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("p.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("pipeline")), ConfigFormat::Yaml);
    }
}
