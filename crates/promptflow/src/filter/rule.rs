use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::config::schema::{Rule, RuleMode, RuleOperator, RuleSet};
use crate::item::{FieldValue, Item};

/// Evaluates one rule against an item. Never fails: an operand that cannot
/// be coerced makes the rule false.
pub fn evaluate(rule: &Rule, item: &Item) -> bool {
    let pattern = match rule.operator {
        RuleOperator::Matches => rule.value.as_str().and_then(|p| Regex::new(p).ok()),
        _ => None,
    };
    evaluate_with(rule, item, pattern.as_ref())
}

/// Combines the rules of `rule_set` with AND (`all`) or OR (`any`). An
/// empty rule list includes everything.
pub fn evaluate_rule_set(rule_set: &RuleSet, item: &Item) -> bool {
    RuleEvaluator::new(rule_set).matches(item)
}

/// A rule set with its regex operands compiled once.
pub struct RuleEvaluator<'a> {
    rule_set: &'a RuleSet,
    compiled_patterns: HashMap<String, Regex>,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(rule_set: &'a RuleSet) -> Self {
        let mut compiled_patterns = HashMap::new();
        for rule in &rule_set.rules {
            if rule.operator != RuleOperator::Matches {
                continue;
            }
            if let Some(pattern) = rule.value.as_str() {
                if !compiled_patterns.contains_key(pattern) {
                    if let Ok(regex) = Regex::new(pattern) {
                        compiled_patterns.insert(pattern.to_string(), regex);
                    }
                }
            }
        }

        Self {
            rule_set,
            compiled_patterns,
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        let mut results = self.rule_set.rules.iter().map(|rule| {
            let pattern = rule
                .value
                .as_str()
                .and_then(|p| self.compiled_patterns.get(p));
            evaluate_with(rule, item, pattern)
        });

        match self.rule_set.mode {
            RuleMode::All => results.all(|passed| passed),
            RuleMode::Any => self.rule_set.rules.is_empty() || results.any(|passed| passed),
        }
    }
}

fn evaluate_with(rule: &Rule, item: &Item, pattern: Option<&Regex>) -> bool {
    let field = match item.get(&rule.field) {
        Some(value) if !value.is_null() => value,
        // Missing field: only the negated operators hold.
        _ => {
            return matches!(
                rule.operator,
                RuleOperator::NotEquals | RuleOperator::NotContains | RuleOperator::NotIn
            )
        }
    };

    match rule.operator {
        RuleOperator::Equals => values_equal(field, &rule.value),
        RuleOperator::NotEquals => !values_equal(field, &rule.value),
        RuleOperator::Gt => compare_numbers(field, &rule.value, |a, b| a > b),
        RuleOperator::Gte => compare_numbers(field, &rule.value, |a, b| a >= b),
        RuleOperator::Lt => compare_numbers(field, &rule.value, |a, b| a < b),
        RuleOperator::Lte => compare_numbers(field, &rule.value, |a, b| a <= b),
        RuleOperator::Contains => field.to_string().contains(&operand_text(&rule.value)),
        RuleOperator::NotContains => !field.to_string().contains(&operand_text(&rule.value)),
        RuleOperator::In => in_list(field, &rule.value),
        RuleOperator::NotIn => !in_list(field, &rule.value),
        RuleOperator::Matches => pattern.is_some_and(|re| re.is_match(&field.to_string())),
    }
}

/// Numeric equality when both sides are numbers, text equality otherwise.
fn values_equal(field: &FieldValue, operand: &Value) -> bool {
    let operand = FieldValue::from(operand.clone());
    match (field.as_number(), operand.as_number()) {
        (Some(a), Some(b)) => a == b,
        _ => field.to_string() == operand.to_string(),
    }
}

fn compare_numbers(field: &FieldValue, operand: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    let operand = FieldValue::from(operand.clone());
    match (field.as_number(), operand.as_number()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn in_list(field: &FieldValue, operand: &Value) -> bool {
    match operand {
        Value::Array(values) => values.iter().any(|v| values_equal(field, v)),
        _ => false,
    }
}

fn operand_text(operand: &Value) -> String {
    FieldValue::from(operand.clone()).to_string()
}
