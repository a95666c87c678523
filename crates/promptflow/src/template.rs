//! `{{name}}` prompt templates.
//!
//! A template is parsed once into literal and placeholder segments and then
//! rendered per item. Placeholders without a value render as an empty string.

use crate::item::Item;

/// Reduce-time placeholder holding the number of successful map results.
pub const COUNT_PLACEHOLDER: &str = "COUNT";
/// Reduce-time placeholder holding the JSON-serialized successful map outputs.
pub const RESULTS_PLACEHOLDER: &str = "RESULTS";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                break;
            };

            let name = after_open[..close].trim();
            if name.is_empty() || name.contains('{') {
                // Not a placeholder here; keep one brace and rescan from the next.
                literal.push_str(&rest[..open + 1]);
                rest = &rest[open + 1..];
                continue;
            }

            literal.push_str(&rest[..open]);
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder(name.to_string()));
            rest = &after_open[close + 2..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    pub fn render_with<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = lookup(name) {
                        out.push_str(&value);
                    }
                }
            }
        }
        out
    }

    pub fn render(&self, item: &Item) -> String {
        self.render_with(|name| item.get(name).map(|v| v.to_string()))
    }

    /// Renders the reduce prompt. `{{COUNT}}` and `{{RESULTS}}` take priority
    /// over same-named fields in `context`.
    pub fn render_aggregate(&self, count: usize, results: &str, context: &Item) -> String {
        self.render_with(|name| match name {
            COUNT_PLACEHOLDER => Some(count.to_string()),
            RESULTS_PLACEHOLDER => Some(results.to_string()),
            other => context.get(other).map(|v| v.to_string()),
        })
    }
}

/// One-shot rendering of `template` against `item`.
pub fn render(template: &str, item: &Item) -> String {
    Template::parse(template).render(item)
}
