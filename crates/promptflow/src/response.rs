//! Parsing of capability responses into structured outputs.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// The parsed output of one capability response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MapOutput {
    /// The configured output fields projected from a JSON response.
    Fields(IndexMap<String, Value>),
    /// Raw response text (free-text mode).
    Text(String),
}

impl MapOutput {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Fields(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            Self::Text(text) => Value::String(text.clone()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Fields(_) => None,
        }
    }

    pub fn as_fields(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Fields(fields) => Some(fields),
            Self::Text(_) => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_fields().and_then(|f| f.get(field))
    }
}

/// Parses `response` according to the configured output fields.
///
/// With no fields the raw text is the output. Otherwise the first JSON object
/// in the response is parsed and exactly the listed fields are kept; fields
/// the response lacks are left out and extra fields are dropped.
pub fn parse_output(response: &str, fields: &[String]) -> Result<MapOutput, String> {
    if fields.is_empty() {
        return Ok(MapOutput::Text(response.to_string()));
    }

    let object = parse_object(response)?;
    let projected = fields
        .iter()
        .filter_map(|field| object.get(field).map(|v| (field.clone(), v.clone())))
        .collect();

    Ok(MapOutput::Fields(projected))
}

/// AI filter verdict: the `include` flag and the optional `reason`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterVerdict {
    pub include: bool,
    pub reason: Option<String>,
}

/// Reads the `include` decision from an AI filter response. Accepts JSON
/// booleans and the strings `"true"`/`"false"`.
pub fn parse_verdict(response: &str) -> Result<FilterVerdict, String> {
    let object = parse_object(response)?;

    let include = match object.get("include") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => true,
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => false,
        Some(other) => return Err(format!("'include' is not a boolean: {}", other)),
        None => return Err("Response has no 'include' field".to_string()),
    };

    let reason = object
        .get("reason")
        .and_then(|r| r.as_str())
        .map(str::to_string);

    Ok(FilterVerdict { include, reason })
}

fn parse_object(response: &str) -> Result<serde_json::Map<String, Value>, String> {
    let json_str = extract_json(response);
    match serde_json::from_str::<Value>(json_str) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("Expected a JSON object, got: {}", other)),
        Err(e) => Err(format!(
            "Failed to parse JSON: {}. Response was: {}",
            e, json_str
        )),
    }
}

/// Extracts the first balanced JSON object from the response, skipping any
/// surrounding prose or code fences. Braces inside strings are ignored.
pub fn extract_json(response: &str) -> &str {
    let start = match response.find('{') {
        Some(idx) => idx,
        None => return response.trim(),
    };

    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end = response.len();

    for (i, c) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    &response[start..end]
}
