//! Builds the item set from the `input` block.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::config::schema::{InputConfig, InputSource};
use crate::error::InputError;
use crate::item::{FieldValue, Item};
use crate::prompt::resolve_path;

/// Loads the configured items, applies `limit` and coerces numeric ids.
/// File paths are resolved against `pipeline_directory`.
pub async fn load_items(
    input: &InputConfig,
    pipeline_directory: &Path,
) -> Result<Vec<Item>, InputError> {
    let mut items = match (&input.items, &input.from) {
        (Some(items), _) => items.clone(),
        (None, Some(source)) => load_source(source, pipeline_directory).await?,
        (None, None) => return Err(InputError::NoSource),
    };

    if let Some(limit) = input.limit {
        items.truncate(limit);
    }

    Ok(items.iter().map(Item::with_coerced_id).collect())
}

async fn load_source(
    source: &InputSource,
    pipeline_directory: &Path,
) -> Result<Vec<Item>, InputError> {
    let (path, delimiter) = match source {
        InputSource::Csv { path, delimiter } => (path, Some(delimiter.unwrap_or(','))),
        InputSource::Json { path } => (path, None),
    };

    let path = resolve_path(pipeline_directory, path);
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| InputError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

    let items = match delimiter {
        Some(delimiter) => parse_csv(&content, delimiter, &path)?,
        None => parse_json(&content, &path)?,
    };

    debug!("Loaded {} items from {}", items.len(), path.display());
    Ok(items)
}

/// Header row names the fields; every cell is kept as text. Short rows
/// simply lack the trailing fields.
pub fn parse_csv(content: &str, delimiter: char, path: &Path) -> Result<Vec<Item>, InputError> {
    let csv_error = |source: csv::Error| InputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(csv_error)?.clone();

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let item: Item = headers
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| (name.to_string(), FieldValue::from(cell)))
            .collect();
        items.push(item);
    }

    Ok(items)
}

fn delimiter_byte(delimiter: char) -> Result<u8, InputError> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(InputError::InvalidDelimiter { delimiter })
    }
}

pub fn parse_json(content: &str, path: &Path) -> Result<Vec<Item>, InputError> {
    let value: Value = serde_json::from_str(content).map_err(|e| InputError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    let Value::Array(values) = value else {
        return Err(InputError::NotAnArray {
            path: path.to_path_buf(),
        });
    };

    values
        .into_iter()
        .map(|v| {
            Item::from_json(v).ok_or_else(|| InputError::NotAnArray {
                path: path.to_path_buf(),
            })
        })
        .collect()
}
