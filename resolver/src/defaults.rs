//! Defaults files: record defaults loaded from JSON or YAML.
//!
//! A defaults file holds one object keyed by root destination name; each
//! entry is a (possibly partial) instance object whose values override the
//! schema defaults before parsing. YAML documents are converted to JSON
//! values on load so the rest of the pipeline sees a single representation.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ResolveError, Result};

/// Loads a defaults file, picking the format from the extension
/// (`.yaml`/`.yml` for YAML, anything else JSON).
pub fn load_defaults(path: &Path) -> Result<Map<String, Value>> {
    debug!(path = %path.display(), "loading defaults file");
    let raw = fs::read_to_string(path)?;
    let value: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)?,
        _ => serde_json::from_str(&raw)?,
    };
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ResolveError::DefaultsFormat {
            path: path.display().to_string(),
            detail: format!("expected a top-level object, got {}", kind_name(&other)),
        }),
    }
}

/// Overlays `over` onto `base`: objects merge recursively by key, anything
/// else in `over` replaces the base value.
pub fn merge_defaults(base: &mut Map<String, Value>, over: Map<String, Value>) {
    for (key, value) in over {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_defaults(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
