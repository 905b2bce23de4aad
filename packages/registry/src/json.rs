use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub(crate) fn read_json_file(path: &Path) -> Option<Value> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "registry file not readable");
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "registry file is not valid json");
            None
        }
    }
}

/// Parses every non-metadata entry of a keyed registry object, in document
/// order. Keys starting with `_` hold metadata blocks; entries that do not
/// match `T` are dropped with a warning.
pub(crate) fn keyed_entries<T: DeserializeOwned>(
    map: Map<String, Value>,
    registry: &str,
) -> Vec<(String, T)> {
    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        if key.starts_with('_') {
            continue;
        }
        match serde_json::from_value::<T>(value) {
            Ok(entry) => entries.push((key, entry)),
            Err(err) => {
                tracing::warn!(registry, key = %key, error = %err, "skipping malformed registry entry");
            }
        }
    }
    entries
}
