use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json::{keyed_entries, read_json_file};

/// Measured token rates, in tokens per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpeeds {
    /// Generation with an empty context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen_empty: Option<f64>,
    /// Generation with a full context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen_full: Option<f64>,
    /// Prompt processing with an empty context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_empty: Option<f64>,
    /// Prompt processing with a full context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_full: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub alias: String,
    pub name: String,
    /// Context window in tokens.
    #[serde(default)]
    pub context: u64,
    #[serde(default)]
    pub vram_fit: String,
    #[serde(default)]
    pub speeds: ModelSpeeds,
}

/// Model catalog keyed by path-like identifiers, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: IndexMap<String, ModelMetadata>,
}

impl ModelRegistry {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, ModelMetadata)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelMetadata)> {
        self.entries.iter().map(|(key, meta)| (key.as_str(), meta))
    }

    pub fn get(&self, key: &str) -> Option<&ModelMetadata> {
        self.entries.get(key)
    }

    pub fn find_by_alias(&self, alias: &str) -> Option<(&str, &ModelMetadata)> {
        self.iter()
            .find(|(_, meta)| meta.alias.eq_ignore_ascii_case(alias))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn load_models(path: &Path) -> Option<ModelRegistry> {
    let value = read_json_file(path)?;
    let Value::Object(map) = value else {
        tracing::warn!(path = %path.display(), "models registry is not a json object");
        return None;
    };
    Some(ModelRegistry::from_entries(keyed_entries::<ModelMetadata>(
        map, "models",
    )))
}
