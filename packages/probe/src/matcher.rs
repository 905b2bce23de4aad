//! Fuzzy matching of probed model identifiers against the model catalog.

use llmlab_registry::{ModelMetadata, ModelRegistry};

const WEIGHT_EXTENSIONS: [&str; 4] = [".gguf", ".ggml", ".safetensors", ".bin"];

/// Last path segment with any weight-file extension removed, case preserved.
pub fn model_display_name(raw: &str) -> &str {
    let segment = raw
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    for extension in WEIGHT_EXTENSIONS {
        if segment.len() > extension.len() {
            let split = segment.len() - extension.len();
            if segment.is_char_boundary(split)
                && segment[split..].eq_ignore_ascii_case(extension)
            {
                return &segment[..split];
            }
        }
    }
    segment
}

pub fn normalize_model_id(raw: &str) -> String {
    model_display_name(raw).to_lowercase()
}

/// Finds the catalog entry for a probed identifier.
///
/// Exact normalized equality is tried across the whole catalog first; only
/// when nothing is equal does containment in either direction count. Both
/// passes return the first hit in declaration order.
pub fn match_model<'a>(
    probed: &str,
    registry: &'a ModelRegistry,
) -> Option<(&'a str, &'a ModelMetadata)> {
    let needle = normalize_model_id(probed);
    if needle.is_empty() {
        return None;
    }

    let candidates: Vec<(String, &'a str, &'a ModelMetadata)> = registry
        .iter()
        .map(|(key, meta)| (normalize_model_id(key), key, meta))
        .filter(|(normalized, _, _)| !normalized.is_empty())
        .collect();

    if let Some((_, key, meta)) = candidates
        .iter()
        .find(|(normalized, _, _)| *normalized == needle)
    {
        return Some((*key, *meta));
    }

    candidates
        .iter()
        .find(|(normalized, _, _)| normalized.contains(&needle) || needle.contains(normalized.as_str()))
        .map(|(_, key, meta)| (*key, *meta))
}
