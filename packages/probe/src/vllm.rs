use std::time::Duration;

use llmlab_registry::EndpointConfig;
use reqwest::Client;
use serde::Deserialize;

use crate::http::get_json;
use crate::result::{BackendReport, ProbeError};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ModelList {
    #[serde(default)]
    data: Vec<ModelCard>,
}

#[derive(Debug, Deserialize)]
struct ModelCard {
    id: String,
    #[serde(default)]
    max_model_len: Option<u64>,
}

pub(crate) async fn probe(
    client: &Client,
    endpoint: &EndpointConfig,
    timeout: Duration,
) -> Result<BackendReport, ProbeError> {
    let list: ModelList = get_json(client, &endpoint.url_for("/v1/models"), timeout).await?;
    Ok(normalize(list))
}

pub(crate) fn normalize(list: ModelList) -> BackendReport {
    match list.data.into_iter().next() {
        Some(card) => BackendReport {
            model: Some(card.id.clone()),
            model_path: Some(card.id),
            context_window: card.max_model_len,
        },
        None => BackendReport {
            model: Some("unknown".to_string()),
            model_path: None,
            context_window: None,
        },
    }
}
