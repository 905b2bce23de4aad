use std::time::Duration;

use llmlab_registry::EndpointConfig;
use reqwest::Client;
use serde::Deserialize;

use crate::http::get_json;
use crate::result::{BackendReport, ProbeError};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ModelListing {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
    #[serde(default)]
    context_length: Option<u64>,
}

/// Running models first; when nothing is loaded the installed tags decide
/// what to report. Reachable when either call succeeds; an idle server whose
/// tag listing fails reports "no models".
pub(crate) async fn probe(
    client: &Client,
    endpoint: &EndpointConfig,
    timeout: Duration,
) -> Result<BackendReport, ProbeError> {
    let running: Result<ModelListing, ProbeError> =
        get_json(client, &endpoint.url_for("/api/ps"), timeout).await;

    let ps_error = match running {
        Ok(listing) => {
            if let Some(report) = running_report(listing) {
                return Ok(report);
            }
            None
        }
        Err(err) => {
            tracing::debug!(endpoint = %endpoint.id, error = %err, "ollama /api/ps failed");
            Some(err)
        }
    };

    match get_json::<ModelListing>(client, &endpoint.url_for("/api/tags"), timeout).await {
        Ok(tags) => Ok(available_report(tags)),
        Err(err) => match ps_error {
            Some(ps_error) => Err(ps_error),
            None => {
                tracing::debug!(endpoint = %endpoint.id, error = %err, "ollama /api/tags failed");
                Ok(available_report(ModelListing::default()))
            }
        },
    }
}

pub(crate) fn running_report(listing: ModelListing) -> Option<BackendReport> {
    listing.models.into_iter().next().map(|model| BackendReport {
        model: Some(model.name.clone()),
        model_path: Some(model.name),
        context_window: model.context_length,
    })
}

pub(crate) fn available_report(tags: ModelListing) -> BackendReport {
    let summary = match tags.models.len() {
        0 => "no models".to_string(),
        1 => "1 model available (none loaded)".to_string(),
        count => format!("{count} models available (none loaded)"),
    };
    BackendReport {
        model: Some(summary),
        model_path: None,
        context_window: None,
    }
}
