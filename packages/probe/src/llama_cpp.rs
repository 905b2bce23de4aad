use std::time::Duration;

use llmlab_registry::EndpointConfig;
use reqwest::Client;
use serde::Deserialize;

use crate::http::get_json;
use crate::matcher::model_display_name;
use crate::result::{BackendReport, ProbeError};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Props {
    #[serde(default)]
    model_path: Option<String>,
    #[serde(default)]
    model_alias: Option<String>,
    #[serde(default)]
    default_generation_settings: Option<GenerationSettings>,
    #[serde(default)]
    n_ctx: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerationSettings {
    #[serde(default)]
    n_ctx: Option<u64>,
}

pub(crate) async fn probe(
    client: &Client,
    endpoint: &EndpointConfig,
    timeout: Duration,
) -> Result<BackendReport, ProbeError> {
    let props: Props = get_json(client, &endpoint.url_for("/props"), timeout).await?;
    Ok(normalize(props))
}

pub(crate) fn normalize(props: Props) -> BackendReport {
    let raw = props
        .model_path
        .filter(|path| !path.trim().is_empty())
        .or(props.model_alias.filter(|alias| !alias.trim().is_empty()));
    let context = props
        .default_generation_settings
        .and_then(|settings| settings.n_ctx)
        .or(props.n_ctx)
        .unwrap_or(0);

    BackendReport {
        model: raw.as_deref().map(|raw| model_display_name(raw).to_string()),
        model_path: raw,
        context_window: Some(context),
    }
}
