use std::time::{Duration, Instant};

use futures::future::join_all;
use llmlab_registry::{EndpointConfig, EndpointKind, ModelRegistry};
use reqwest::Client;
use serde::Serialize;

use crate::matcher::match_model;
use crate::result::{MatchedModel, ProbeError, ProbeResult};
use crate::{llama_cpp, ollama, vllm};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const BENCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Budget for each individual HTTP call.
    pub request_timeout: Duration,
    pub bench_timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            request_timeout: PROBE_TIMEOUT,
            bench_timeout: BENCH_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStatus {
    pub endpoint: EndpointConfig,
    pub result: ProbeResult,
}

#[derive(Debug, Clone)]
pub struct Prober {
    pub(crate) client: Client,
    pub(crate) options: ProbeOptions,
}

impl Prober {
    pub fn new(options: ProbeOptions) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .connect_timeout(options.request_timeout)
            .no_proxy()
            .build()
            .map_err(|err| ProbeError::Client(err.to_string()))?;
        Ok(Self { client, options })
    }

    /// Probes one endpoint. Never fails: problems become an offline result.
    pub async fn probe(
        &self,
        endpoint: &EndpointConfig,
        models: Option<&ModelRegistry>,
    ) -> ProbeResult {
        let started_at = Instant::now();
        let timeout = self.options.request_timeout;
        let outcome = match &endpoint.kind {
            EndpointKind::LlamaCpp => llama_cpp::probe(&self.client, endpoint, timeout).await,
            EndpointKind::Vllm => vllm::probe(&self.client, endpoint, timeout).await,
            EndpointKind::Ollama => ollama::probe(&self.client, endpoint, timeout).await,
            EndpointKind::Unknown(kind) => Err(ProbeError::UnsupportedKind(kind.clone())),
        };
        let elapsed = started_at.elapsed();

        match outcome {
            Ok(report) => {
                let metadata = models.and_then(|models| {
                    let probed = report.model_path.as_deref()?;
                    match_model(probed, models).map(|(key, metadata)| MatchedModel {
                        key: key.to_string(),
                        metadata: metadata.clone(),
                    })
                });
                tracing::debug!(
                    endpoint = %endpoint.id,
                    model = ?report.model,
                    matched = ?metadata.as_ref().map(|m| m.key.as_str()),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "endpoint online"
                );
                ProbeResult::online(report, elapsed).with_metadata(metadata)
            }
            Err(err) => {
                tracing::debug!(
                    endpoint = %endpoint.id,
                    kind = %endpoint.kind,
                    error = %err,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "endpoint offline"
                );
                ProbeResult::offline(err.to_string(), elapsed)
            }
        }
    }

    /// Probes every endpoint concurrently and returns one status per endpoint,
    /// ordered by ascending priority. Equal priorities keep registry order.
    pub async fn probe_all(
        &self,
        endpoints: &[EndpointConfig],
        models: Option<&ModelRegistry>,
    ) -> Vec<EndpointStatus> {
        let probes = endpoints.iter().map(|endpoint| async move {
            EndpointStatus {
                endpoint: endpoint.clone(),
                result: self.probe(endpoint, models).await,
            }
        });
        let mut statuses = join_all(probes).await;
        statuses.sort_by_key(|status| status.endpoint.priority);
        statuses
    }
}

/// First online endpoint in priority order.
pub fn active_endpoint(statuses: &[EndpointStatus]) -> Option<&EndpointStatus> {
    statuses.iter().find(|status| status.result.is_online())
}
