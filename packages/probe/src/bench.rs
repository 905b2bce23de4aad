//! Single-shot throughput benchmark against a backend's native generation API.

use std::time::{Duration, Instant};

use llmlab_registry::{EndpointConfig, EndpointKind};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::post_json;
use crate::orchestrator::Prober;
use crate::result::ProbeError;

pub const BENCH_PROMPT: &str = "Write a short paragraph about the history of the bicycle.";
pub const BENCH_MAX_TOKENS: u32 = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchResult {
    /// Generation rate in tokens per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_tps: Option<f64>,
    /// Prompt processing rate in tokens per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Deserialize)]
struct LlamaChatResponse {
    #[serde(default)]
    timings: Option<LlamaTimings>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct LlamaTimings {
    #[serde(default)]
    predicted_per_second: Option<f64>,
    #[serde(default)]
    prompt_per_second: Option<f64>,
    #[serde(default)]
    predicted_n: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    completion_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct VllmCompletionResponse {
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    eval_count: Option<u64>,
    /// Nanoseconds.
    #[serde(default)]
    eval_duration: Option<u64>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    prompt_eval_duration: Option<u64>,
}

impl Prober {
    /// Runs one short generation against `endpoint` using `model`.
    pub async fn benchmark(
        &self,
        endpoint: &EndpointConfig,
        model: &str,
    ) -> Result<BenchResult, ProbeError> {
        let timeout = self.options.bench_timeout;
        let started_at = Instant::now();
        let result = match &endpoint.kind {
            EndpointKind::LlamaCpp => {
                let body = json!({
                    "model": model,
                    "messages": [{"role": "user", "content": BENCH_PROMPT}],
                    "max_tokens": BENCH_MAX_TOKENS,
                    "stream": false,
                });
                let response: LlamaChatResponse = post_json(
                    &self.client,
                    &endpoint.url_for("/v1/chat/completions"),
                    &body,
                    timeout,
                )
                .await?;
                llama_result(response, started_at.elapsed())
            }
            EndpointKind::Vllm => {
                let body = json!({
                    "model": model,
                    "prompt": BENCH_PROMPT,
                    "max_tokens": BENCH_MAX_TOKENS,
                });
                let response: VllmCompletionResponse = post_json(
                    &self.client,
                    &endpoint.url_for("/v1/completions"),
                    &body,
                    timeout,
                )
                .await?;
                vllm_result(response, started_at.elapsed())
            }
            EndpointKind::Ollama => {
                let body = json!({
                    "model": model,
                    "prompt": BENCH_PROMPT,
                    "stream": false,
                    "options": {"num_predict": BENCH_MAX_TOKENS},
                });
                let response: OllamaGenerateResponse = post_json(
                    &self.client,
                    &endpoint.url_for("/api/generate"),
                    &body,
                    timeout,
                )
                .await?;
                ollama_result(response, started_at.elapsed())
            }
            EndpointKind::Unknown(kind) => return Err(ProbeError::UnsupportedKind(kind.clone())),
        };

        tracing::info!(
            endpoint = %endpoint.id,
            model,
            generation_tps = ?result.generation_tps,
            prompt_tps = ?result.prompt_tps,
            elapsed_ms = result.elapsed_ms,
            "benchmark finished"
        );
        Ok(result)
    }
}

fn llama_result(response: LlamaChatResponse, elapsed: Duration) -> BenchResult {
    let timings = response.timings;
    let completion_tokens = timings
        .as_ref()
        .and_then(|t| t.predicted_n)
        .or(response.usage.and_then(|u| u.completion_tokens));
    BenchResult {
        generation_tps: timings.as_ref().and_then(|t| t.predicted_per_second),
        prompt_tps: timings.as_ref().and_then(|t| t.prompt_per_second),
        completion_tokens,
        elapsed_ms: elapsed.as_millis() as u64,
    }
}

fn vllm_result(response: VllmCompletionResponse, elapsed: Duration) -> BenchResult {
    let completion_tokens = response.usage.and_then(|u| u.completion_tokens);
    let seconds = elapsed.as_secs_f64();
    BenchResult {
        generation_tps: completion_tokens
            .filter(|_| seconds > 0.0)
            .map(|tokens| tokens as f64 / seconds),
        prompt_tps: None,
        completion_tokens,
        elapsed_ms: elapsed.as_millis() as u64,
    }
}

fn ollama_result(response: OllamaGenerateResponse, elapsed: Duration) -> BenchResult {
    BenchResult {
        generation_tps: rate(response.eval_count, response.eval_duration),
        prompt_tps: rate(response.prompt_eval_count, response.prompt_eval_duration),
        completion_tokens: response.eval_count,
        elapsed_ms: elapsed.as_millis() as u64,
    }
}

fn rate(count: Option<u64>, duration_ns: Option<u64>) -> Option<f64> {
    match (count, duration_ns) {
        (Some(count), Some(ns)) if ns > 0 => Some(count as f64 / (ns as f64 / 1e9)),
        _ => None,
    }
}
