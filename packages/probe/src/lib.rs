//! Health probes for llama.cpp, vLLM and Ollama endpoints.
//!
//! Each protocol module owns its wire types and turns a native status payload
//! into a [`BackendReport`]. [`Prober`] runs the probes with per-call
//! timeouts, attaches catalog metadata and orders the results by priority.

pub mod bench;
mod http;
mod llama_cpp;
pub mod matcher;
mod ollama;
mod orchestrator;
mod result;
#[cfg(test)]
mod test_server;
mod vllm;

pub use bench::BenchResult;
pub use matcher::{match_model, model_display_name, normalize_model_id};
pub use orchestrator::{active_endpoint, EndpointStatus, ProbeOptions, Prober};
pub use result::{BackendReport, MatchedModel, ProbeError, ProbeResult};
