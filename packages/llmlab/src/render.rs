//! Plain-text rendering for terminal and chat output.

use llmlab_backend_control::StatusProbe;
use llmlab_probe::{BenchResult, EndpointStatus};
use llmlab_registry::{ModelRegistry, ModelSpeeds};

pub fn render_backend(probe: &StatusProbe) -> String {
    let status = match probe {
        StatusProbe::Reported(status) => status,
        StatusProbe::Degraded { .. } => return "Backend: unknown (status unavailable)".to_string(),
    };

    let mut lines = Vec::new();
    match &status.backend {
        Some(active) => lines.push(format!(
            "Backend: {} (active: {active})",
            status.state.as_str()
        )),
        None => lines.push(format!("Backend: {}", status.state.as_str())),
    }
    if !status.saved.is_empty() {
        lines.push(format!("Saved: {}", status.saved.join(", ")));
    }
    for gpu in status.gpus.iter().flatten() {
        lines.push(format!("GPU {}: {} / {} MiB", gpu.id, gpu.used, gpu.total));
    }
    if let Some(slots) = status.slots.as_ref().filter(|slots| !slots.is_empty()) {
        let slots: Vec<String> = slots
            .iter()
            .map(|slot| {
                let mut text = format!("{} {}", slot.id, slot.state.as_deref().unwrap_or("?"));
                if let Some(model) = &slot.model {
                    text.push_str(&format!(" ({model})"));
                }
                text
            })
            .collect();
        lines.push(format!("Slots: {}", slots.join(", ")));
    }
    lines.join("\n")
}

/// One line per endpoint in priority order; `*` marks the active endpoint.
pub fn render_endpoints(statuses: &[EndpointStatus], active: Option<&EndpointStatus>) -> String {
    if statuses.is_empty() {
        return "Endpoints: none configured".to_string();
    }
    let active_id = active.map(|status| status.endpoint.id.as_str());
    let mut out = String::from("Endpoints:");
    for status in statuses {
        let endpoint = &status.endpoint;
        let marker = if active_id == Some(endpoint.id.as_str()) {
            '*'
        } else {
            ' '
        };
        let result = &status.result;
        let detail = if result.is_online() {
            let mut detail = result.model().unwrap_or("unknown").to_string();
            if let Some(matched) = result.metadata() {
                detail.push_str(&format!(" [{}]", matched.metadata.alias));
            }
            if let Some(ctx) = result.context_window().filter(|ctx| *ctx > 0) {
                detail.push_str(&format!("  ctx {ctx}"));
            }
            detail
        } else {
            format!("offline: {}", result.error().unwrap_or("unknown error"))
        };
        out.push_str(&format!(
            "\n{marker} {:>3}  {} ({})  {detail}  {}ms",
            endpoint.priority,
            endpoint.name,
            endpoint.kind,
            result.latency_ms()
        ));
    }
    out
}

pub fn render_active(active: Option<&EndpointStatus>) -> String {
    match active {
        Some(status) => format!(
            "Active: {} ({})",
            status.endpoint.name,
            status.result.model().unwrap_or("unknown")
        ),
        None => "No endpoint is online.".to_string(),
    }
}

pub fn render_models(models: &ModelRegistry) -> String {
    if models.is_empty() {
        return "Models: none in catalog".to_string();
    }
    let mut out = String::from("Models:");
    for (_, meta) in models.iter() {
        out.push_str(&format!("\n  {}  {}  ctx {}", meta.alias, meta.name, meta.context));
        if !meta.vram_fit.is_empty() {
            out.push_str(&format!("  {}", meta.vram_fit));
        }
        if let Some(speeds) = render_speeds(&meta.speeds) {
            out.push_str(&format!("  {speeds}"));
        }
    }
    out
}

fn render_speeds(speeds: &ModelSpeeds) -> Option<String> {
    let pair = |empty: Option<f64>, full: Option<f64>| -> Option<String> {
        if empty.is_none() && full.is_none() {
            return None;
        }
        let fmt = |value: Option<f64>| value.map_or("?".to_string(), |v| format!("{v:.0}"));
        Some(format!("{}/{}", fmt(empty), fmt(full)))
    };
    let mut parts = Vec::new();
    if let Some(generation) = pair(speeds.gen_empty, speeds.gen_full) {
        parts.push(format!("gen {generation} tok/s"));
    }
    if let Some(prompt) = pair(speeds.pp_empty, speeds.pp_full) {
        parts.push(format!("pp {prompt} tok/s"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("  "))
    }
}

pub fn render_bench(status: &EndpointStatus, bench: &BenchResult) -> String {
    let mut parts = Vec::new();
    if let Some(tps) = bench.generation_tps {
        parts.push(format!("{tps:.1} tok/s generation"));
    }
    if let Some(tps) = bench.prompt_tps {
        parts.push(format!("{tps:.1} tok/s prompt"));
    }
    if let Some(tokens) = bench.completion_tokens {
        parts.push(format!("{tokens} tokens"));
    }
    parts.push(format!("{:.1}s", bench.elapsed_ms as f64 / 1000.0));
    format!(
        "Benchmark {} ({}): {}",
        status.endpoint.name,
        status.result.model().unwrap_or("unknown"),
        parts.join(", ")
    )
}
