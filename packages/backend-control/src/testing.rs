//! In-memory stand-in for the switch tool.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::status::StatusProbe;
use crate::{BackendControl, CommandOutcome, SwitchTarget};

#[derive(Debug)]
pub struct FakeBackendControl {
    status: StatusProbe,
    switch_outcome: CommandOutcome,
    stop_outcome: CommandOutcome,
    calls: Mutex<Vec<String>>,
}

impl FakeBackendControl {
    pub fn new(status: StatusProbe) -> Self {
        Self {
            status,
            switch_outcome: CommandOutcome {
                success: true,
                output: "switched".to_string(),
            },
            stop_outcome: CommandOutcome {
                success: true,
                output: "stopped".to_string(),
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_switch_outcome(mut self, outcome: CommandOutcome) -> Self {
        self.switch_outcome = outcome;
        self
    }

    pub fn with_stop_outcome(mut self, outcome: CommandOutcome) -> Self {
        self.stop_outcome = outcome;
        self
    }

    /// Commands received so far, e.g. `["status", "switch vllm"]`.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl BackendControl for FakeBackendControl {
    async fn status(&self) -> StatusProbe {
        self.record("status".to_string());
        self.status.clone()
    }

    async fn switch(&self, target: SwitchTarget) -> CommandOutcome {
        self.record(format!("switch {target}"));
        self.switch_outcome.clone()
    }

    async fn stop(&self) -> CommandOutcome {
        self.record("stop".to_string());
        self.stop_outcome.clone()
    }
}
