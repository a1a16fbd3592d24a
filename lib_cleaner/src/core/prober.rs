//! # Latency Prober
//!
//! Issues one delay query per candidate against the running engine, in
//! candidate order, with no retries. Queries are sequential: the engine is
//! a single shared instance addressed by proxy name. A failing candidate
//! is dropped and probing moves on.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::configs::ProbeSettings;
use crate::core::control_api::ControlClient;
use crate::core::dedup::CandidateSet;
use crate::core::supervisor::EngineSupervisor;
use crate::errors::{CleanerError, ProbeError};
use crate::model::{NodeDescriptor, ProbeResult};

/// What happened to one candidate.
#[derive(Debug)]
pub enum ProbeOutcome {
    Passed(u32),
    /// Answered, but at or above the ceiling.
    TooSlow(u32),
    Failed(ProbeError),
}

pub struct LatencyProber<'a> {
    settings: &'a ProbeSettings,
}

impl<'a> LatencyProber<'a> {
    pub fn new(settings: &'a ProbeSettings) -> Self {
        Self { settings }
    }

    /// Probes every candidate and keeps those under the latency ceiling.
    ///
    /// Stops early, returning what was collected so far, once `cancel`
    /// fires.
    ///
    /// # Errors
    /// `CleanerError::EngineNotReady` if the supervisor is not `Ready`.
    pub async fn probe_all(
        &self,
        engine: &EngineSupervisor,
        candidates: &CandidateSet,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProbeResult>, CleanerError> {
        let control = engine.control().ok_or(CleanerError::EngineNotReady)?;
        let mut retained = Vec::new();

        for node in candidates {
            if cancel.is_cancelled() {
                info!(probed = retained.len(), "Probing cancelled");
                break;
            }
            let outcome = tokio::select! {
                outcome = self.probe_one(control, node) => outcome,
                _ = cancel.cancelled() => {
                    info!("Probing cancelled mid-query");
                    break;
                }
            };
            match outcome {
                ProbeOutcome::Passed(latency_ms) => {
                    debug!(node = node.name().unwrap_or_default(), latency_ms, "Probe passed");
                    retained.push(ProbeResult { node: node.clone(), latency_ms });
                }
                ProbeOutcome::TooSlow(latency_ms) => {
                    debug!(node = node.name().unwrap_or_default(), latency_ms, "Probe over ceiling");
                }
                ProbeOutcome::Failed(e) => {
                    debug!(node = node.name().unwrap_or_default(), "Probe failed: {}", e);
                }
            }
        }

        info!(retained = retained.len(), tested = candidates.len(), "Probing finished");
        Ok(retained)
    }

    /// Measures one node. Never fails; failures become `ProbeOutcome::Failed`.
    pub async fn probe_one(&self, control: &ControlClient, node: &NodeDescriptor) -> ProbeOutcome {
        let Some(name) = node.name() else {
            return ProbeOutcome::Failed(ProbeError::BadName(node.identity()));
        };
        let measured = control
            .delay(
                name,
                &self.settings.target_url,
                self.settings.engine_timeout_ms,
                self.settings.request_timeout,
            )
            .await;
        match measured {
            Ok(ms) if ms < self.settings.max_latency_ms => ProbeOutcome::Passed(ms),
            Ok(ms) => ProbeOutcome::TooSlow(ms),
            Err(e) => ProbeOutcome::Failed(e),
        }
    }
}
