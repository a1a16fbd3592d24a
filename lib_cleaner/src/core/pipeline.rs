//! # Pipeline
//!
//! One run: fetch → decode → dedup → engine config → engine start → probe
//! → engine stop → rank → publish.
//!
//! ## Guarantees:
//! - **One run at a time.** A run takes an atomic run guard before doing
//!   anything; a trigger that finds a run active returns
//!   `RunOutcome::AlreadyRunning` and does no work. The guard is released
//!   on every exit path by `Drop`.
//! - **Engine always stopped.** Once the engine has started, the stop step
//!   runs whatever the probing result was. Cancellation only shortens
//!   probing.
//! - **Published set survives failures.** Only a completed run publishes;
//!   `EmptyCandidates` and `EngineStart` leave the previous set in place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::configs::PipelineSettings;
use crate::core::dedup::deduplicate;
use crate::core::engine_config::EngineConfig;
use crate::core::prober::LatencyProber;
use crate::core::ranking::rank;
use crate::core::store::{ResultStore, Snapshot};
use crate::core::supervisor::EngineSupervisor;
use crate::errors::CleanerError;
use crate::retrieve::fetcher::SourceFetcher;
use crate::retrieve::sources::resolve_source_urls;

/// How a trigger ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A new working set was published.
    Published { retained: usize, tested: usize },
    /// Another run held the guard; nothing was done.
    AlreadyRunning,
    /// Shutdown was requested; nothing was published.
    Cancelled,
}

/// Clears the running flag when dropped.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Pipeline {
    settings: PipelineSettings,
    fetcher: SourceFetcher,
    supervisor: Mutex<EngineSupervisor>,
    store: ResultStore,
    running: AtomicBool,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Validates settings and builds the HTTP clients.
    pub fn new(settings: PipelineSettings) -> Result<Self, CleanerError> {
        settings.validate()?;
        let fetcher = SourceFetcher::new(&settings.sources)?;
        let supervisor = EngineSupervisor::new(settings.engine.clone())?;
        Ok(Self {
            settings,
            fetcher,
            supervisor: Mutex::new(supervisor),
            store: ResultStore::new(),
            running: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        })
    }

    /// Read-only view of the published working set.
    pub fn working_set(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether an engine subprocess is currently tracked.
    pub async fn engine_active(&self) -> bool {
        self.supervisor.lock().await.is_active()
    }

    /// Token fired by `shutdown`; runs stop probing when it fires.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the pipeline once unless a run is already active.
    ///
    /// # Errors
    /// `EmptyCandidates` when no node survived fetch and deduplication, and
    /// `EngineStart` when the engine could not be brought up, including when
    /// its config could not be written. The published set is unchanged in
    /// every error case.
    pub async fn run_pipeline_once(&self) -> Result<RunOutcome, CleanerError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            info!("Pipeline run already in progress, trigger coalesced");
            return Ok(RunOutcome::AlreadyRunning);
        };
        if self.cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        info!("Starting proxy cleanup run");
        let urls = resolve_source_urls(&self.settings.sources, Utc::now());
        let mut raw = self.fetcher.fetch(&urls).await;

        if self.settings.accumulate_verified {
            let previous = self.store.snapshot();
            if !previous.is_empty() {
                info!(count = previous.len(), "Adding previously verified proxies");
                raw.extend(previous.nodes.iter().cloned());
            }
        }

        let candidates = deduplicate(raw);
        if candidates.is_empty() {
            warn!("No proxies found to test");
            return Err(CleanerError::EmptyCandidates);
        }
        info!(count = candidates.len(), "Total unique proxies to test");

        // The engine cannot come up without its config.
        let config_path = self.settings.engine.config_path();
        EngineConfig::build(&self.settings.engine, &candidates)
            .write(&config_path)
            .map_err(CleanerError::EngineStart)?;

        let mut supervisor = self.supervisor.lock().await;
        supervisor.start(&config_path).await?;
        info!("Engine ready, testing connectivity");

        let probed = LatencyProber::new(&self.settings.probe)
            .probe_all(&supervisor, &candidates, &self.cancel)
            .await;

        if let Err(e) = supervisor.stop().await {
            error!(alert = true, "Engine stop failed, process may be orphaned: {}", e);
        }
        drop(supervisor);

        let results = probed?;
        if self.cancel.is_cancelled() {
            info!("Run cancelled before publishing");
            return Ok(RunOutcome::Cancelled);
        }

        let tested = candidates.len();
        let working_set = rank(results);
        let retained = working_set.len();
        self.store.publish(working_set);
        info!(retained, tested, "Cleanup finished");

        Ok(RunOutcome::Published { retained, tested })
    }

    /// Stops in-flight probing and terminates any tracked engine.
    ///
    /// Later triggers return `RunOutcome::Cancelled`.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut supervisor = self.supervisor.lock().await;
        if let Err(e) = supervisor.stop().await {
            error!(alert = true, "Engine stop failed during shutdown: {}", e);
        }
        info!("Pipeline shut down");
    }
}
