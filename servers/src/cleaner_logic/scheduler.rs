use std::sync::Arc;
use std::time::Duration;

use lib_cleaner::{CleanerError, Pipeline, RunOutcome};
use tokio::time::{interval, MissedTickBehavior};
use tokio_graceful::ShutdownGuard;
use tracing::{error, info, warn};

/// Runs the pipeline now and then once per `period` until shutdown.
///
/// A tick that lands while a run (scheduled or triggered) is still going
/// is coalesced by the pipeline itself.
pub async fn run(pipeline: Arc<Pipeline>, period: Duration, guard: ShutdownGuard) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = period.as_secs(), "Scheduler started");

    loop {
        tokio::select! {
            _ = guard.cancelled() => {
                info!("Scheduler received shutdown signal.");
                break;
            }
            _ = ticker.tick() => {
                let run = run_logged(&pipeline, "scheduled");
                tokio::pin!(run);
                tokio::select! {
                    _ = &mut run => {}
                    _ = guard.cancelled() => {
                        // Let the run wind down so the engine is stopped by it.
                        info!("Shutdown during scheduled run, cancelling.");
                        pipeline.cancellation_token().cancel();
                        run.await;
                        break;
                    }
                }
            }
        }
    }
}

/// Runs once and reports the outcome in the log.
pub async fn run_logged(pipeline: &Pipeline, origin: &str) {
    match pipeline.run_pipeline_once().await {
        Ok(RunOutcome::Published { retained, tested }) => {
            info!(origin, retained, tested, "Run published a new working set");
        }
        Ok(RunOutcome::AlreadyRunning) => info!(origin, "Run skipped, another is in progress"),
        Ok(RunOutcome::Cancelled) => info!(origin, "Run cancelled"),
        Err(e @ CleanerError::EmptyCandidates) => warn!(origin, "Run aborted: {}", e),
        Err(e) => error!(origin, "Run failed: {}", e),
    }
}
