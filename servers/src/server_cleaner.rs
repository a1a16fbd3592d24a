//! # Proxy Subscription Cleaner Server
//!
//! Periodically pulls proxy subscriptions, verifies every node through a
//! local connectivity-test engine and serves the nodes that passed as a
//! ranked client subscription.
//!
//! ## Functionality:
//! - **Scheduler**: runs the cleanup pipeline at startup and then every
//!   `CRON_INTERVAL` seconds.
//! - **HTTP API**: health (`GET /`), manual trigger (`POST /trigger`) and
//!   the published subscription (`GET /sub`, `GET /sub/base64`).
//! - **Graceful Shutdown**: `tokio-graceful` waits for SIGINT/SIGTERM,
//!   cancels in-flight probing and terminates the engine subprocess before
//!   exiting.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_graceful::Shutdown;
use tracing::{error, info};

use lib_cleaner::loggers::setup_logging;
use lib_cleaner::Pipeline;

mod cleaner_logic;
use cleaner_logic::{config, http, scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // load .env files before anything else
    dotenvy::dotenv().ok();

    let config = config::load_config();
    let _log_guard = match setup_logging(&config.log_dir(), config.log_level(), "server_cleaner") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        port = config.port(),
        interval_secs = config.cron_interval().as_secs(),
        "Configuration loaded"
    );

    let pipeline = Arc::new(Pipeline::new(config.pipeline_settings()?)?);

    let shutdown: Shutdown = Shutdown::default();

    // Probing stops at the next node as soon as a signal arrives.
    let token = pipeline.cancellation_token();
    shutdown.spawn_task_fn(move |guard| async move {
        guard.cancelled().await;
        token.cancel();
    });

    let period = config.cron_interval();
    let scheduled = Arc::clone(&pipeline);
    shutdown.spawn_task_fn(move |guard| scheduler::run(scheduled, period, guard));

    let port = config.port();
    let served = Arc::clone(&pipeline);
    shutdown.spawn_task_fn(move |guard| async move {
        let state = http::AppState { pipeline: served, guard };
        if let Err(e) = http::run(state, port).await {
            error!("HTTP API stopped: {}", e);
        }
    });

    match shutdown.shutdown_with_limit(Duration::from_secs(30)).await {
        Ok(elapsed) => {
            info!(
                "shutdown: gracefully {}s after shutdown signal received",
                elapsed.as_secs_f64()
            );
        }
        Err(e) => {
            info!("shutdown: forcefully due to timeout: {}", e);
        }
    }

    // Covers runs cut off by the time limit.
    pipeline.shutdown().await;

    info!("Bye!");
    Ok(())
}
