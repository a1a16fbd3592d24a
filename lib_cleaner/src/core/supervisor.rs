//! # Engine Supervisor
//!
//! Owns the external test engine subprocess and walks it through
//!
//! ```text
//! Stopped -> Starting -> Ready -> Stopping -> Stopped
//!               \-> StartFailed
//! ```
//!
//! - **start**: tears down any still-tracked instance, checks the binary,
//!   spawns `<binary> -d <work_dir> -f <config>` and polls the control API
//!   `version` call up to `ready_retries` times, `ready_interval` apart.
//!   An early exit or an exhausted retry budget tears the child down and
//!   lands in `StartFailed`.
//! - **stop**: SIGTERM, wait up to `stop_grace`, then SIGKILL and reap.
//!   The child handle is taken out before signalling, so termination is
//!   attempted exactly once per started instance.
//!
//! The child is spawned with `kill_on_drop`, so dropping the supervisor
//! never leaves an engine behind.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::configs::EngineSettings;
use crate::core::control_api::ControlClient;
use crate::errors::{CleanerError, EngineError};

/// Lifecycle state of the supervised engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Ready,
    Stopping,
    /// The last start attempt failed; nothing is running.
    StartFailed,
}

pub struct EngineSupervisor {
    settings: EngineSettings,
    control: ControlClient,
    child: Option<Child>,
    state: EngineState,
}

impl EngineSupervisor {
    pub fn new(settings: EngineSettings) -> Result<Self, CleanerError> {
        let control = ControlClient::new(&settings)?;
        Ok(Self { settings, control, child: None, state: EngineState::Stopped })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Whether a subprocess is currently tracked.
    pub fn is_active(&self) -> bool {
        self.child.is_some()
    }

    /// PID of the tracked subprocess, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// The control API, available only while the engine is `Ready`.
    pub fn control(&self) -> Option<&ControlClient> {
        match self.state {
            EngineState::Ready => Some(&self.control),
            _ => None,
        }
    }

    /// Launches the engine with `config_path` and waits until it answers.
    ///
    /// # Errors
    /// `CleanerError::EngineStart` when the binary is missing, the spawn
    /// fails, the process exits early or the control API never answers.
    /// No subprocess is tracked after an error.
    pub async fn start(&mut self, config_path: &Path) -> Result<(), CleanerError> {
        if self.child.is_some() {
            warn!("Previous engine instance still tracked, stopping it first");
            if let Err(e) = self.stop().await {
                error!(alert = true, "Failed to stop previous engine instance: {}", e);
            }
        }

        let binary = &self.settings.binary_path;
        if !binary.is_file() {
            self.state = EngineState::StartFailed;
            error!(binary = %binary.display(), "Engine binary not found");
            return Err(CleanerError::EngineStart(EngineError::BinaryMissing(binary.clone())));
        }

        let mut cmd = Command::new(binary);
        cmd.arg("-d")
            .arg(&self.settings.work_dir)
            .arg("-f")
            .arg(config_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.state = EngineState::StartFailed;
                return Err(CleanerError::EngineStart(EngineError::Spawn(e)));
            }
        };
        info!(pid = child.id().unwrap_or(0), binary = %binary.display(), "Engine spawned");
        self.child = Some(child);
        self.state = EngineState::Starting;

        match self.wait_ready().await {
            Ok(()) => {
                self.state = EngineState::Ready;
                Ok(())
            }
            Err(e) => {
                if let Err(stop_err) = self.stop().await {
                    error!(alert = true, "Failed to tear down engine after start failure: {}", stop_err);
                }
                self.state = EngineState::StartFailed;
                Err(CleanerError::EngineStart(e))
            }
        }
    }

    async fn wait_ready(&mut self) -> Result<(), EngineError> {
        let retries = self.settings.ready_retries;
        let interval = self.settings.ready_interval;

        for attempt in 1..=retries {
            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(EngineError::ExitedEarly(status.to_string()));
                }
            }

            match self.control.version(interval.max(Duration::from_millis(200))).await {
                Ok(()) => {
                    info!(attempt, "Engine control API ready");
                    return Ok(());
                }
                Err(e) => debug!(attempt, retries, "Control API not ready yet: {}", e),
            }
            tokio::time::sleep(interval).await;
        }
        Err(EngineError::NotReady { attempts: retries })
    }

    /// Terminates the tracked engine, if any.
    ///
    /// # Errors
    /// `CleanerError::EngineStop` if the process could not be confirmed
    /// dead. The handle is released either way.
    pub async fn stop(&mut self) -> Result<(), CleanerError> {
        let Some(mut child) = self.child.take() else {
            if self.state != EngineState::StartFailed {
                self.state = EngineState::Stopped;
            }
            return Ok(());
        };
        self.state = EngineState::Stopping;
        let pid = child.id();

        let result = terminate(&mut child, self.settings.stop_grace).await;
        self.state = EngineState::Stopped;
        match result {
            Ok(()) => {
                info!(pid = pid.unwrap_or(0), "Engine stopped");
                Ok(())
            }
            Err(e) => Err(CleanerError::EngineStop(EngineError::Terminate(e))),
        }
    }
}

/// SIGTERM, bounded wait, then SIGKILL.
async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    if let Ok(Some(status)) = child.try_wait() {
        debug!(%status, "Engine had already exited");
        return Ok(());
    }

    if let Err(e) = request_exit(child) {
        warn!("Graceful termination signal failed: {}", e);
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(%status, "Engine exited after termination signal");
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "Engine ignored termination signal, killing");
            child.start_kill()?;
            child.wait().await.map(|_| ())
        }
    }
}

#[cfg(unix)]
fn request_exit(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => {
            let pid = i32::try_from(pid)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
            kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(std::io::Error::from)
        }
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn request_exit(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}
