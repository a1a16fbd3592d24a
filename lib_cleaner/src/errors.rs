//! # Error Taxonomy
//!
//! Errors are scoped to the stage that raises them. Only
//! `CleanerError::EmptyCandidates` and `CleanerError::EngineStart` abort a
//! pipeline run; source, decode and probe failures are absorbed where they
//! happen, and an engine stop failure is reported without failing the run.

use std::path::PathBuf;

use thiserror::Error;

/// A payload could not be turned into a node list.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("document has no `proxies` list")]
    NoProxyList,

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Every registered strategy failed; one entry per strategy.
    #[error("no decode strategy accepted the payload ({})", .0.join("; "))]
    Unrecognized(Vec<String>),
}

/// One subscription source failed. Always logged and skipped.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("payload from {url} could not be decoded: {source}")]
    Decode {
        url: String,
        #[source]
        source: DecodeError,
    },
}

/// A single node's delay query failed. The node is dropped from the run.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("control API answered with status {0}")]
    Status(u16),

    #[error("delay response carried no delay value")]
    MissingDelay,

    #[error("cannot address node `{0}` on the control API")]
    BadName(String),
}

/// The external engine could not be started or stopped.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine binary not found or not a file: {}", .0.display())]
    BinaryMissing(PathBuf),

    #[error("failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("engine exited before its control API came up ({0})")]
    ExitedEarly(String),

    #[error("control API not ready after {attempts} attempts")]
    NotReady { attempts: u32 },

    #[error("engine did not exit cleanly: {0}")]
    Terminate(#[source] std::io::Error),

    #[error("invalid control API address: {0}")]
    ControlUrl(String),

    #[error("failed to render engine config: {0}")]
    ConfigRender(#[source] serde_yml::Error),

    #[error("failed to write engine config: {0}")]
    ConfigWrite(#[source] std::io::Error),
}

/// Settings rejected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid URL ({value}): {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("probe request timeout ({request_ms} ms) must exceed the engine-side probe timeout ({engine_ms} ms)")]
    ProbeTimeouts { request_ms: u128, engine_ms: u32 },

    #[error("unknown fetch policy `{0}` (expected aggregate-all or first-success)")]
    FetchPolicy(String),
}

/// Umbrella error for a pipeline run.
#[derive(Debug, Error)]
pub enum CleanerError {
    /// No node survived fetch and deduplication.
    #[error("no candidate nodes after fetch and deduplication")]
    EmptyCandidates,

    #[error("engine start failed: {0}")]
    EngineStart(#[source] EngineError),

    #[error("engine stop failed: {0}")]
    EngineStop(#[source] EngineError),

    #[error("engine is not ready for probing")]
    EngineNotReady,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
