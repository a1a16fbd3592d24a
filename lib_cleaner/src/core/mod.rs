//! # Core Pipeline Module
//!
//! The aggregation-and-ranking pipeline, leaves first:
//!
//! - **`dedup`**: merges raw descriptors into a `CandidateSet`, unique by
//!   `server:port`, and assigns engine-addressable working names.
//! - **`engine_config`**: serializes the candidates plus control-API
//!   parameters into the engine's YAML config file.
//! - **`control_api`**: HTTP client for the engine's control API
//!   (liveness and per-node delay).
//! - **`supervisor`**: the engine subprocess lifecycle state machine.
//! - **`prober`**: sequential per-node delay measurement.
//! - **`ranking`**: latency sort and collision-free display names.
//! - **`store`**: the published working set, swapped atomically.
//! - **`pipeline`**: one guarded run over all of the above.

/// Candidate deduplication.
pub mod dedup;
/// Engine configuration file.
pub mod engine_config;
/// Engine control API client.
pub mod control_api;
/// Engine process supervision.
pub mod supervisor;
/// Per-node latency probing.
pub mod prober;
/// Ranking and naming.
pub mod ranking;
/// Published result store.
pub mod store;
/// Guarded pipeline runs.
pub mod pipeline;

// --- Public API Re-exports ---
pub use control_api::ControlClient;
pub use dedup::{deduplicate, CandidateSet};
pub use engine_config::EngineConfig;
pub use pipeline::{Pipeline, RunOutcome};
pub use prober::LatencyProber;
pub use ranking::{rank, WorkingSet};
pub use store::{ResultStore, Snapshot};
pub use supervisor::{EngineState, EngineSupervisor};
