//! # lib_cleaner
//!
//! Aggregates proxy node definitions from remote subscription sources,
//! verifies each node through an external connectivity-test engine and
//! republishes the nodes that pass the latency ceiling as a ranked,
//! deduplicated working set.
//!
//! ## Layout:
//! - **`configs`**: settings for sources, the engine and probing.
//! - **`retrieve`**: subscription fetching and payload decoding.
//! - **`core`**: deduplication, engine lifecycle, probing, ranking and the
//!   published result store, tied together by `core::pipeline::Pipeline`.
//! - **`export`**: renders a published snapshot as client subscriptions.
//! - **`loggers`**: `tracing` subscriber bootstrap (feature `loggers`).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod configs;
pub mod core;
pub mod errors;
pub mod export;
#[cfg(feature = "loggers")]
pub mod loggers;
pub mod model;
pub mod retrieve;

// --- Public API Re-exports ---
pub use configs::{EngineSettings, FetchPolicy, PipelineSettings, ProbeSettings, SourceSettings};
pub use crate::core::pipeline::{Pipeline, RunOutcome};
pub use crate::core::store::Snapshot;
pub use errors::CleanerError;
pub use model::NodeDescriptor;
