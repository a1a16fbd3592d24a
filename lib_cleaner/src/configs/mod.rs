//! # Configuration Modules
//!
//! Typed settings for every pipeline stage. Loading them from the
//! environment is the binary's job; this module only owns the shapes,
//! their defaults and startup validation.

/// Pipeline settings, defaults and validation.
pub mod config_pipeline;

pub use config_pipeline::{
    EngineSettings, FetchPolicy, PipelineSettings, ProbeSettings, SourceSettings,
};
