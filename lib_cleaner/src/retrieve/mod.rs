//! # Data Retrieval Module
//!
//! Turns the configured subscription sources into a flat list of raw node
//! descriptors.
//!
//! ## Contained Modules:
//!
//! - **`sources`**: resolves the URL list, including the dated mirror
//!   fallback used when no URL is configured.
//! - **`decoder`**: ordered decode strategies (structured YAML first,
//!   padded base64 wrapping YAML second).
//! - **`fetcher`**: the HTTP client that walks the sources under the
//!   aggregate-all or first-success policy. A failing source is logged and
//!   skipped, never fatal.

/// Source URL resolution.
pub mod sources;
/// Payload decode strategies.
pub mod decoder;
/// Subscription HTTP fetcher.
pub mod fetcher;

pub use decoder::{DecodeStrategy, PaddedBase64, PayloadDecoder, StructuredYaml};
pub use fetcher::SourceFetcher;
pub use sources::{dated_mirror_urls, resolve_source_urls, split_source_list};
