/// Console + rolling JSON file `tracing` subscriber setup.
pub mod setup;

pub use setup::setup_logging;
