#![deny(missing_docs)]
//! Oxide Relay runtime.
//!
//! Transport-agnostic orchestration of one inbound message: link, fetch,
//! caption, dispatch and source-message cleanup.

/// Per-message relay orchestration.
pub mod pipeline;
/// In-flight fetch registry and shutdown cancellation.
pub mod registry;

pub use pipeline::{should_delete_source, RelayOutcome, RelayPipeline};
pub use registry::{FetchGuard, FetchRegistry};
