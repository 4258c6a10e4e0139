#![deny(missing_docs)]
//! Oxide Relay core library.
//!
//! Transport-agnostic pipeline pieces: link extraction, media fetching,
//! caption building and batched media dispatch.

/// Caption composition from post metadata.
pub mod caption;
/// Configuration management.
pub mod config;
/// Batched media delivery with guaranteed cleanup.
pub mod dispatch;
/// External downloader invocation.
pub mod fetcher;
/// URL extraction and tracking-parameter removal.
pub mod link;
/// Media file classification.
pub mod media;
/// Downloader metadata document parsing.
pub mod metadata;
/// Chat transport abstraction.
pub mod transport;
/// Utility functions.
pub mod utils;

/// Testing helpers and fake transports.
#[cfg(test)]
pub mod testing;
