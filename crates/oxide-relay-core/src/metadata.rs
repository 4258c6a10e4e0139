//! Downloader metadata document parsing.
//!
//! The downloader optionally writes an `info.json` next to the media. Its
//! shape varies per site, so fields are looked up leniently and anything
//! missing falls back to an empty string.

use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// File name of the metadata document written by the downloader.
pub const METADATA_FILE_NAME: &str = "info.json";

/// Errors that can occur while reading the metadata document
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The document could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The document is valid JSON but not an object
    #[error("metadata document is not a JSON object")]
    NotAnObject,
}

/// Attribution fields extracted for a post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostMetadata {
    /// Canonical post URL (defaults to the requested URL).
    pub post_url: String,
    /// Post text.
    pub description: String,
    /// Author handle.
    pub username: String,
    /// Author display name.
    pub fullname: String,
}

fn non_empty_str<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn first_non_empty<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| non_empty_str(object, key))
}

impl PostMetadata {
    /// Metadata used when no document is available.
    #[must_use]
    pub fn fallback(url: &str) -> Self {
        Self {
            post_url: url.to_string(),
            ..Self::default()
        }
    }

    /// Parse a metadata document.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a JSON object.
    pub fn parse(json: &str, fallback_url: &str) -> Result<Self, MetadataError> {
        let value: Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or(MetadataError::NotAnObject)?;
        let author = object.get("author").and_then(Value::as_object);
        let from_author = |key: &str| author.and_then(|a| non_empty_str(a, key));

        Ok(Self {
            post_url: non_empty_str(object, "post_url")
                .unwrap_or(fallback_url)
                .to_string(),
            description: first_non_empty(object, &["description", "content", "desc"])
                .unwrap_or_default()
                .to_string(),
            username: non_empty_str(object, "username")
                .or_else(|| from_author("name"))
                .unwrap_or_default()
                .to_string(),
            fullname: non_empty_str(object, "fullname")
                .or_else(|| from_author("nick"))
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Load metadata from `path`, degrading to [`PostMetadata::fallback`].
    ///
    /// A missing document or a malformed one is logged, never fatal.
    pub async fn load(path: Option<&Path>, fallback_url: &str) -> Self {
        let Some(path) = path else {
            warn!(url = %fallback_url, "{METADATA_FILE_NAME} not found");
            return Self::fallback(fallback_url);
        };

        let parsed = match tokio::fs::read_to_string(path).await {
            Ok(json) => Self::parse(&json, fallback_url),
            Err(e) => Err(MetadataError::from(e)),
        };

        parsed.unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Error reading metadata document");
            Self::fallback(fallback_url)
        })
    }
}
