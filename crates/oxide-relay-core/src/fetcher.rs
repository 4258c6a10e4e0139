//! External downloader invocation.
//!
//! Each fetch runs the downloader in its own scratch directory, waits for it
//! under a timeout, then lists what it produced in a deterministic order.
//! The scratch directory is owned by the returned [`FetchedPost`] and removed
//! when the post is dropped; failed and empty fetches clean up immediately.

use crate::config::{RelaySettings, STDERR_EXCERPT_LIMIT};
use crate::link::SanitizedUrl;
use crate::media::FileRef;
use crate::metadata::{PostMetadata, METADATA_FILE_NAME};
use crate::utils::truncate_str;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Extensions the downloader uses for sidecar, partial or temporary files.
static ARTIFACT_EXTENSIONS: &[&str] = &["json", "tmp", "part", "ytdl"];

/// Errors that can occur while fetching media for a link
#[derive(Error, Debug)]
pub enum FetchError {
    /// The scratch directory could not be created
    #[error("failed to prepare scratch directory: {0}")]
    Scratch(#[source] io::Error),
    /// The downloader process could not be started
    #[error("failed to start downloader `{program}`: {source}")]
    Spawn {
        /// Program that was executed
        program: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },
    /// Waiting for the downloader failed
    #[error("failed to wait for downloader: {0}")]
    Wait(#[source] io::Error),
    /// The downloader did not finish in time
    #[error("downloader timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// The downloader exited with a non-zero status
    #[error("downloader failed ({status}): {stderr}")]
    Process {
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Human-readable exit status
        status: String,
        /// Captured diagnostic output (truncated)
        stderr: String,
    },
    /// The produced files could not be listed
    #[error("failed to enumerate downloaded files: {0}")]
    Enumerate(#[source] io::Error),
    /// The fetch was cancelled (shutdown)
    #[error("fetch cancelled")]
    Cancelled,
    /// The fetch task itself failed
    #[error("fetch worker failed: {0}")]
    Worker(String),
}

/// Media and metadata retrieved for one link.
#[derive(Debug)]
pub struct FetchedPost {
    /// Downloaded media files, sorted by path.
    pub files: Vec<FileRef>,
    /// Attribution metadata.
    pub metadata: PostMetadata,
    scratch: Option<TempDir>,
}

impl FetchedPost {
    /// Create a post for files that live outside a managed scratch directory.
    #[must_use]
    pub const fn new(files: Vec<FileRef>, metadata: PostMetadata) -> Self {
        Self {
            files,
            metadata,
            scratch: None,
        }
    }

    /// Scratch directory backing the files, if the post owns one.
    #[must_use]
    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }
}

/// Outcome of a fetch.
#[derive(Debug)]
pub enum FetchResult {
    /// At least one media file was downloaded.
    Success(FetchedPost),
    /// The downloader succeeded but produced no media.
    NoMedia,
    /// The downloader could not be run or failed.
    Failure(FetchError),
}

/// Anything able to turn a link into downloaded media.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch media for `url`; `cancel` aborts the fetch and cleans up.
    async fn fetch(&self, url: &SanitizedUrl, cancel: CancellationToken) -> FetchResult;
}

/// Files produced by one downloader run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DownloadListing {
    /// Media files, sorted lexicographically.
    pub media: Vec<PathBuf>,
    /// The metadata document, if present.
    pub metadata: Option<PathBuf>,
}

fn is_artifact(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'));
    let artifact_ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ARTIFACT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    hidden || artifact_ext
}

/// Recursively list downloader output under `root`.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn scan_directory(root: &Path) -> io::Result<DownloadListing> {
    let mut listing = DownloadListing::default();
    let mut metadata_candidates = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                pending.push(path);
            } else if !file_type.is_file() {
                continue;
            } else if entry.file_name() == METADATA_FILE_NAME {
                metadata_candidates.push(path);
            } else if !is_artifact(&path) {
                listing.media.push(path);
            }
        }
    }

    listing.media.sort();
    metadata_candidates.sort();
    listing.metadata = metadata_candidates.into_iter().next();
    Ok(listing)
}

/// `gallery-dl` compatible downloader run as a subprocess.
#[derive(Debug, Clone)]
pub struct GalleryDlFetcher {
    program: String,
    config_path: Option<String>,
    scratch_root: PathBuf,
    timeout: Duration,
    max_items: usize,
}

impl GalleryDlFetcher {
    /// Create a fetcher from relay settings.
    #[must_use]
    pub fn new(settings: &RelaySettings) -> Self {
        Self {
            program: settings.downloader_bin.clone(),
            config_path: settings.downloader_config.clone(),
            scratch_root: settings.scratch_root(),
            timeout: settings.fetch_timeout(),
            max_items: settings.max_items.max(1),
        }
    }

    fn command(&self, scratch: &Path, url: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("--write-info-json");
        if let Some(config) = &self.config_path {
            command.arg("--config").arg(config);
        }
        command
            .arg("--directory")
            .arg(scratch)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn create_scratch(&self) -> Result<TempDir, FetchError> {
        tokio::fs::create_dir_all(&self.scratch_root)
            .await
            .map_err(FetchError::Scratch)?;
        let root = tokio::fs::canonicalize(&self.scratch_root)
            .await
            .map_err(FetchError::Scratch)?;
        tempfile::Builder::new()
            .prefix("relay-")
            .tempdir_in(root)
            .map_err(FetchError::Scratch)
    }

    async fn run_downloader(
        &self,
        scratch: &Path,
        url: &SanitizedUrl,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        let child = self
            .command(scratch, url.as_str())
            .spawn()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the wait future drops the child, which kills it
        let output = tokio::select! {
            res = tokio::time::timeout(self.timeout, child.wait_with_output()) => {
                res.map_err(|_| FetchError::Timeout(self.timeout))?
                    .map_err(FetchError::Wait)?
            }
            () = cancel.cancelled() => return Err(FetchError::Cancelled),
        };

        debug!(
            status = %output.status,
            stdout_len = output.stdout.len(),
            stderr_len = output.stderr.len(),
            "Downloader finished"
        );

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(FetchError::Process {
            code: output.status.code(),
            status: output.status.to_string(),
            stderr: truncate_str(stderr.trim(), STDERR_EXCERPT_LIMIT),
        })
    }

    async fn try_fetch(
        &self,
        url: &SanitizedUrl,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, FetchError> {
        let scratch = self.create_scratch().await?;
        self.run_downloader(scratch.path(), url, cancel).await?;

        let root = scratch.path().to_path_buf();
        let listing = tokio::task::spawn_blocking(move || scan_directory(&root))
            .await
            .map_err(|e| FetchError::Worker(e.to_string()))?
            .map_err(FetchError::Enumerate)?;

        let mut media = listing.media;
        if media.is_empty() {
            info!("Downloader produced no media");
            return Ok(FetchResult::NoMedia);
        }
        if media.len() > self.max_items {
            warn!(
                found = media.len(),
                max_items = self.max_items,
                "Too many media files, delivering only the first ones"
            );
            media.truncate(self.max_items);
        }

        let metadata = PostMetadata::load(listing.metadata.as_deref(), url.as_str()).await;
        info!(files = media.len(), "Fetched media");

        Ok(FetchResult::Success(FetchedPost {
            files: media.into_iter().map(FileRef::new).collect(),
            metadata,
            scratch: Some(scratch),
        }))
    }
}

#[async_trait]
impl MediaFetcher for GalleryDlFetcher {
    #[instrument(skip(self, cancel), fields(url = %url))]
    async fn fetch(&self, url: &SanitizedUrl, cancel: CancellationToken) -> FetchResult {
        match self.try_fetch(url, &cancel).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Fetch failed");
                FetchResult::Failure(e)
            }
        }
    }
}
