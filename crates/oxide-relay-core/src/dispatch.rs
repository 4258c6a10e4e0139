//! Batched media delivery with guaranteed cleanup.
//!
//! The dispatcher owns every file handed to it: each one is deleted after its
//! delivery attempt, whatever the outcome. Failures are recorded in the
//! returned [`DispatchReport`] and never propagate.

use crate::config::{RelaySettings, MEDIA_GROUP_LIMIT};
use crate::media::{FileRef, MediaItem};
use crate::transport::ChatTransport;
use crate::utils::remove_file_quietly;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons a single file could not be turned into a media item
#[derive(Error, Debug)]
pub enum ItemError {
    /// The file is missing or unreadable
    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),
    /// The file exceeds the transport's upload limit
    #[error("file is too large: {size} bytes (limit {limit})")]
    TooLarge {
        /// Actual size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },
}

/// Dispatcher policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Files above this size are skipped.
    pub max_upload_bytes: u64,
    /// In multi-file posts, send documents one by one instead of dropping them.
    pub send_documents_individually: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from_settings(&RelaySettings::default())
    }
}

impl DispatchOptions {
    /// Options derived from relay settings.
    #[must_use]
    pub const fn from_settings(settings: &RelaySettings) -> Self {
        Self {
            max_upload_bytes: settings.max_upload_bytes,
            send_documents_individually: settings.send_documents_individually,
        }
    }
}

/// A delivery problem recorded during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchFailure {
    /// One file could not be loaded or sent.
    Item {
        /// The file concerned.
        path: PathBuf,
        /// Human-readable reason.
        reason: String,
    },
    /// A whole grouped send failed.
    Batch {
        /// Zero-based batch index.
        index: usize,
        /// Files that were part of the batch.
        paths: Vec<PathBuf>,
        /// Human-readable reason.
        reason: String,
    },
}

/// Summary of one dispatch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Files the transport accepted.
    pub delivered: Vec<PathBuf>,
    /// Files discarded because their kind cannot be grouped.
    pub dropped: Vec<PathBuf>,
    /// Item and batch failures, in order of occurrence.
    pub failures: Vec<DispatchFailure>,
    /// Number of grouped sends attempted (including empty-after-load batches).
    pub batches: usize,
    /// Number of diagnostic notices sent to the chat.
    pub notices_sent: usize,
}

impl DispatchReport {
    /// True when nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Read a file into a media item.
///
/// The file handle is scoped to the read; nothing stays open afterwards.
async fn load_item(file: &FileRef, max_upload_bytes: u64) -> Result<MediaItem, ItemError> {
    let size = tokio::fs::metadata(&file.path).await?.len();
    if size > max_upload_bytes {
        return Err(ItemError::TooLarge {
            size,
            limit: max_upload_bytes,
        });
    }

    Ok(MediaItem {
        kind: file.kind,
        file_name: file.file_name(),
        bytes: tokio::fs::read(&file.path).await?,
        caption: None,
    })
}

struct Dispatch<'a, T: ChatTransport + ?Sized> {
    transport: &'a T,
    options: &'a DispatchOptions,
    caption: Option<String>,
    report: DispatchReport,
}

impl<T: ChatTransport + ?Sized> Dispatch<'_, T> {
    async fn notify_once(&mut self, text: String) {
        if self.report.notices_sent > 0 {
            return;
        }
        match self.transport.send_notice(&text).await {
            Ok(()) => self.report.notices_sent += 1,
            Err(e) => warn!(error = %e, "Failed to send dispatch notice"),
        }
    }

    async fn item_failed(&mut self, file: &FileRef, reason: String) {
        warn!(path = %file.path.display(), reason = %reason, "Skipping media item");
        self.report.failures.push(DispatchFailure::Item {
            path: file.path.clone(),
            reason,
        });
        remove_file_quietly(&file.path).await;
    }

    async fn drop_file(&mut self, file: &FileRef) {
        debug!(path = %file.path.display(), kind = %file.kind, "Dropping file from grouped send");
        self.report.dropped.push(file.path.clone());
        remove_file_quietly(&file.path).await;
    }

    async fn send_single(&mut self, file: &FileRef) {
        let mut item = match load_item(file, self.options.max_upload_bytes).await {
            Ok(item) => item,
            Err(e) => return self.item_failed(file, e.to_string()).await,
        };
        item.caption = self.caption.take();

        match self.transport.send_media(item).await {
            Ok(()) => self.report.delivered.push(file.path.clone()),
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "Failed to send media");
                self.report.failures.push(DispatchFailure::Item {
                    path: file.path.clone(),
                    reason: e.to_string(),
                });
                self.notify_once(format!("Error sending {}: {e}", file.kind))
                    .await;
            }
        }
        remove_file_quietly(&file.path).await;
    }

    async fn send_batch(&mut self, index: usize, batch: &[FileRef]) {
        self.report.batches += 1;
        let mut items = Vec::with_capacity(batch.len());
        let mut paths = Vec::with_capacity(batch.len());

        for file in batch {
            match load_item(file, self.options.max_upload_bytes).await {
                Ok(mut item) => {
                    if items.is_empty() {
                        item.caption = self.caption.take();
                    }
                    items.push(item);
                    paths.push(file.path.clone());
                }
                Err(e) => self.item_failed(file, e.to_string()).await,
            }
        }

        if items.is_empty() {
            return;
        }

        match self.transport.send_media_group(items).await {
            Ok(()) => {
                debug!(index, items = paths.len(), "Media group sent");
                self.report.delivered.extend(paths.iter().cloned());
            }
            Err(e) => {
                warn!(index, error = %e, "Unexpected error sending media group");
                self.notify_once(format!("Error sending media group: {e}"))
                    .await;
                self.report.failures.push(DispatchFailure::Batch {
                    index,
                    paths: paths.clone(),
                    reason: e.to_string(),
                });
            }
        }

        for path in &paths {
            remove_file_quietly(path).await;
        }
    }

    async fn send_many(&mut self, files: &[FileRef]) {
        let (groupable, others): (Vec<&FileRef>, Vec<&FileRef>) =
            files.iter().partition(|file| file.kind.is_groupable());

        let mut individual = Vec::new();
        for file in others {
            if self.options.send_documents_individually {
                individual.push(file);
            } else {
                self.drop_file(file).await;
            }
        }

        match groupable.as_slice() {
            [] => {}
            [only] => self.send_single(only).await,
            _ => {
                let groupable: Vec<FileRef> = groupable.iter().map(|file| (*file).clone()).collect();
                for (index, batch) in groupable.chunks(MEDIA_GROUP_LIMIT).enumerate() {
                    self.send_batch(index, batch).await;
                }
            }
        }

        for file in individual {
            self.send_single(file).await;
        }
    }
}

/// Deliver `files` through `transport`, attaching `caption` to the first item.
///
/// One file is sent on its own with its own kind. Several files are split
/// into groups of at most [`MEDIA_GROUP_LIMIT`] photos/videos; other kinds are
/// dropped (or sent one by one, see [`DispatchOptions`]). Every file is
/// removed from disk before this returns.
pub async fn dispatch<T: ChatTransport + ?Sized>(
    transport: &T,
    files: Vec<FileRef>,
    caption: Option<String>,
    options: &DispatchOptions,
) -> DispatchReport {
    let mut run = Dispatch {
        transport,
        options,
        caption: caption.filter(|text| !text.is_empty()),
        report: DispatchReport::default(),
    };

    match files.as_slice() {
        [] => {}
        [only] => run.send_single(only).await,
        many => run.send_many(many).await,
    }

    info!(
        delivered = run.report.delivered.len(),
        dropped = run.report.dropped.len(),
        failures = run.report.failures.len(),
        "Dispatch finished"
    );
    run.report
}
