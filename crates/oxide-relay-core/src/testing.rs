//! Testing helpers and fake transports.
//!
//! Provides a recording transport with scripted failures and helpers that
//! populate scratch directories with dummy media.

use crate::media::{FileRef, MediaItem, MediaKind};
use crate::transport::{ChatTransport, MessageRef, MockChatTransport};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

/// Media item as seen by the recording transport, without its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentItem {
    /// Presentation kind.
    pub kind: MediaKind,
    /// Upload file name.
    pub file_name: String,
    /// Attached caption.
    pub caption: Option<String>,
}

impl From<&MediaItem> for SentItem {
    fn from(item: &MediaItem) -> Self {
        Self {
            kind: item.kind,
            file_name: item.file_name.clone(),
            caption: item.caption.clone(),
        }
    }
}

/// One call observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    /// `send_media`
    Media(SentItem),
    /// `send_media_group`
    Group(Vec<SentItem>),
    /// `send_notice`
    Notice(String),
    /// `send_placeholder`
    Placeholder(String),
    /// `delete_message`
    Delete(MessageRef),
    /// `send_working_indicator`
    Indicator,
}

/// Transport fake that records every call in order.
///
/// Failing calls are still recorded.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Sent>>,
    failing_groups: HashSet<usize>,
    fail_singles: bool,
}

impl RecordingTransport {
    /// Fail the grouped sends with the given zero-based call indices.
    #[must_use]
    pub fn failing_groups(indices: &[usize]) -> Self {
        Self {
            failing_groups: indices.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Fail every single-item send.
    #[must_use]
    pub fn failing_singles() -> Self {
        Self {
            fail_singles: true,
            ..Self::default()
        }
    }

    fn record(&self, call: Sent) -> usize {
        let mut calls = self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        calls.push(call);
        calls.len()
    }

    /// Every call so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Sent> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Only the grouped sends.
    #[must_use]
    pub fn groups(&self) -> Vec<Vec<SentItem>> {
        self.sent()
            .into_iter()
            .filter_map(|call| match call {
                Sent::Group(items) => Some(items),
                _ => None,
            })
            .collect()
    }

    /// Only the notice texts.
    #[must_use]
    pub fn notices(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|call| match call {
                Sent::Notice(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_media(&self, item: MediaItem) -> Result<()> {
        self.record(Sent::Media(SentItem::from(&item)));
        if self.fail_singles {
            return Err(anyhow!("media rejected"));
        }
        Ok(())
    }

    async fn send_media_group(&self, items: Vec<MediaItem>) -> Result<()> {
        let index = self.groups().len();
        self.record(Sent::Group(items.iter().map(SentItem::from).collect()));
        if self.failing_groups.contains(&index) {
            return Err(anyhow!("group rejected"));
        }
        Ok(())
    }

    async fn send_notice(&self, text: &str) -> Result<()> {
        self.record(Sent::Notice(text.to_string()));
        Ok(())
    }

    async fn send_placeholder(&self, text: &str) -> Result<MessageRef> {
        let position = self.record(Sent::Placeholder(text.to_string()));
        Ok(MessageRef(i32::try_from(position).unwrap_or(i32::MAX)))
    }

    async fn delete_message(&self, message: MessageRef) -> Result<()> {
        self.record(Sent::Delete(message));
        Ok(())
    }

    async fn send_working_indicator(&self) -> Result<()> {
        self.record(Sent::Indicator);
        Ok(())
    }
}

/// Create a mock transport that accepts every call.
#[must_use]
pub fn mock_transport_accepting_all() -> MockChatTransport {
    let mut mock = MockChatTransport::new();
    mock.expect_send_media().returning(|_| Ok(()));
    mock.expect_send_media_group().returning(|_| Ok(()));
    mock.expect_send_notice().returning(|_| Ok(()));
    mock.expect_send_placeholder().returning(|_| Ok(MessageRef(1)));
    mock.expect_delete_message().returning(|_| Ok(()));
    mock.expect_send_working_indicator().returning(|| Ok(()));
    mock
}

/// Write `count` small files named `item_NN.<extension>` into `dir`.
///
/// # Errors
///
/// Returns an error if a file cannot be written.
pub fn write_files(dir: &Path, count: usize, extension: &str) -> std::io::Result<Vec<FileRef>> {
    (0..count)
        .map(|n| {
            let path = dir.join(format!("item_{n:02}_{extension}.{extension}"));
            std::fs::write(&path, b"data")?;
            Ok(FileRef::new(path))
        })
        .collect()
}
