//! Chat transport abstraction.
//!
//! The pipeline never talks to a chat platform directly. Each inbound message
//! gets a transport bound to its chat; every call may fail independently and
//! reports a human-readable reason through `anyhow::Error`.

use crate::media::MediaItem;
use anyhow::Result;
use async_trait::async_trait;

/// Handle of a message inside the transport's chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

/// Kind of chat a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// One-to-one conversation with the bot.
    Direct,
    /// Group or supergroup.
    Group,
    /// Broadcast channel.
    Channel,
}

/// Read-only view of an inbound message.
#[derive(Debug, Clone)]
pub struct SourceMessage {
    /// Message text (or media caption).
    pub text: String,
    /// Originating chat identifier.
    pub chat_id: i64,
    /// Kind of the originating chat.
    pub chat_kind: ChatKind,
    /// Handle used to delete the message.
    pub message: MessageRef,
}

/// Operations the pipeline needs from a chat platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a single photo, video or document.
    async fn send_media(&self, item: MediaItem) -> Result<()>;

    /// Send up to ten photos/videos as one grouped message.
    async fn send_media_group(&self, items: Vec<MediaItem>) -> Result<()>;

    /// Send a plain text notice.
    async fn send_notice(&self, text: &str) -> Result<()>;

    /// Send a transient text message and return its handle.
    async fn send_placeholder(&self, text: &str) -> Result<MessageRef>;

    /// Delete a message in the bound chat.
    async fn delete_message(&self, message: MessageRef) -> Result<()>;

    /// Show a short-lived "working" indicator.
    async fn send_working_indicator(&self) -> Result<()>;
}
