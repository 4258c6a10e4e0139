use crate::bot::resilient::{delete_message_safe, send_message_resilient};
use anyhow::Result;
use async_trait::async_trait;
use oxide_relay_core::media::{MediaItem, MediaKind};
use oxide_relay_core::transport::{ChatTransport, MessageRef};
use teloxide::prelude::*;
use teloxide::RequestError;
use teloxide::types::{
    ChatAction, ChatId, InputFile, InputMedia, InputMediaPhoto, InputMediaVideo, MessageId,
};
use tracing::warn;

/// Telegram chat transport bound to one chat.
#[derive(Clone)]
pub struct TelegramChatTransport {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramChatTransport {
    /// Create a transport for `chat_id`.
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    async fn send_document(&self, file: InputFile, caption: Option<String>) -> Result<()> {
        let mut request = self.bot.send_document(self.chat_id, file);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        request.await?;
        Ok(())
    }

    async fn send_photo(&self, file: InputFile, caption: Option<String>) -> Result<()> {
        let mut request = self.bot.send_photo(self.chat_id, file);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        request.await?;
        Ok(())
    }

    /// Send a video, falling back to a document if Telegram rejects it as media.
    async fn send_video(&self, item: MediaItem) -> Result<()> {
        let MediaItem {
            file_name,
            bytes,
            caption,
            ..
        } = item;
        let make_file = || InputFile::memory(bytes.clone()).file_name(file_name.clone());

        let mut request = self.bot.send_video(self.chat_id, make_file());
        if let Some(caption) = caption.clone() {
            request = request.caption(caption);
        }
        match request.await {
            Ok(_) => Ok(()),
            Err(e) if is_media_rejection(&e) => {
                warn!(
                    file_name = %file_name,
                    error = %e,
                    "Failed to send video as native media; falling back to document"
                );
                self.send_document(make_file(), caption).await
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether Telegram itself refused the upload.
///
/// Network failures are excluded: the video may already have been posted.
fn is_media_rejection(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(_))
}

fn input_media(item: MediaItem) -> InputMedia {
    let file = InputFile::memory(item.bytes).file_name(item.file_name);
    match item.kind {
        MediaKind::Video => {
            let mut media = InputMediaVideo::new(file);
            if let Some(caption) = item.caption {
                media = media.caption(caption);
            }
            InputMedia::Video(media)
        }
        // Only photos and videos ever reach a grouped send
        MediaKind::Photo | MediaKind::Document => {
            let mut media = InputMediaPhoto::new(file);
            if let Some(caption) = item.caption {
                media = media.caption(caption);
            }
            InputMedia::Photo(media)
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramChatTransport {
    async fn send_media(&self, item: MediaItem) -> Result<()> {
        match item.kind {
            MediaKind::Photo => {
                let file = InputFile::memory(item.bytes).file_name(item.file_name);
                self.send_photo(file, item.caption).await
            }
            MediaKind::Video => self.send_video(item).await,
            MediaKind::Document => {
                let file = InputFile::memory(item.bytes).file_name(item.file_name);
                self.send_document(file, item.caption).await
            }
        }
    }

    async fn send_media_group(&self, mut items: Vec<MediaItem>) -> Result<()> {
        // Telegram rejects media groups with fewer than two items
        if items.len() == 1 {
            if let Some(item) = items.pop() {
                return self.send_media(item).await;
            }
        }
        let media: Vec<InputMedia> = items.into_iter().map(input_media).collect();
        self.bot.send_media_group(self.chat_id, media).await?;
        Ok(())
    }

    async fn send_notice(&self, text: &str) -> Result<()> {
        send_message_resilient(&self.bot, self.chat_id, text).await?;
        Ok(())
    }

    async fn send_placeholder(&self, text: &str) -> Result<MessageRef> {
        let message = send_message_resilient(&self.bot, self.chat_id, text).await?;
        Ok(MessageRef(message.id.0))
    }

    async fn delete_message(&self, message: MessageRef) -> Result<()> {
        delete_message_safe(&self.bot, self.chat_id, MessageId(message.0)).await
    }

    async fn send_working_indicator(&self) -> Result<()> {
        self.bot
            .send_chat_action(self.chat_id, ChatAction::UploadDocument)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kind: MediaKind, caption: Option<&str>) -> MediaItem {
        MediaItem {
            kind,
            file_name: "a.bin".to_string(),
            bytes: vec![1, 2, 3],
            caption: caption.map(str::to_string),
        }
    }

    #[test]
    fn test_only_api_errors_trigger_document_fallback() {
        use teloxide::ApiError;

        assert!(is_media_rejection(&RequestError::Api(ApiError::Unknown(
            "Bad Request: wrong type of the web page content".to_string()
        ))));
        assert!(!is_media_rejection(&RequestError::MigrateToChatId(ChatId(-1_001))));
    }

    #[test]
    fn test_input_media_kind_and_caption() {
        match input_media(item(MediaKind::Video, Some("cap"))) {
            InputMedia::Video(video) => assert_eq!(video.caption.as_deref(), Some("cap")),
            _ => panic!("expected video"),
        }
        match input_media(item(MediaKind::Photo, None)) {
            InputMedia::Photo(photo) => assert!(photo.caption.is_none()),
            _ => panic!("expected photo"),
        }
    }
}
