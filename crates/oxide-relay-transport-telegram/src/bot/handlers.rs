use crate::bot::resilient::send_message_resilient;
use crate::bot::transport::TelegramChatTransport;
use anyhow::Result;
use oxide_relay_core::transport::{ChatKind, MessageRef, SourceMessage};
use oxide_relay_runtime::RelayPipeline;
use std::sync::Arc;
use teloxide::{prelude::*, types::Chat, utils::command::BotCommands};
use tracing::{debug, info};

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Check bot health
    #[command(description = "Check bot health.")]
    Healthcheck,
}

/// Map a Telegram chat onto the relay's chat kinds.
#[must_use]
pub fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Direct
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

/// Build the pipeline's view of a message from its text or media caption.
///
/// Returns `None` for messages carrying neither.
#[must_use]
pub fn source_from_message(msg: &Message) -> Option<SourceMessage> {
    let text = msg.text().or_else(|| msg.caption())?;
    Some(SourceMessage {
        text: text.to_string(),
        chat_id: msg.chat.id.0,
        chat_kind: chat_kind(&msg.chat),
        message: MessageRef(msg.id.0),
    })
}

/// Welcome handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    info!(chat_id = msg.chat.id.0, "Start command received.");
    let text = "Send me a link to a post and I'll reply with its photos and videos.\n\n\
         Tracking parameters are stripped from the link, and in private chats \
         your original message is removed once the media is on its way.";
    send_message_resilient(&bot, msg.chat.id, text).await?;
    Ok(())
}

/// Healthcheck handler
///
/// # Errors
///
/// Returns an error if the healthcheck response cannot be sent.
pub async fn healthcheck(bot: Bot, msg: Message) -> Result<()> {
    info!(chat_id = msg.chat.id.0, "Healthcheck command received.");
    bot.send_message(msg.chat.id, "OK").await?;
    Ok(())
}

/// Relay the link in a text message or media caption back into its chat.
///
/// The relay runs detached so the dispatcher can move on to the chat's next
/// update while the downloader works.
pub fn handle_link_message(bot: Bot, msg: &Message, pipeline: &Arc<RelayPipeline>) {
    let Some(source) = source_from_message(msg) else {
        return;
    };
    let transport = Arc::new(TelegramChatTransport::new(bot, msg.chat.id));
    debug!(chat_id = source.chat_id, message_id = source.message.0, "Relay task spawned");
    pipeline.spawn_message(source, transport);
}
