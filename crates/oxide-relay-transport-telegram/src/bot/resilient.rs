//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Transient network failures are retried using exponential backoff with
//! jitter. Deletes are not retried: a message that is already gone counts as
//! deleted.

use anyhow::Result;
use oxide_relay_core::utils::retry_telegram_operation;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId};
use tracing::debug;

const ERROR_DELETE_NOT_FOUND: &str = "message to delete not found";

/// Send a plain text message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    retry_telegram_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Whether a delete error only says the message no longer exists.
#[must_use]
pub fn is_already_deleted(error: &str) -> bool {
    error.contains(ERROR_DELETE_NOT_FOUND)
}

/// Delete a message, treating "not found" as success.
///
/// # Errors
///
/// Returns an error if Telegram refuses the delete for any other reason
/// (missing rights, message too old).
pub async fn delete_message_safe(bot: &Bot, chat_id: ChatId, msg_id: MessageId) -> Result<()> {
    match bot.delete_message(chat_id, msg_id).await {
        Ok(_) => Ok(()),
        Err(e) if is_already_deleted(&e.to_string()) => {
            debug!(message_id = msg_id.0, "Message already deleted");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Telegram delete error: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::is_already_deleted;

    #[test]
    fn test_already_deleted_detection() {
        assert!(is_already_deleted(
            "A Telegram's error: Bad Request: message to delete not found"
        ));
        assert!(!is_already_deleted("Bad Request: message can't be deleted"));
    }
}
