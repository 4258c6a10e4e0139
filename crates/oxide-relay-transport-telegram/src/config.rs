//! Telegram transport settings.

use config::ConfigError;
use oxide_relay_core::config::{build_config, RelaySettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
    /// Comma-separated list of chat IDs the bot serves (empty = every chat).
    #[serde(rename = "allowed_chats")]
    pub allowed_chats_str: Option<String>,
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Relay settings shared with the pipeline.
    pub relay: Arc<RelaySettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(relay: RelaySettings, telegram: TelegramSettings) -> Self {
        Self {
            relay: Arc::new(relay),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Returns the set of allowed chat IDs.
    #[must_use]
    pub fn allowed_chats(&self) -> HashSet<i64> {
        self.allowed_chats_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the bot should relay links posted in `chat_id`.
    #[must_use]
    pub fn is_chat_allowed(&self, chat_id: i64) -> bool {
        let allowed = self.allowed_chats();
        allowed.is_empty() || allowed.contains(&chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::TelegramSettings;

    #[test]
    fn test_list_parsing() {
        let mut settings = TelegramSettings {
            telegram_token: "dummy".to_string(),
            allowed_chats_str: None,
        };

        settings.allowed_chats_str = Some("123,-100456".to_string());
        let allowed = settings.allowed_chats();
        assert!(allowed.contains(&123));
        assert!(allowed.contains(&-100_456));
        assert_eq!(allowed.len(), 2);

        // Semicolons, spaces and junk
        settings.allowed_chats_str = Some("333; 444, abc 555".to_string());
        let allowed = settings.allowed_chats();
        assert_eq!(allowed.len(), 3);
        assert!(!allowed.contains(&0));
    }

    #[test]
    fn test_empty_allowlist_allows_everyone() {
        let mut settings = TelegramSettings::default();
        assert!(settings.is_chat_allowed(42));

        settings.allowed_chats_str = Some(String::new());
        assert!(settings.is_chat_allowed(42));

        settings.allowed_chats_str = Some("7".to_string());
        assert!(settings.is_chat_allowed(7));
        assert!(!settings.is_chat_allowed(42));
    }
}
