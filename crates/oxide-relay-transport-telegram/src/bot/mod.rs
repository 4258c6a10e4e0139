/// Command and link message handlers
pub mod handlers;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// `ChatTransport` implementation over the Bot API
pub mod transport;

pub use transport::TelegramChatTransport;
