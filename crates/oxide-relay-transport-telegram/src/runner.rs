use crate::bot;
use crate::bot::handlers::Command;
use crate::config::BotSettings;
use oxide_relay_core::fetcher::GalleryDlFetcher;
use oxide_relay_runtime::{FetchRegistry, RelayPipeline};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, error, info};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let registry = Arc::new(FetchRegistry::new());
    let pipeline = init_pipeline(&settings, Arc::clone(&registry));
    spawn_shutdown_listener(Arc::clone(&registry));

    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let handler = setup_handler();

    info!(
        allowed_chats = settings.telegram.allowed_chats().len(),
        "Bot is running..."
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, pipeline])
        .default_handler(|upd| async move {
            debug!(update_id = upd.id.0, "Ignoring unhandled update");
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Anything still running after the dispatcher stops is abandoned
    registry.shutdown();
    info!("Bot stopped.");
}

fn init_pipeline(settings: &BotSettings, registry: Arc<FetchRegistry>) -> Arc<RelayPipeline> {
    let fetcher = Arc::new(GalleryDlFetcher::new(&settings.relay));
    info!(
        downloader = %settings.relay.downloader_bin,
        timeout_secs = settings.relay.fetch_timeout_secs,
        ack_mode = ?settings.relay.ack_mode,
        "Relay pipeline initialized."
    );
    Arc::new(RelayPipeline::new(
        Arc::clone(&settings.relay),
        fetcher,
        registry,
    ))
}

/// Cancel in-flight fetches as soon as Ctrl-C arrives, so downloader
/// processes die and scratch directories are removed while the dispatcher
/// drains.
fn spawn_shutdown_listener(registry: Arc<FetchRegistry>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => registry.shutdown(),
            Err(e) => error!("Failed to listen for Ctrl-C: {e}"),
        }
    });
}

fn is_allowed(msg: &Message, settings: &BotSettings) -> bool {
    settings.telegram.is_chat_allowed(msg.chat.id.0)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<BotSettings>| is_allowed(&msg, &settings))
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().or_else(|| msg.caption()).is_some())
                        .endpoint(handle_link),
                ),
        )
        .branch(
            Update::filter_channel_post()
                .filter(|msg: Message, settings: Arc<BotSettings>| is_allowed(&msg, &settings))
                .endpoint(handle_link),
        )
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg).await,
        Command::Healthcheck => bot::handlers::healthcheck(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_link(
    bot: Bot,
    msg: Message,
    pipeline: Arc<RelayPipeline>,
) -> Result<(), teloxide::RequestError> {
    bot::handlers::handle_link_message(bot, &msg, &pipeline);
    respond(())
}
