use dotenvy::dotenv;
use oxide_relay_core::config::RelaySettings;
use oxide_relay_transport_telegram::config::{BotSettings, TelegramSettings};
use oxide_relay_transport_telegram::runner::run_bot;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "oxide_relay_core=info,oxide_relay_runtime=info,\
    oxide_relay_transport_telegram=info,oxide_relay_telegram_bot=info,\
    teloxide=warn,hyper=warn,reqwest=warn,tokio=warn";

/// Bot token shapes that must never reach the logs, with their replacements
struct RedactionPatterns {
    rules: Vec<(Regex, &'static str)>,
}

impl RedactionPatterns {
    /// Compile every pattern
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            rules: vec![
                // Bot API URLs: https://api.telegram.org/bot<token>/method
                (
                    Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
                    "$1[TELEGRAM_TOKEN]$3",
                ),
                (
                    Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
                    "$1[TELEGRAM_TOKEN]",
                ),
                (
                    Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
                    "[TELEGRAM_TOKEN]",
                ),
            ],
        })
    }

    fn redact(&self, input: &str) -> String {
        self.rules
            .iter()
            .fold(input.to_string(), |text, (pattern, replacement)| {
                pattern.replace_all(&text, *replacement).into_owned()
            })
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let redacted = self.patterns.redact(&String::from_utf8_lossy(buf));
        self.inner.write_all(redacted.as_bytes())?;
        // The caller's whole buffer was consumed, whatever the redacted length
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: Arc::clone(&self.patterns),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Compiled before logging starts so nothing is ever written unredacted
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Oxide Relay TG Bot...");

    let settings = init_settings();

    run_bot(settings).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    let fallback = if debug_mode { "debug" } else { DEFAULT_LOG_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<BotSettings> {
    let relay_settings = match RelaySettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load relay configuration: {}", e);
            std::process::exit(1);
        }
    };
    let telegram_settings = match TelegramSettings::new() {
        Ok(settings) if !settings.telegram_token.trim().is_empty() => settings,
        Ok(_) => {
            error!("TELEGRAM_TOKEN is not set");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully.");
    Arc::new(BotSettings::new(relay_settings, telegram_settings))
}

#[cfg(test)]
mod tests {
    use super::RedactionPatterns;

    const TOKEN: &str = "1234567890:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw1";

    #[test]
    fn test_redacts_token_in_api_url() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let line = format!("error sending request for url (https://api.telegram.org/bot{TOKEN}/sendMediaGroup)");
        let redacted = patterns.redact(&line);
        assert!(!redacted.contains(TOKEN));
        assert!(redacted.contains("/bot[TELEGRAM_TOKEN]/sendMediaGroup"));
        Ok(())
    }

    #[test]
    fn test_redacts_bare_token_and_keeps_other_text() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let redacted = patterns.redact(&format!("token={TOKEN} url=https://example.com/p/1"));
        assert_eq!(redacted, "token=[TELEGRAM_TOKEN] url=https://example.com/p/1");
        Ok(())
    }
}
