//! Relay pipeline
//!
//! Sequences one inbound message through link extraction, fetching, caption
//! composition and dispatch, and manages the acknowledgement shown while the
//! downloader runs.

use crate::registry::FetchRegistry;
use oxide_relay_core::caption::caption_for;
use oxide_relay_core::config::{AckMode, RelaySettings, WORKING_INDICATOR_INTERVAL_SECS};
use oxide_relay_core::dispatch::{dispatch, DispatchOptions, DispatchReport};
use oxide_relay_core::fetcher::{FetchError, FetchResult, MediaFetcher};
use oxide_relay_core::link::{find_link, SanitizedUrl, TrackingDenylist};
use oxide_relay_core::transport::{ChatKind, ChatTransport, MessageRef, SourceMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Text of the placeholder message in [`AckMode::Placeholder`].
pub const PLACEHOLDER_TEXT: &str = "⏳";

/// What happened to an inbound message.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The message contained no usable link; nothing was sent.
    NoUrl,
    /// The downloader could not fetch the link.
    Failed(FetchError),
    /// The downloader succeeded but produced no media.
    NoMedia,
    /// Media was dispatched; see the report for per-item results.
    Delivered(DispatchReport),
}

/// Whether the originating message should be removed after relaying.
///
/// Direct chats always; groups only when `DELETE_IN_GROUPS` is set; channels
/// never.
#[must_use]
pub const fn should_delete_source(kind: ChatKind, settings: &RelaySettings) -> bool {
    match kind {
        ChatKind::Direct => true,
        ChatKind::Group => settings.delete_in_groups,
        ChatKind::Channel => false,
    }
}

/// Per-message orchestrator shared by every chat.
pub struct RelayPipeline {
    settings: Arc<RelaySettings>,
    denylist: TrackingDenylist,
    fetcher: Arc<dyn MediaFetcher>,
    registry: Arc<FetchRegistry>,
    indicator_interval: Duration,
}

impl RelayPipeline {
    /// Create a pipeline around a fetcher.
    #[must_use]
    pub fn new(
        settings: Arc<RelaySettings>,
        fetcher: Arc<dyn MediaFetcher>,
        registry: Arc<FetchRegistry>,
    ) -> Self {
        Self {
            denylist: TrackingDenylist::from_settings(&settings),
            settings,
            fetcher,
            registry,
            indicator_interval: Duration::from_secs(WORKING_INDICATOR_INTERVAL_SECS),
        }
    }

    #[cfg(test)]
    /// Override the working-indicator refresh interval for tests.
    pub fn with_indicator_interval(mut self, interval: Duration) -> Self {
        self.indicator_interval = interval;
        self
    }

    /// Registry holding this pipeline's in-flight fetches
    #[must_use]
    pub fn registry(&self) -> &Arc<FetchRegistry> {
        &self.registry
    }

    /// Relay `source` on its own task and return immediately.
    ///
    /// Chat transports deliver one chat's updates in order; detaching keeps a
    /// slow fetch from holding back later messages of the same chat.
    pub fn spawn_message<T>(
        self: &Arc<Self>,
        source: SourceMessage,
        transport: Arc<T>,
    ) -> JoinHandle<RelayOutcome>
    where
        T: ChatTransport + ?Sized + 'static,
    {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = pipeline.handle_message(&source, transport.as_ref()).await;
            log_outcome(source.chat_id, &outcome);
            outcome
        })
    }

    /// Relay the first link of `source` back into its chat through `transport`.
    ///
    /// Never fails: every problem is logged, optionally surfaced as a notice,
    /// and reflected in the returned outcome.
    #[instrument(skip_all, fields(chat_id = source.chat_id, message_id = source.message.0))]
    pub async fn handle_message<T: ChatTransport + ?Sized>(
        &self,
        source: &SourceMessage,
        transport: &T,
    ) -> RelayOutcome {
        let Some(url) = find_link(&source.text, &self.denylist) else {
            debug!("No link in message");
            return RelayOutcome::NoUrl;
        };
        info!(url = %url, "Relaying link");

        let placeholder = self.acknowledge(transport).await;
        let result = self.fetch(&url, transport).await;
        if let Some(message) = placeholder {
            delete_quietly(transport, message, "placeholder").await;
        }

        match result {
            FetchResult::Failure(e) => {
                warn!(url = %url, error = %e, "Could not fetch media");
                self.finish_source(source, transport).await;
                self.notify_failure(transport, &format!("Could not fetch media: {e}"))
                    .await;
                RelayOutcome::Failed(e)
            }
            FetchResult::NoMedia => {
                info!(url = %url, "No media found");
                self.finish_source(source, transport).await;
                self.notify_failure(transport, "No media found at this link.")
                    .await;
                RelayOutcome::NoMedia
            }
            FetchResult::Success(mut post) => {
                let caption = caption_for(&post.metadata);
                self.finish_source(source, transport).await;
                let files = std::mem::take(&mut post.files);
                let report = dispatch(
                    transport,
                    files,
                    Some(caption),
                    &DispatchOptions::from_settings(&self.settings),
                )
                .await;
                // Removes the scratch directory and any leftover artifacts
                drop(post);
                RelayOutcome::Delivered(report)
            }
        }
    }

    async fn acknowledge<T: ChatTransport + ?Sized>(&self, transport: &T) -> Option<MessageRef> {
        match self.settings.ack_mode {
            AckMode::None => None,
            AckMode::Action => {
                if let Err(e) = transport.send_working_indicator().await {
                    debug!(error = %e, "Failed to send working indicator");
                }
                None
            }
            AckMode::Placeholder => match transport.send_placeholder(PLACEHOLDER_TEXT).await {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(error = %e, "Failed to send placeholder");
                    None
                }
            },
        }
    }

    /// Run the fetch on its own task, refreshing the working indicator meanwhile.
    async fn fetch<T: ChatTransport + ?Sized>(
        &self,
        url: &SanitizedUrl,
        transport: &T,
    ) -> FetchResult {
        let guard = self.registry.begin();
        let token = guard.token();
        let fetcher = Arc::clone(&self.fetcher);
        let task_url = url.clone();
        let mut handle = tokio::spawn(async move {
            let _guard = guard;
            fetcher.fetch(&task_url, token).await
        });

        let joined = if self.settings.ack_mode == AckMode::Action {
            loop {
                tokio::select! {
                    joined = &mut handle => break joined,
                    () = tokio::time::sleep(self.indicator_interval) => {
                        if let Err(e) = transport.send_working_indicator().await {
                            debug!(error = %e, "Failed to refresh working indicator");
                        }
                    }
                }
            }
        } else {
            handle.await
        };

        joined.unwrap_or_else(|e| FetchResult::Failure(FetchError::Worker(e.to_string())))
    }

    async fn finish_source<T: ChatTransport + ?Sized>(&self, source: &SourceMessage, transport: &T) {
        if should_delete_source(source.chat_kind, &self.settings) {
            delete_quietly(transport, source.message, "source message").await;
        }
    }

    async fn notify_failure<T: ChatTransport + ?Sized>(&self, transport: &T, text: &str) {
        if !self.settings.notify_fetch_failures {
            return;
        }
        if let Err(e) = transport.send_notice(text).await {
            warn!(error = %e, "Failed to send failure notice");
        }
    }
}

fn log_outcome(chat_id: i64, outcome: &RelayOutcome) {
    match outcome {
        RelayOutcome::NoUrl => debug!(chat_id, "Ignoring message without link"),
        RelayOutcome::NoMedia => info!(chat_id, "Link had no media"),
        RelayOutcome::Failed(e) => warn!(chat_id, error = %e, "Relay failed"),
        RelayOutcome::Delivered(report) => info!(
            chat_id,
            delivered = report.delivered.len(),
            dropped = report.dropped.len(),
            failures = report.failures.len(),
            "Relay finished"
        ),
    }
}

async fn delete_quietly<T: ChatTransport + ?Sized>(transport: &T, message: MessageRef, what: &str) {
    if let Err(e) = transport.delete_message(message).await {
        warn!(message_id = message.0, error = %e, "Failed to delete {what}");
    }
}
