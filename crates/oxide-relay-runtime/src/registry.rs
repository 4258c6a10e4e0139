//! In-flight fetch registry
//!
//! Hands out cancellation tokens to running fetches and cancels all of them
//! at shutdown. Transport-agnostic: one registry is shared by every chat.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Tracks running fetches so they can be cancelled together.
#[derive(Debug, Default)]
pub struct FetchRegistry {
    root: CancellationToken,
    in_flight: Arc<AtomicUsize>,
}

/// Registration of one running fetch.
///
/// Dropping the guard marks the fetch as finished.
#[derive(Debug)]
pub struct FetchGuard {
    token: CancellationToken,
    in_flight: Arc<AtomicUsize>,
}

impl FetchRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new fetch.
    ///
    /// After [`FetchRegistry::shutdown`] the returned token is already cancelled.
    #[must_use]
    pub fn begin(&self) -> FetchGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        FetchGuard {
            token: self.root.child_token(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Cancel every in-flight and future fetch
    pub fn shutdown(&self) {
        let in_flight = self.in_flight();
        self.root.cancel();
        info!(in_flight, "Fetch registry shut down");
    }

    /// Whether [`FetchRegistry::shutdown`] has been called
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Number of fetches currently registered
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl FetchGuard {
    /// Token the fetch must observe.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_tracks_in_flight() {
        let registry = FetchRegistry::new();
        let first = registry.begin();
        let second = registry.begin();
        assert_eq!(registry.in_flight(), 2);

        drop(first);
        assert_eq!(registry.in_flight(), 1);
        drop(second);
        assert_eq!(registry.in_flight(), 0);
    }

    #[test]
    fn test_shutdown_cancels_running_and_future_fetches() {
        let registry = FetchRegistry::new();
        let running = registry.begin();
        assert!(!running.token().is_cancelled());

        registry.shutdown();

        assert!(registry.is_shut_down());
        assert!(running.token().is_cancelled());
        assert!(registry.begin().token().is_cancelled());
    }

    #[tokio::test]
    async fn test_guard_released_when_task_ends() {
        let registry = FetchRegistry::new();
        let guard = registry.begin();
        let handle = tokio::spawn(async move {
            let _guard = guard;
        });
        assert!(handle.await.is_ok());
        assert_eq!(registry.in_flight(), 0);
    }
}
