use std::time::Duration;
use tokio::sync::broadcast;
use watchlist_core::{Suggestion, WatchlistError};

use crate::store::{InitSource, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient, auto-dismissing message for the user
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Ticker the notice is about, if any
    pub ticker: Option<String>,
    pub ttl: Duration,
}

/// Everything the render sink needs to know about
#[derive(Debug, Clone)]
pub enum WatchlistEvent {
    Initialized {
        source: InitSource,
        snapshot: Snapshot,
    },
    /// A polling cycle finished
    Refreshed {
        updated: usize,
        failed: Vec<String>,
        snapshot: Snapshot,
    },
    /// Membership or order changed by a user action
    Changed { snapshot: Snapshot },
    SearchResults {
        query: String,
        suggestions: Vec<Suggestion>,
    },
    SearchCleared,
    OrderPersisted { tickers: Vec<String> },
    Notice(Notice),
}

/// Fan-out channel for watchlist events.
///
/// Publishing never fails: with no subscribers the event is dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WatchlistEvent>,
    notice_ttl: Duration,
}

impl EventBus {
    pub fn new(capacity: usize, notice_ttl: Duration) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, notice_ttl }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchlistEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: WatchlistEvent) {
        let _ = self.tx.send(event);
    }

    /// Surface `error` as a notice if the user should see it.
    ///
    /// Background failures (load, quote, transport) are only logged.
    pub fn report(&self, error: &WatchlistError) {
        if error.is_user_facing() {
            self.notify(
                NoticeLevel::Error,
                error.to_string(),
                error.ticker().map(str::to_string),
            );
        } else {
            tracing::debug!("Not surfacing background error: {}", error);
        }
    }

    pub fn notify_info(&self, message: impl Into<String>, ticker: Option<&str>) {
        self.notify(NoticeLevel::Info, message.into(), ticker.map(str::to_string));
    }

    fn notify(&self, level: NoticeLevel, message: String, ticker: Option<String>) {
        self.publish(WatchlistEvent::Notice(Notice {
            level,
            message,
            ticker,
            ttl: self.notice_ttl,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_report_user_facing_error() {
        let bus = EventBus::new(8, Duration::from_secs(4));
        let mut rx = bus.subscribe();

        bus.report(&WatchlistError::DuplicateTicker("AAPL".to_string()));

        match rx.recv().await.unwrap() {
            WatchlistEvent::Notice(notice) => {
                assert_eq!(notice.level, NoticeLevel::Error);
                assert_eq!(notice.ttl, Duration::from_secs(4));
                assert_eq!(notice.message, "AAPL is already in the watchlist");
                assert_eq!(notice.ticker.as_deref(), Some("AAPL"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_report_skips_background_errors() {
        let bus = EventBus::new(8, Duration::from_secs(4));
        let mut rx = bus.subscribe();

        bus.report(&WatchlistError::Quote {
            ticker: "KTEC".to_string(),
            message: "no data".to_string(),
        });
        bus.report(&WatchlistError::Timeout(Duration::from_secs(5)));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(8, Duration::from_secs(1));
        bus.publish(WatchlistEvent::SearchCleared);
    }
}
