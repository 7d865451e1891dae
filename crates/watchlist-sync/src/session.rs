//! Watchlist Session
//!
//! Owns one user's store and wires the scheduler and controllers to it.
//! This is the surface the render layer and input handlers talk to.

use std::sync::Arc;
use tokio::sync::broadcast;
use watchlist_core::{Suggestion, WatchlistError, WatchlistGateway};

use crate::config::SyncConfig;
use crate::events::{EventBus, WatchlistEvent};
use crate::reorder::ReorderController;
use crate::scheduler::{CycleReport, RefreshScheduler, SchedulerState};
use crate::search::SearchController;
use crate::store::{InitSource, SharedStore, Snapshot, WatchlistStore};

pub struct WatchlistSession {
    store: SharedStore,
    gateway: Arc<dyn WatchlistGateway>,
    events: EventBus,
    user_id: Arc<str>,
    config: SyncConfig,
    scheduler: RefreshScheduler,
    reorder: ReorderController,
    search: SearchController,
}

impl WatchlistSession {
    pub fn new(
        gateway: Arc<dyn WatchlistGateway>,
        user_id: impl Into<Arc<str>>,
        config: SyncConfig,
    ) -> Self {
        let user_id: Arc<str> = user_id.into();
        let store = WatchlistStore::new().into_shared();
        let events = EventBus::new(config.event_capacity, config.notice_ttl);

        let scheduler = RefreshScheduler::new(
            store.clone(),
            gateway.clone(),
            events.clone(),
            config.refresh_interval,
            config.request_timeout,
        );
        let reorder = ReorderController::new(
            store.clone(),
            gateway.clone(),
            events.clone(),
            user_id.clone(),
            config.reorder_debounce,
        );
        let search = SearchController::new(
            store.clone(),
            gateway.clone(),
            events.clone(),
            user_id.clone(),
            config.search_debounce,
            config.request_timeout,
        );

        Self {
            store,
            gateway,
            events,
            user_id,
            config,
            scheduler,
            reorder,
            search,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchlistEvent> {
        self.events.subscribe()
    }

    /// Load the persisted watchlist and start polling.
    ///
    /// A failed or unusable load falls back to seed data; this never fails.
    pub async fn load(&self) -> InitSource {
        let fetched = match tokio::time::timeout(
            self.config.request_timeout,
            self.gateway.fetch_watchlist(&self.user_id),
        )
        .await
        {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                tracing::warn!("Could not load watchlist for {}: {}", self.user_id, e);
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    "Loading watchlist for {} timed out after {:?}",
                    self.user_id,
                    self.config.request_timeout
                );
                Vec::new()
            }
        };

        let (source, snapshot) = {
            let mut store = self.store.write().await;
            let source = store.initialize(fetched);
            (source, store.snapshot())
        };
        tracing::info!("Watchlist initialized from {:?} with {} tickers", source, snapshot.len());

        self.events.publish(WatchlistEvent::Initialized { source, snapshot });
        self.scheduler.start().await;
        source
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.store.read().await.snapshot()
    }

    pub async fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state().await
    }

    /// Poll all tickers once, outside the regular interval
    pub async fn refresh_now(&self) -> CycleReport {
        self.scheduler.run_cycle().await
    }

    /// Run the add sequence for `ticker`
    pub async fn add(&self, ticker: &str) -> Result<Snapshot, WatchlistError> {
        let snapshot = self.search.select(ticker).await?;
        self.added(ticker.trim()).await;
        Ok(snapshot)
    }

    /// Add the search result at `index`
    pub async fn pick(&self, index: usize) -> Result<Snapshot, WatchlistError> {
        let ticker = self.search.results().await.get(index).map(|s| s.ticker.clone());
        let snapshot = self.search.pick(index).await?;
        if let Some(ticker) = ticker {
            self.added(&ticker).await;
        }
        Ok(snapshot)
    }

    async fn added(&self, ticker: &str) {
        self.events
            .notify_info(format!("{} added to watchlist", ticker), Some(ticker));
        self.scheduler.start().await;
    }

    /// Remove `ticker` locally, then from the remote store.
    ///
    /// Removing an untracked ticker succeeds without a request. A remote
    /// failure is reported but the ticker stays removed locally.
    pub async fn remove(&self, ticker: &str) -> Result<(), WatchlistError> {
        let snapshot = {
            let mut store = self.store.write().await;
            match store.remove(ticker) {
                Ok(_) => store.snapshot(),
                Err(WatchlistError::NotFound(_)) => {
                    tracing::debug!("{} is not tracked, nothing to remove", ticker);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        };
        self.events.publish(WatchlistEvent::Changed { snapshot });

        let result = match tokio::time::timeout(
            self.config.request_timeout,
            self.gateway.remove_ticker(&self.user_id, ticker),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ WatchlistError::Remove { .. })) => Err(e),
            Ok(Err(e)) => Err(WatchlistError::Remove {
                ticker: ticker.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(WatchlistError::Remove {
                ticker: ticker.to_string(),
                message: WatchlistError::Timeout(self.config.request_timeout).to_string(),
            }),
        };

        match result {
            Ok(()) => {
                tracing::info!("Removed {} from watchlist", ticker);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Remote remove failed, keeping local removal: {}", e);
                self.events.report(&e);
                Err(e)
            }
        }
    }

    /// Feed search box text
    pub async fn search(&self, text: &str) {
        self.search.on_input(text).await;
    }

    pub async fn search_results(&self) -> Vec<Suggestion> {
        self.search.results().await
    }

    /// Wait for a pending search lookup
    pub async fn flush_search(&self) {
        self.search.flush().await;
    }

    /// Drag-and-drop from display index `source` to `target`
    pub async fn on_drop(&self, source: usize, target: usize) -> Result<usize, WatchlistError> {
        self.reorder
            .on_drop(source, target)
            .await
            .inspect_err(|e| self.events.report(e))
    }

    /// Persist any pending order and stop polling
    pub async fn shutdown(&self) {
        self.search.clear().await;
        self.reorder.flush().await;
        self.scheduler.stop().await;
        tracing::info!("Watchlist session for {} shut down", self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoticeLevel;
    use crate::testing::{Call, ScriptedGateway};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use watchlist_core::QuoteUpdate;

    fn build(gateway: Arc<ScriptedGateway>) -> WatchlistSession {
        WatchlistSession::new(gateway, "trader@example.com", SyncConfig::default())
    }

    async fn tickers(session: &WatchlistSession) -> Vec<String> {
        session.snapshot().await.iter().map(|r| r.ticker.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_from_remote_starts_polling() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_watchlist(&["CWEB", "KTEC", "PLTR"])
                .with_quote(QuoteUpdate::new("KTEC").with_price(dec!(17.40))),
        );
        let session = build(gateway.clone());
        let mut rx = session.subscribe();

        assert_eq!(session.load().await, InitSource::Remote);
        assert_eq!(session.scheduler_state().await, SchedulerState::Polling);

        match rx.recv().await.unwrap() {
            WatchlistEvent::Initialized { source, snapshot } => {
                assert_eq!(source, InitSource::Remote);
                assert_eq!(snapshot.len(), 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(rx.recv().await.unwrap(), WatchlistEvent::Refreshed { updated: 1, .. }));
        assert_eq!(
            gateway.calls()[0],
            Call::FetchWatchlist("trader@example.com".to_string())
        );

        session.shutdown().await;
        assert_eq!(session.scheduler_state().await, SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_uses_seed() {
        let session = build(Arc::new(ScriptedGateway::new()));

        assert_eq!(session.load().await, InitSource::Seed);
        assert_eq!(tickers(&session).await, vec!["CWEB", "KTEC", "PLTR", "2330.TW"]);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_untracked_is_noop() {
        let gateway = Arc::new(ScriptedGateway::new().with_watchlist(&["CWEB"]));
        let session = build(gateway.clone());
        session.load().await;
        session.shutdown().await;

        session.remove("PLTR").await.unwrap();

        assert!(!gateway.calls().contains(&Call::Remove("PLTR".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_remove_failure_keeps_local_removal() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_watchlist(&["CWEB", "KTEC", "PLTR"])
                .failing_remove("KTEC"),
        );
        let session = build(gateway);
        session.load().await;
        session.shutdown().await;

        let err = session.remove("KTEC").await.unwrap_err();

        assert!(matches!(err, WatchlistError::Remove { .. }));
        assert_eq!(tickers(&session).await, vec!["CWEB", "PLTR"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_restarts_polling_after_empty() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_watchlist(&["CWEB"])
                .with_quote(QuoteUpdate::new("AAPL").with_price(dec!(176.38))),
        );
        let session = build(gateway.clone());
        session.load().await;

        session.remove("CWEB").await.unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(session.scheduler_state().await, SchedulerState::Idle);

        session.add("AAPL").await.unwrap();
        assert_eq!(session.scheduler_state().await, SchedulerState::Polling);
        assert_eq!(tickers(&session).await, vec!["AAPL"]);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reorder_then_shutdown_persists() {
        let gateway = Arc::new(ScriptedGateway::new().with_watchlist(&["CWEB", "KTEC", "PLTR"]));
        let session = build(gateway.clone());
        session.load().await;

        session.on_drop(0, 2).await.unwrap();
        session.shutdown().await;

        assert_eq!(
            gateway.persisted(),
            vec![vec!["KTEC".to_string(), "PLTR".to_string(), "CWEB".to_string()]]
        );
    }

    fn notices(rx: &mut broadcast::Receiver<WatchlistEvent>) -> Vec<(NoticeLevel, Option<String>)> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let WatchlistEvent::Notice(notice) = event {
                seen.push((notice.level, notice.ticker));
            }
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_notices_follow_user_facing_errors() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_watchlist(&["CWEB", "KTEC"])
                .with_quote(QuoteUpdate::new("AAPL").with_price(dec!(176.38))),
        );
        let session = build(gateway);
        session.load().await;
        let mut rx = session.subscribe();

        session.add("AAPL").await.unwrap();
        assert_eq!(notices(&mut rx), vec![(NoticeLevel::Info, Some("AAPL".to_string()))]);

        session.add("KTEC").await.unwrap_err();
        assert_eq!(notices(&mut rx), vec![(NoticeLevel::Error, Some("KTEC".to_string()))]);

        session.on_drop(9, 0).await.unwrap_err();
        session.pick(4).await.unwrap_err();
        assert_eq!(
            notices(&mut rx),
            vec![(NoticeLevel::Error, None), (NoticeLevel::Error, None)]
        );

        session.shutdown().await;
    }
}
