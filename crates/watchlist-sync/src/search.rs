//! Search Controller
//!
//! Debounced typeahead over the suggestion endpoint, and the add sequence
//! run when the user picks a result.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use watchlist_core::{is_valid_ticker, Suggestion, WatchlistError, WatchlistGateway};

use crate::debounce::Debouncer;
use crate::events::{EventBus, WatchlistEvent};
use crate::seed;
use crate::store::{SharedStore, Snapshot};

pub struct SearchController {
    store: SharedStore,
    gateway: Arc<dyn WatchlistGateway>,
    events: EventBus,
    user_id: Arc<str>,
    timeout: Duration,
    debouncer: Debouncer,
    results: Arc<RwLock<Vec<Suggestion>>>,
}

impl SearchController {
    pub fn new(
        store: SharedStore,
        gateway: Arc<dyn WatchlistGateway>,
        events: EventBus,
        user_id: impl Into<Arc<str>>,
        debounce: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            events,
            user_id: user_id.into(),
            timeout,
            debouncer: Debouncer::new(debounce),
            results: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Feed the current contents of the search box.
    ///
    /// Empty input clears the results right away and cancels any pending
    /// lookup. Anything else is looked up once input has been quiet for the
    /// debounce delay.
    pub async fn on_input(&self, text: &str) {
        let query = text.trim().to_string();
        if query.is_empty() {
            self.clear().await;
            return;
        }

        let gateway = self.gateway.clone();
        let events = self.events.clone();
        let results = self.results.clone();
        let timeout = self.timeout;

        self.debouncer
            .schedule(async move {
                let suggestions = match tokio::time::timeout(timeout, gateway.suggest(&query)).await {
                    Ok(Ok(found)) if !found.is_empty() => found,
                    Ok(Ok(_)) => seed::local_matches(&seed::fallback_catalog(), &query),
                    Ok(Err(e)) => {
                        tracing::warn!("Suggestion lookup for {:?} failed: {}", query, e);
                        seed::local_matches(&seed::fallback_catalog(), &query)
                    }
                    Err(_) => {
                        tracing::warn!("Suggestion lookup for {:?} timed out", query);
                        seed::local_matches(&seed::fallback_catalog(), &query)
                    }
                };
                tracing::debug!("{} suggestions for {:?}", suggestions.len(), query);
                *results.write().await = suggestions.clone();
                events.publish(WatchlistEvent::SearchResults { query, suggestions });
            })
            .await;
    }

    /// Wait for a pending lookup to complete
    pub async fn flush(&self) {
        self.debouncer.flush().await;
    }

    pub async fn results(&self) -> Vec<Suggestion> {
        self.results.read().await.clone()
    }

    /// Drop pending lookups and hide the result list
    pub async fn clear(&self) {
        self.debouncer.cancel().await;
        self.results.write().await.clear();
        self.events.publish(WatchlistEvent::SearchCleared);
    }

    /// Add the suggestion at `index` of the current results
    pub async fn pick(&self, index: usize) -> Result<Snapshot, WatchlistError> {
        let ticker = {
            let results = self.results.read().await;
            results
                .get(index)
                .map(|s| s.ticker.clone())
                .ok_or(WatchlistError::InvalidIndex {
                    index,
                    len: results.len(),
                })
        };
        match ticker {
            Ok(ticker) => self.select(&ticker).await,
            Err(e) => {
                self.events.report(&e);
                Err(e)
            }
        }
    }

    /// Add `ticker` to the watchlist.
    ///
    /// The search input is cleared whatever the outcome. Failures are
    /// published as notices and returned.
    pub async fn select(&self, ticker: &str) -> Result<Snapshot, WatchlistError> {
        self.clear().await;

        match self.add(ticker.trim()).await {
            Ok(snapshot) => {
                tracing::info!("Added {} to watchlist", ticker.trim());
                self.events.publish(WatchlistEvent::Changed {
                    snapshot: snapshot.clone(),
                });
                Ok(snapshot)
            }
            Err(e) => {
                tracing::warn!("Add of {} failed: {}", ticker.trim(), e);
                self.events.report(&e);
                Err(e)
            }
        }
    }

    async fn add(&self, ticker: &str) -> Result<Snapshot, WatchlistError> {
        if !is_valid_ticker(ticker) {
            return Err(WatchlistError::InvalidData(format!("invalid ticker {:?}", ticker)));
        }

        // The placeholder reserves the ticker before any request goes out
        let placeholder = {
            let mut store = self.store.write().await;
            store.insert(ticker, true)?;
            store.snapshot()
        };
        self.events.publish(WatchlistEvent::Changed {
            snapshot: placeholder,
        });

        let added = match tokio::time::timeout(self.timeout, self.gateway.add_ticker(&self.user_id, ticker)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ WatchlistError::Add { .. })) => Err(e),
            Ok(Err(e)) => Err(add_error(ticker, e)),
            Err(_) => Err(add_error(ticker, WatchlistError::Timeout(self.timeout))),
        };
        if let Err(e) = added {
            self.drop_placeholder(ticker).await;
            return Err(e);
        }

        let quote = match tokio::time::timeout(self.timeout, self.gateway.fetch_quote(ticker)).await {
            Ok(result) => result,
            Err(_) => Err(WatchlistError::Timeout(self.timeout)),
        };

        match quote {
            Ok(update) => {
                let mut store = self.store.write().await;
                store.merge(&[update]);
                Ok(store.snapshot())
            }
            Err(e) => {
                self.drop_placeholder(ticker).await;
                self.roll_back_remote(ticker).await;
                Err(add_error(ticker, e))
            }
        }
    }

    async fn drop_placeholder(&self, ticker: &str) {
        let snapshot = {
            let mut store = self.store.write().await;
            let _ = store.remove(ticker);
            store.snapshot()
        };
        self.events.publish(WatchlistEvent::Changed { snapshot });
    }

    /// Best-effort removal of a ticker the remote store accepted but we never showed
    async fn roll_back_remote(&self, ticker: &str) {
        match tokio::time::timeout(self.timeout, self.gateway.remove_ticker(&self.user_id, ticker)).await {
            Ok(Ok(())) => tracing::debug!("Rolled back remote add of {}", ticker),
            Ok(Err(e)) => tracing::warn!("Could not roll back remote add of {}: {}", ticker, e),
            Err(_) => tracing::warn!("Rollback of remote add of {} timed out", ticker),
        }
    }
}

fn add_error(ticker: &str, cause: WatchlistError) -> WatchlistError {
    WatchlistError::Add {
        ticker: ticker.to_string(),
        message: cause.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoticeLevel;
    use crate::store::WatchlistStore;
    use crate::testing::{Call, ScriptedGateway};
    use rust_decimal_macros::dec;
    use tokio::sync::broadcast::Receiver;
    use watchlist_core::{InstrumentRecord, QuoteUpdate};

    fn build(gateway: Arc<ScriptedGateway>) -> (SearchController, SharedStore, EventBus) {
        let mut store = WatchlistStore::new();
        store.initialize(
            ["CWEB", "KTEC", "PLTR"]
                .iter()
                .map(|t| InstrumentRecord::new(*t))
                .collect(),
        );
        let store = store.into_shared();
        let events = EventBus::new(64, Duration::from_secs(4));
        let controller = SearchController::new(
            store.clone(),
            gateway,
            events.clone(),
            "trader@example.com",
            Duration::from_millis(300),
            Duration::from_secs(5),
        );
        (controller, store, events)
    }

    fn drain(rx: &mut Receiver<WatchlistEvent>) -> Vec<WatchlistEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        seen
    }

    fn apple() -> Suggestion {
        Suggestion::new("AAPL", "Apple Inc.", "NMS")
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_burst_sends_one_lookup() {
        let gateway = Arc::new(ScriptedGateway::new().with_suggestions(vec![apple()]));
        let (controller, _store, _events) = build(gateway.clone());

        for text in ["A", "AA", "AAP"] {
            controller.on_input(text).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(gateway.calls(), vec![Call::Suggest("AAP".to_string())]);
        assert_eq!(controller.results().await, vec![apple()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_clears_without_request() {
        let gateway = Arc::new(ScriptedGateway::new().with_suggestions(vec![apple()]));
        let (controller, _store, events) = build(gateway.clone());
        let mut rx = events.subscribe();

        controller.on_input("AAP").await;
        controller.on_input("   ").await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(gateway.calls().is_empty());
        assert!(controller.results().await.is_empty());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [WatchlistEvent::SearchCleared]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_lookup_uses_local_catalog() {
        let gateway = Arc::new(ScriptedGateway::new());
        let (controller, _store, _events) = build(gateway);

        controller.on_input("corp").await;
        controller.flush().await;

        let tickers: Vec<_> = controller.results().await.into_iter().map(|s| s.ticker).collect();
        assert_eq!(tickers, vec!["MSFT", "NVDA"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_success() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_suggestions(vec![apple()])
                .with_quote(
                    QuoteUpdate::new("AAPL")
                        .with_price(dec!(176.38))
                        .with_company_name("Apple Inc."),
                ),
        );
        let (controller, store, _events) = build(gateway.clone());

        controller.on_input("AAP").await;
        controller.flush().await;
        let snapshot = controller.pick(0).await.unwrap();

        assert_eq!(snapshot.len(), 4);
        let added = &snapshot[3];
        assert_eq!(added.ticker, "AAPL");
        assert_eq!(added.price, dec!(176.38));
        assert!(!added.pending);
        assert!(store.read().await.contains("AAPL"));
        assert!(controller.results().await.is_empty());
        assert_eq!(
            gateway.calls()[1..],
            [Call::Add("AAPL".to_string()), Call::FetchQuote("AAPL".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_rolls_back_when_quote_fails() {
        let gateway = Arc::new(ScriptedGateway::new());
        let (controller, store, events) = build(gateway.clone());
        let mut rx = events.subscribe();

        let err = controller.select("AAPL").await.unwrap_err();

        assert!(matches!(err, WatchlistError::Add { ref ticker, .. } if ticker == "AAPL"));
        assert!(!store.read().await.contains("AAPL"));
        assert_eq!(store.read().await.tickers(), vec!["CWEB", "KTEC", "PLTR"]);
        assert_eq!(
            gateway.calls(),
            vec![
                Call::Add("AAPL".to_string()),
                Call::FetchQuote("AAPL".to_string()),
                Call::Remove("AAPL".to_string()),
            ]
        );

        let notices: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                WatchlistEvent::Notice(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_failure_makes_no_local_change() {
        let gateway = Arc::new(ScriptedGateway::new().failing_add("AAPL"));
        let (controller, store, _events) = build(gateway.clone());

        let err = controller.select("AAPL").await.unwrap_err();

        assert!(matches!(err, WatchlistError::Add { .. }));
        assert!(!store.read().await.contains("AAPL"));
        assert_eq!(gateway.calls(), vec![Call::Add("AAPL".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_is_rejected_before_network() {
        let gateway = Arc::new(ScriptedGateway::new());
        let (controller, store, _events) = build(gateway.clone());

        let err = controller.select("KTEC").await.unwrap_err();

        assert_eq!(err, WatchlistError::DuplicateTicker("KTEC".to_string()));
        assert!(gateway.calls().is_empty());
        assert_eq!(store.read().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_selects_send_one_add() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .slow_add(Duration::from_millis(80))
                .with_quote(QuoteUpdate::new("AAPL").with_price(dec!(176.38))),
        );
        let (controller, store, _events) = build(gateway.clone());

        let (first, second) = tokio::join!(controller.select("AAPL"), controller.select("AAPL"));

        let outcomes = [&first, &second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(WatchlistError::DuplicateTicker(t)) if t == "AAPL")));

        let adds = gateway
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Add(_)))
            .count();
        assert_eq!(adds, 1);
        assert_eq!(store.read().await.tickers(), vec!["CWEB", "KTEC", "PLTR", "AAPL"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pick_out_of_range() {
        let gateway = Arc::new(ScriptedGateway::new());
        let (controller, _store, _events) = build(gateway);

        assert_eq!(
            controller.pick(0).await.unwrap_err(),
            WatchlistError::InvalidIndex { index: 0, len: 0 }
        );
    }
}
