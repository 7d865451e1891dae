//! Reorder Controller
//!
//! Applies drag-and-drop moves to the store immediately and persists the
//! resulting order after a quiet period. A failed persist is reported but
//! the local order is kept.

use std::sync::Arc;
use std::time::Duration;
use watchlist_core::{WatchlistError, WatchlistGateway};

use crate::debounce::Debouncer;
use crate::events::{EventBus, WatchlistEvent};
use crate::store::SharedStore;

pub struct ReorderController {
    store: SharedStore,
    gateway: Arc<dyn WatchlistGateway>,
    events: EventBus,
    user_id: Arc<str>,
    debouncer: Debouncer,
}

impl ReorderController {
    pub fn new(
        store: SharedStore,
        gateway: Arc<dyn WatchlistGateway>,
        events: EventBus,
        user_id: impl Into<Arc<str>>,
        debounce: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            events,
            user_id: user_id.into(),
            debouncer: Debouncer::new(debounce),
        }
    }

    /// Handle a drag from `source` to `target` (display indices).
    ///
    /// Returns the index the record ended up at.
    pub async fn on_drop(&self, source: usize, target: usize) -> Result<usize, WatchlistError> {
        let ticker = {
            let store = self.store.read().await;
            store.ticker_at(source).ok_or(WatchlistError::InvalidIndex {
                index: source,
                len: store.len(),
            })?
        };
        self.move_ticker(&ticker, target).await
    }

    pub async fn move_ticker(&self, ticker: &str, target: usize) -> Result<usize, WatchlistError> {
        let (from, to, snapshot) = {
            let mut store = self.store.write().await;
            let from = store
                .position(ticker)
                .ok_or_else(|| WatchlistError::NotFound(ticker.to_string()))?;
            let to = store.reorder(ticker, target)?;
            (from, to, store.snapshot())
        };

        if from == to {
            return Ok(to);
        }

        tracing::debug!("Moved {} from {} to {}", ticker, from, to);
        self.events.publish(WatchlistEvent::Changed { snapshot });
        self.schedule_persist().await;
        Ok(to)
    }

    /// Run a pending persist now instead of waiting for the quiet period
    pub async fn flush(&self) {
        self.debouncer.flush().await;
    }

    async fn schedule_persist(&self) {
        let store = self.store.clone();
        let gateway = self.gateway.clone();
        let events = self.events.clone();
        let user_id = self.user_id.clone();

        self.debouncer
            .schedule(async move {
                // Read at fire time so a burst of moves sends only the final order
                let tickers = store.read().await.tickers();
                match gateway.persist_order(&user_id, &tickers).await {
                    Ok(()) => {
                        tracing::debug!("Persisted order of {} tickers", tickers.len());
                        events.publish(WatchlistEvent::OrderPersisted { tickers });
                    }
                    Err(e) => {
                        tracing::warn!("Keeping local order after persist failure: {}", e);
                        events.report(&e);
                    }
                }
            })
            .await;
    }
}
