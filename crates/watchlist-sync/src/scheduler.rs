//! Refresh Scheduler
//!
//! Polls one quote per tracked ticker on a fixed interval and merges the
//! successes back into the store. A cycle never waits on the previous one:
//! every tick spawns an independent fetch set bounded by the request
//! timeout.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use watchlist_core::WatchlistGateway;

use crate::events::{EventBus, WatchlistEvent};
use crate::store::SharedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Polling,
}

/// Outcome of one polling cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub requested: usize,
    pub updated: usize,
    pub failed: Vec<String>,
}

#[derive(Clone)]
struct Poller {
    store: SharedStore,
    gateway: Arc<dyn WatchlistGateway>,
    events: EventBus,
    timeout: Duration,
}

impl Poller {
    async fn run_cycle(&self) -> CycleReport {
        let tickers = self.store.read().await.tickers();
        if tickers.is_empty() {
            return CycleReport::default();
        }

        let fetches = tickers.iter().map(|ticker| async move {
            let result = tokio::time::timeout(self.timeout, self.gateway.fetch_quote(ticker)).await;
            (ticker, result)
        });

        let mut updates = Vec::with_capacity(tickers.len());
        let mut failed = Vec::new();
        for (ticker, result) in join_all(fetches).await {
            match result {
                Ok(Ok(update)) => updates.push(update),
                Ok(Err(e)) => {
                    tracing::warn!("Skipping {} this cycle: {}", ticker, e);
                    failed.push(ticker.clone());
                }
                Err(_) => {
                    tracing::warn!("Quote for {} timed out after {:?}", ticker, self.timeout);
                    failed.push(ticker.clone());
                }
            }
        }

        let (updated, snapshot) = {
            let mut store = self.store.write().await;
            let updated = store.merge(&updates);
            (updated, store.snapshot())
        };

        tracing::debug!(
            "Refresh cycle: {} requested, {} updated, {} failed",
            tickers.len(),
            updated,
            failed.len()
        );

        self.events.publish(WatchlistEvent::Refreshed {
            updated,
            failed: failed.clone(),
            snapshot,
        });

        CycleReport {
            requested: tickers.len(),
            updated,
            failed,
        }
    }
}

pub struct RefreshScheduler {
    poller: Poller,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        store: SharedStore,
        gateway: Arc<dyn WatchlistGateway>,
        events: EventBus,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            poller: Poller {
                store,
                gateway,
                events,
                timeout,
            },
            interval,
            task: Mutex::new(None),
        }
    }

    /// Enter Polling. The first cycle runs immediately.
    ///
    /// Does nothing if already polling. The loop drops back to Idle on its
    /// own once the store is empty.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let poller = self.poller.clone();
        let period = self.interval;
        tracing::info!("Starting quote polling every {:?}", period);

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Dropping the set aborts cycles still in flight
            let mut cycles = JoinSet::new();
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if poller.store.read().await.is_empty() {
                            tracing::info!("Watchlist is empty, polling stopped");
                            break;
                        }
                        let cycle = poller.clone();
                        cycles.spawn(async move {
                            cycle.run_cycle().await;
                        });
                    }
                    Some(_) = cycles.join_next(), if !cycles.is_empty() => {}
                }
            }
        }));
    }

    pub async fn stop(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
            tracing::info!("Quote polling stopped");
        }
    }

    pub async fn state(&self) -> SchedulerState {
        match self.task.lock().await.as_ref() {
            Some(task) if !task.is_finished() => SchedulerState::Polling,
            _ => SchedulerState::Idle,
        }
    }

    /// Run a single cycle inline
    pub async fn run_cycle(&self) -> CycleReport {
        self.poller.run_cycle().await
    }
}
