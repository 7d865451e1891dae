//! Watchlist Store
//!
//! Ordered, ticker-keyed collection of instrument records. All mutation goes
//! through the methods here so the one-record-per-ticker and ordering rules
//! hold no matter which component is calling.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use watchlist_core::{is_valid_ticker, InstrumentRecord, QuoteUpdate, WatchlistError};

use crate::seed;

/// Store shared between the scheduler and controllers
pub type SharedStore = Arc<RwLock<WatchlistStore>>;

/// Immutable ordered copy of the store for rendering
pub type Snapshot = Arc<[InstrumentRecord]>;

/// Where the initial contents of the store came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSource {
    Remote,
    Seed,
}

#[derive(Debug, Default)]
pub struct WatchlistStore {
    records: Vec<InstrumentRecord>,
}

impl WatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    /// Replace the whole collection.
    ///
    /// An empty or malformed sequence (invalid ticker, negative price,
    /// duplicate ticker) is replaced by the static seed set.
    pub fn initialize(&mut self, records: Vec<InstrumentRecord>) -> InitSource {
        match Self::check_initial(&records) {
            Ok(()) => {
                self.records = records;
                InitSource::Remote
            }
            Err(reason) => {
                tracing::warn!("Falling back to seed watchlist: {}", reason);
                self.records = seed::seed_records();
                InitSource::Seed
            }
        }
    }

    fn check_initial(records: &[InstrumentRecord]) -> Result<(), WatchlistError> {
        if records.is_empty() {
            return Err(WatchlistError::InvalidData("empty watchlist".to_string()));
        }
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            record.validate()?;
            if !seen.insert(record.ticker.as_str()) {
                return Err(WatchlistError::InvalidData(format!(
                    "duplicate ticker {}",
                    record.ticker
                )));
            }
        }
        Ok(())
    }

    /// Field-level merge of partial updates.
    ///
    /// Only records already in the store are touched; unknown tickers are
    /// dropped and tickers missing from `updates` keep their current values.
    /// Position never changes. Returns how many updates were applied.
    pub fn merge(&mut self, updates: &[QuoteUpdate]) -> usize {
        let mut applied = 0;
        for update in updates {
            match self.records.iter_mut().find(|r| r.ticker == update.ticker) {
                Some(record) => {
                    record.apply(update);
                    applied += 1;
                }
                None => {
                    tracing::debug!("Ignoring update for untracked ticker {}", update.ticker);
                }
            }
        }
        applied
    }

    /// Append a new record for `ticker` at the end of the order.
    ///
    /// With `placeholder` set the record is flagged as pending until its
    /// first merge.
    pub fn insert(&mut self, ticker: &str, placeholder: bool) -> Result<(), WatchlistError> {
        if !is_valid_ticker(ticker) {
            return Err(WatchlistError::InvalidData(format!("invalid ticker {:?}", ticker)));
        }
        if self.contains(ticker) {
            return Err(WatchlistError::DuplicateTicker(ticker.to_string()));
        }
        let record = if placeholder {
            InstrumentRecord::placeholder(ticker)
        } else {
            InstrumentRecord::new(ticker)
        };
        self.records.push(record);
        Ok(())
    }

    /// Delete `ticker`, closing the gap in the order
    pub fn remove(&mut self, ticker: &str) -> Result<InstrumentRecord, WatchlistError> {
        let index = self
            .position(ticker)
            .ok_or_else(|| WatchlistError::NotFound(ticker.to_string()))?;
        Ok(self.records.remove(index))
    }

    /// Move `ticker` to `new_index`, shifting the records in between.
    ///
    /// `new_index` is clamped to the last position. Returns the index the
    /// record ends up at.
    pub fn reorder(&mut self, ticker: &str, new_index: usize) -> Result<usize, WatchlistError> {
        let current = self
            .position(ticker)
            .ok_or_else(|| WatchlistError::NotFound(ticker.to_string()))?;
        let target = new_index.min(self.records.len() - 1);
        if target != current {
            let record = self.records.remove(current);
            self.records.insert(target, record);
        }
        Ok(target)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.records.iter().cloned().collect()
    }

    /// Tickers in display order
    pub fn tickers(&self) -> Vec<String> {
        self.records.iter().map(|r| r.ticker.clone()).collect()
    }

    pub fn get(&self, ticker: &str) -> Option<InstrumentRecord> {
        self.records.iter().find(|r| r.ticker == ticker).cloned()
    }

    pub fn ticker_at(&self, index: usize) -> Option<String> {
        self.records.get(index).map(|r| r.ticker.clone())
    }

    pub fn position(&self, ticker: &str) -> Option<usize> {
        self.records.iter().position(|r| r.ticker == ticker)
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.position(ticker).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
