//! Scripted in-memory gateway for exercising the sync engine

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use watchlist_core::{InstrumentRecord, QuoteUpdate, Suggestion, WatchlistError, WatchlistGateway};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchWatchlist(String),
    FetchQuote(String),
    Add(String),
    Remove(String),
    Persist(Vec<String>),
    Suggest(String),
}

#[derive(Default)]
pub struct ScriptedGateway {
    watchlist: Option<Vec<InstrumentRecord>>,
    quotes: HashMap<String, QuoteUpdate>,
    slow: HashMap<String, Duration>,
    suggestions: Option<Vec<Suggestion>>,
    add_delay: Option<Duration>,
    failing_add: HashSet<String>,
    failing_remove: HashSet<String>,
    failing_persist: bool,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watchlist(mut self, tickers: &[&str]) -> Self {
        self.watchlist = Some(tickers.iter().map(|t| InstrumentRecord::new(*t)).collect());
        self
    }

    pub fn with_quote(mut self, update: QuoteUpdate) -> Self {
        self.quotes.insert(update.ticker.clone(), update);
        self
    }

    /// Quote that resolves only after `delay`
    pub fn slow_quote(mut self, update: QuoteUpdate, delay: Duration) -> Self {
        self.slow.insert(update.ticker.clone(), delay);
        self.with_quote(update)
    }

    pub fn with_suggestions(mut self, suggestions: Vec<Suggestion>) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    /// Every `add_ticker` resolves only after `delay`
    pub fn slow_add(mut self, delay: Duration) -> Self {
        self.add_delay = Some(delay);
        self
    }

    pub fn failing_add(mut self, ticker: &str) -> Self {
        self.failing_add.insert(ticker.to_string());
        self
    }

    pub fn failing_remove(mut self, ticker: &str) -> Self {
        self.failing_remove.insert(ticker.to_string());
        self
    }

    pub fn failing_persist(mut self) -> Self {
        self.failing_persist = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn persisted(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Persist(tickers) => Some(tickers),
                _ => None,
            })
            .collect()
    }

    pub fn quote_calls(&self, ticker: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::FetchQuote(t) if t == ticker))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl WatchlistGateway for ScriptedGateway {
    async fn fetch_watchlist(&self, user_id: &str) -> Result<Vec<InstrumentRecord>, WatchlistError> {
        self.record(Call::FetchWatchlist(user_id.to_string()));
        self.watchlist
            .clone()
            .ok_or_else(|| WatchlistError::Load("HTTP 500: down".to_string()))
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<QuoteUpdate, WatchlistError> {
        self.record(Call::FetchQuote(ticker.to_string()));
        if let Some(delay) = self.slow.get(ticker) {
            tokio::time::sleep(*delay).await;
        }
        self.quotes.get(ticker).cloned().ok_or_else(|| WatchlistError::Quote {
            ticker: ticker.to_string(),
            message: "no data".to_string(),
        })
    }

    async fn add_ticker(&self, _user_id: &str, ticker: &str) -> Result<(), WatchlistError> {
        self.record(Call::Add(ticker.to_string()));
        if let Some(delay) = self.add_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_add.contains(ticker) {
            return Err(WatchlistError::Add {
                ticker: ticker.to_string(),
                message: "HTTP 500: boom".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_ticker(&self, _user_id: &str, ticker: &str) -> Result<(), WatchlistError> {
        self.record(Call::Remove(ticker.to_string()));
        if self.failing_remove.contains(ticker) {
            return Err(WatchlistError::Remove {
                ticker: ticker.to_string(),
                message: "HTTP 500: boom".to_string(),
            });
        }
        Ok(())
    }

    async fn persist_order(&self, _user_id: &str, tickers: &[String]) -> Result<(), WatchlistError> {
        self.record(Call::Persist(tickers.to_vec()));
        if self.failing_persist {
            return Err(WatchlistError::Persist("HTTP 503: unavailable".to_string()));
        }
        Ok(())
    }

    async fn suggest(&self, prefix: &str) -> Result<Vec<Suggestion>, WatchlistError> {
        self.record(Call::Suggest(prefix.to_string()));
        match &self.suggestions {
            Some(suggestions) => Ok(suggestions.clone()),
            None => Err(WatchlistError::Transport("connection refused".to_string())),
        }
    }
}
