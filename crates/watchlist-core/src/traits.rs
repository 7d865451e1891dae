use async_trait::async_trait;
use crate::{InstrumentRecord, QuoteUpdate, Suggestion, WatchlistError};

/// Typed access to the remote watchlist service.
///
/// Every call is a single request/response. Implementations do not retry;
/// retry policy belongs to the caller.
#[async_trait]
pub trait WatchlistGateway: Send + Sync {
    /// Load the persisted watchlist for a user, in display order
    async fn fetch_watchlist(&self, user_id: &str) -> Result<Vec<InstrumentRecord>, WatchlistError>;

    /// Fetch the latest quote fields for one ticker.
    ///
    /// An explicit error payload from upstream comes back as
    /// `WatchlistError::Quote`; connection problems as `Transport`.
    async fn fetch_quote(&self, ticker: &str) -> Result<QuoteUpdate, WatchlistError>;

    /// Append a ticker to the user's persisted watchlist
    async fn add_ticker(&self, user_id: &str, ticker: &str) -> Result<(), WatchlistError>;

    /// Delete a ticker from the user's persisted watchlist
    async fn remove_ticker(&self, user_id: &str, ticker: &str) -> Result<(), WatchlistError>;

    /// Replace the persisted order with `tickers`
    async fn persist_order(&self, user_id: &str, tickers: &[String]) -> Result<(), WatchlistError>;

    /// Resolve free text to tradable symbols, best match first
    async fn suggest(&self, prefix: &str) -> Result<Vec<Suggestion>, WatchlistError>;
}
