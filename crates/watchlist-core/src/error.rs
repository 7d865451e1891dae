use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WatchlistError {
    #[error("Failed to load watchlist: {0}")]
    Load(String),

    #[error("Quote unavailable for {ticker}: {message}")]
    Quote { ticker: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} is already in the watchlist")]
    DuplicateTicker(String),

    #[error("{0} is not in the watchlist")]
    NotFound(String),

    #[error("Index {index} is out of range for {len} entries")]
    InvalidIndex { index: usize, len: usize },

    #[error("Failed to add {ticker}: {message}")]
    Add { ticker: String, message: String },

    #[error("Failed to remove {ticker}: {message}")]
    Remove { ticker: String, message: String },

    #[error("Failed to save watchlist order: {0}")]
    Persist(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl WatchlistError {
    /// Whether the error should be shown to the user as a notice.
    ///
    /// Load and per-cycle quote failures are recovered silently (seed data,
    /// stale fields); everything raised by an explicit user action is shown.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            WatchlistError::Load(_)
                | WatchlistError::Quote { .. }
                | WatchlistError::Transport(_)
                | WatchlistError::Timeout(_)
        )
    }

    /// Ticker the error concerns, if any
    pub fn ticker(&self) -> Option<&str> {
        match self {
            WatchlistError::Quote { ticker, .. }
            | WatchlistError::Add { ticker, .. }
            | WatchlistError::Remove { ticker, .. } => Some(ticker),
            WatchlistError::DuplicateTicker(t) | WatchlistError::NotFound(t) => Some(t),
            _ => None,
        }
    }
}
