//! Watchlist Sync
//!
//! Keeps a user's ordered watchlist authoritative locally while quotes,
//! reorders, adds and removes flow to and from the remote service.

pub mod config;
pub mod debounce;
pub mod events;
pub mod reorder;
pub mod scheduler;
pub mod search;
pub mod seed;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::SyncConfig;
pub use debounce::Debouncer;
pub use events::{EventBus, Notice, NoticeLevel, WatchlistEvent};
pub use reorder::ReorderController;
pub use scheduler::{CycleReport, RefreshScheduler, SchedulerState};
pub use search::SearchController;
pub use session::WatchlistSession;
pub use store::{InitSource, SharedStore, Snapshot, WatchlistStore};
