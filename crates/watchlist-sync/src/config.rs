use std::time::Duration;

/// Timing knobs for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between quote polling cycles
    pub refresh_interval: Duration,
    /// Upper bound on any single gateway call made by the engine
    pub request_timeout: Duration,
    /// Quiet period before a reorder is persisted
    pub reorder_debounce: Duration,
    /// Quiet period before search text is sent upstream
    pub search_debounce: Duration,
    /// How long a notice stays on screen
    pub notice_ttl: Duration,
    /// Buffered events per subscriber
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            reorder_debounce: Duration::from_millis(300),
            search_debounce: Duration::from_millis(300),
            notice_ttl: Duration::from_secs(4),
            event_capacity: 256,
        }
    }
}
