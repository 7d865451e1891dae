//! Console render sink
//!
//! Turns watchlist events into terminal output. This is the only place the
//! agent writes to stdout.

use rust_decimal::Decimal;
use std::fmt::Display;
use tokio::sync::broadcast::{self, error::RecvError};
use watchlist_core::InstrumentRecord;
use watchlist_sync::{InitSource, NoticeLevel, WatchlistEvent};

fn signed(value: Decimal) -> String {
    if value.is_sign_negative() {
        format!("{}", value.round_dp(2))
    } else {
        format!("+{}", value.round_dp(2))
    }
}

pub fn format_record(position: usize, record: &InstrumentRecord) -> String {
    if record.pending {
        return format!("{:>2}. {:<8} loading...", position, record.ticker);
    }

    let mut line = format!(
        "{:>2}. {:<8} {:<28} {:>10} {:>8} ({}%) {}",
        position,
        record.ticker,
        record.company_name,
        record.price.round_dp(2),
        signed(record.price_change),
        signed(record.price_change_percent),
        record.market_state.as_str(),
    );
    if let Some(ext) = &record.extended {
        line.push_str(&format!(
            " | {} {} {} ({}%)",
            ext.session.label(),
            ext.price.round_dp(2),
            signed(ext.change),
            signed(ext.change_percent),
        ));
    }
    if let Some(at) = record.last_updated {
        line.push_str(&format!(" @ {}", at.format("%H:%M:%S")));
    }
    line
}

pub const HELP: &str = "commands: add <TICKER> | rm <TICKER> | mv <FROM> <TO> | search <TEXT> | pick <N> | list | help | quit";

pub fn print_help() {
    println!("{}", HELP);
}

/// Rejected console input, followed by the command list
pub fn format_error(error: &dyn Display) -> String {
    format!("{} ({})", error, HELP)
}

pub fn print_error(error: &dyn Display) {
    println!("{}", format_error(error));
}

pub fn print_table(records: &[InstrumentRecord]) {
    if records.is_empty() {
        println!("(watchlist is empty)");
        return;
    }
    for (i, record) in records.iter().enumerate() {
        println!("{}", format_record(i + 1, record));
    }
}

fn render(event: WatchlistEvent) {
    match event {
        WatchlistEvent::Initialized { source, snapshot } => {
            if source == InitSource::Seed {
                println!("Showing sample watchlist (could not load yours)");
            }
            print_table(&snapshot);
        }
        WatchlistEvent::Refreshed {
            updated,
            failed,
            snapshot,
        } => {
            tracing::debug!("{} refreshed, stale: {:?}", updated, failed);
            print_table(&snapshot);
        }
        WatchlistEvent::Changed { snapshot } => print_table(&snapshot),
        WatchlistEvent::SearchResults { query, suggestions } => {
            if suggestions.is_empty() {
                println!("No matches for '{}'", query);
            }
            for (i, suggestion) in suggestions.iter().enumerate() {
                println!("  [{}] {}", i + 1, suggestion.display);
            }
        }
        WatchlistEvent::SearchCleared => {}
        WatchlistEvent::OrderPersisted { tickers } => {
            tracing::info!("Saved order: {}", tickers.join(", "));
        }
        WatchlistEvent::Notice(notice) => {
            let tag = match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Error => "error",
            };
            println!("[{}] {}", tag, notice.message);
        }
    }
}

/// Render events until the channel closes
pub async fn run(mut events: broadcast::Receiver<WatchlistEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => render(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Render sink fell behind, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
