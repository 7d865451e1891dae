//! Static data used when the remote service has nothing usable for us

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use watchlist_core::{ExtendedQuote, ExtendedSession, InstrumentRecord, MarketState, Suggestion};

fn seed(
    ticker: &str,
    name: &str,
    price: Decimal,
    previous_close: Decimal,
    change_percent: Decimal,
    pre_market: Option<Decimal>,
) -> InstrumentRecord {
    let market_state = if pre_market.is_some() {
        MarketState::PreMarket
    } else {
        MarketState::Closed
    };
    InstrumentRecord {
        company_name: name.to_string(),
        price,
        previous_close,
        price_change: price - previous_close,
        price_change_percent: change_percent,
        market_state,
        extended: pre_market
            .and_then(|p| ExtendedQuote::derive(ExtendedSession::PreMarket, p, previous_close)),
        ..InstrumentRecord::new(ticker)
    }
}

/// Watchlist shown when the initial load fails or returns nothing
pub fn seed_records() -> Vec<InstrumentRecord> {
    vec![
        seed("CWEB", "Direxion Dly CSI CH", dec!(43.63), dec!(45.01), dec!(-3.07), Some(dec!(40.90))),
        seed("KTEC", "KraneShares Hang", dec!(17.40), dec!(17.57), dec!(-0.97), Some(dec!(17.57))),
        seed("PLTR", "Palantir Techn", dec!(84.77), dec!(89.31), dec!(-5.08), Some(dec!(83.74))),
        seed(
            "2330.TW",
            "Taiwan Semiconductor Manufacturing Company",
            dec!(84.77),
            dec!(84.77),
            Decimal::ZERO,
            None,
        ),
    ]
}

/// Suggestions offered when the search endpoint returns nothing
pub fn fallback_catalog() -> Vec<Suggestion> {
    vec![
        Suggestion::new("AAPL", "Apple Inc.", "NASDAQ"),
        Suggestion::new("MSFT", "Microsoft Corp.", "NASDAQ"),
        Suggestion::new("NVDA", "NVIDIA Corp.", "NASDAQ"),
    ]
}

/// Case-insensitive substring match on ticker or name
pub fn local_matches(catalog: &[Suggestion], query: &str) -> Vec<Suggestion> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    catalog
        .iter()
        .filter(|s| {
            s.ticker.to_lowercase().contains(&needle) || s.name.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
