use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::WatchlistError;

/// Trading session an instrument's quote belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketState {
    PreMarket,
    Regular,
    PostMarket,
    Closed,
    #[default]
    Unknown,
}

impl MarketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketState::PreMarket => "PRE_MARKET",
            MarketState::Regular => "REGULAR",
            MarketState::PostMarket => "POST_MARKET",
            MarketState::Closed => "CLOSED",
            MarketState::Unknown => "UNKNOWN",
        }
    }

    /// Parse an upstream market-state label.
    ///
    /// Returns `None` for an empty label (field not provided), and
    /// `Unknown` for a label we don't recognise.
    pub fn from_upstream(raw: &str) -> Option<Self> {
        let state = match raw.trim().to_ascii_uppercase().as_str() {
            "" => return None,
            "PRE" | "PREPRE" | "PRE_MARKET" => MarketState::PreMarket,
            "REGULAR" => MarketState::Regular,
            "POST" | "POSTPOST" | "POST_MARKET" => MarketState::PostMarket,
            "CLOSED" => MarketState::Closed,
            _ => MarketState::Unknown,
        };
        Some(state)
    }
}

impl<'de> Deserialize<'de> for MarketState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .and_then(MarketState::from_upstream)
            .unwrap_or_default())
    }
}

/// Extended trading window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtendedSession {
    #[serde(alias = "PRE", alias = "PREPRE")]
    PreMarket,
    #[serde(alias = "POST", alias = "POSTPOST")]
    PostMarket,
}

impl ExtendedSession {
    pub fn from_upstream(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PRE" | "PREPRE" | "PRE_MARKET" => Some(ExtendedSession::PreMarket),
            "POST" | "POSTPOST" | "POST_MARKET" => Some(ExtendedSession::PostMarket),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExtendedSession::PreMarket => "Pre-market",
            ExtendedSession::PostMarket => "After hours",
        }
    }
}

/// Quote from the pre- or post-market session.
///
/// All four fields are always present together; a record without an
/// extended-session quote holds `None` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedQuote {
    #[serde(rename = "type")]
    pub session: ExtendedSession,
    pub price: Decimal,
    pub change: Decimal,
    #[serde(alias = "changePercent")]
    pub change_percent: Decimal,
}

impl ExtendedQuote {
    /// Build an extended quote by measuring `price` against `base`.
    ///
    /// Pre-market quotes are measured against the previous close and
    /// post-market quotes against the regular-session price. Returns `None`
    /// when there is no usable base.
    pub fn derive(session: ExtendedSession, price: Decimal, base: Decimal) -> Option<Self> {
        if base <= Decimal::ZERO || price.is_sign_negative() {
            return None;
        }
        let change = price - base;
        let change_percent = change
            .checked_div(base)?
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp(4);
        Some(Self {
            session,
            price,
            change,
            change_percent,
        })
    }
}

/// Treat an explicit `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One tracked instrument. `ticker` is the identity and never changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub ticker: String,
    #[serde(default, alias = "companyName", deserialize_with = "null_as_default")]
    pub company_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: Decimal,
    #[serde(
        default,
        alias = "previousClose",
        alias = "prev_close",
        deserialize_with = "null_as_default"
    )]
    pub previous_close: Decimal,
    #[serde(default, alias = "priceChange", deserialize_with = "null_as_default")]
    pub price_change: Decimal,
    #[serde(default, alias = "priceChangePercent", deserialize_with = "null_as_default")]
    pub price_change_percent: Decimal,
    #[serde(default, alias = "marketState")]
    pub market_state: MarketState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedQuote>,
    #[serde(default, alias = "logoUrl", skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// When a quote last refreshed this record
    #[serde(default, alias = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Inserted locally, waiting for its first quote
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl InstrumentRecord {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Default::default()
        }
    }

    /// Record with no market data yet, shown until the first quote arrives
    pub fn placeholder(ticker: impl Into<String>) -> Self {
        Self {
            pending: true,
            ..Self::new(ticker)
        }
    }

    /// Check the record is acceptable as an authoritative entry
    pub fn validate(&self) -> Result<(), WatchlistError> {
        if !is_valid_ticker(&self.ticker) {
            return Err(WatchlistError::InvalidData(format!(
                "invalid ticker {:?}",
                self.ticker
            )));
        }
        if self.price.is_sign_negative() || self.previous_close.is_sign_negative() {
            return Err(WatchlistError::InvalidData(format!(
                "{} has a negative price",
                self.ticker
            )));
        }
        Ok(())
    }

    /// Field-level merge of a partial update into this record.
    ///
    /// Each field takes the update's value when the update carries one and
    /// falls back to the current value otherwise. Zero prices and empty
    /// strings count as "not provided". The ticker is never touched.
    pub fn apply(&mut self, update: &QuoteUpdate) {
        if let Some(name) = update.company_name.as_deref().filter(|n| !n.is_empty()) {
            self.company_name = name.to_string();
        }
        if let Some(price) = update.price.filter(|p| *p > Decimal::ZERO) {
            self.price = price;
        }
        if let Some(prev) = update.previous_close.filter(|p| *p > Decimal::ZERO) {
            self.previous_close = prev;
        }
        if let Some(change) = update.price_change {
            self.price_change = change;
        }
        if let Some(pct) = update.price_change_percent {
            self.price_change_percent = pct;
        }
        if let Some(state) = update.market_state {
            self.market_state = state;
        }
        match (&update.extended, update.market_state) {
            (Some(ext), _) => self.extended = Some(ext.clone()),
            // Back in the regular session, an old extended quote is no longer meaningful
            (None, Some(MarketState::Regular)) => self.extended = None,
            (None, _) => {}
        }
        if let Some(logo) = update.logo_url.as_deref().filter(|l| !l.is_empty()) {
            self.logo_url = Some(logo.to_string());
        }
        if let Some(as_of) = update.as_of {
            self.last_updated = Some(as_of);
        }
        self.pending = false;
    }
}

/// Partial record keyed by ticker, as returned by a quote fetch.
/// `None` means the upstream did not provide that field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteUpdate {
    pub ticker: String,
    pub company_name: Option<String>,
    pub price: Option<Decimal>,
    pub previous_close: Option<Decimal>,
    pub price_change: Option<Decimal>,
    pub price_change_percent: Option<Decimal>,
    pub market_state: Option<MarketState>,
    pub extended: Option<ExtendedQuote>,
    pub logo_url: Option<String>,
    pub as_of: Option<DateTime<Utc>>,
}

impl QuoteUpdate {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Default::default()
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_company_name(mut self, name: impl Into<String>) -> Self {
        self.company_name = Some(name.into());
        self
    }

    pub fn with_market_state(mut self, state: MarketState) -> Self {
        self.market_state = Some(state);
        self
    }

    pub fn with_extended(mut self, extended: ExtendedQuote) -> Self {
        self.extended = Some(extended);
        self
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }
}

/// Typeahead suggestion from the search endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(alias = "symbol")]
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub display: String,
}

impl Suggestion {
    pub fn new(ticker: impl Into<String>, name: impl Into<String>, exchange: impl Into<String>) -> Self {
        let ticker = ticker.into();
        let name = name.into();
        let exchange = exchange.into();
        let display = if exchange.is_empty() {
            format!("{} - {}", ticker, name)
        } else {
            format!("{} - {} ({})", ticker, name, exchange)
        };
        Self {
            ticker,
            name,
            exchange,
            display,
        }
    }
}

/// Tickers are compared byte-for-byte; the only requirement is that they
/// are non-empty and contain no whitespace.
pub fn is_valid_ticker(ticker: &str) -> bool {
    !ticker.is_empty() && !ticker.chars().any(char::is_whitespace)
}
