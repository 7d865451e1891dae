use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use watchlist_core::{
    ExtendedQuote, ExtendedSession, InstrumentRecord, MarketState, QuoteUpdate, Suggestion,
    WatchlistError, WatchlistGateway,
};

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Which quote route the upstream exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuoteEndpoint {
    /// `GET /stockprice/{ticker}`
    #[default]
    StockPrice,
    /// `GET /stock/{ticker}`
    Stock,
}

impl QuoteEndpoint {
    pub fn path_segment(&self) -> &'static str {
        match self {
            QuoteEndpoint::StockPrice => "stockprice",
            QuoteEndpoint::Stock => "stock",
        }
    }
}

impl FromStr for QuoteEndpoint {
    type Err = WatchlistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stockprice" => Ok(QuoteEndpoint::StockPrice),
            "stock" => Ok(QuoteEndpoint::Stock),
            other => Err(WatchlistError::InvalidData(format!(
                "unknown quote endpoint '{}' (expected 'stockprice' or 'stock')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Upper bound on any single request
    pub request_timeout: Duration,
    pub quote_endpoint: QuoteEndpoint,
    /// Maximum number of suggestions returned by `suggest`
    pub suggestion_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(5),
            quote_endpoint: QuoteEndpoint::default(),
            suggestion_limit: 10,
        }
    }
}

/// `WatchlistGateway` backed by the watchlist HTTP service
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, WatchlistError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            WatchlistError::InvalidData(format!("invalid base url '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(WatchlistError::InvalidData(format!(
                "base url '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WatchlistError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// Join path segments onto the base url, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url, WatchlistError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                WatchlistError::InvalidData(format!("base url '{}' cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, WatchlistError> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                WatchlistError::Timeout(self.config.request_timeout)
            } else {
                WatchlistError::Transport(e.to_string())
            }
        })
    }
}

async fn http_error(response: Response) -> String {
    let status = response.status();
    format!("HTTP {}: {}", status, response.text().await.unwrap_or_default())
}

#[async_trait]
impl WatchlistGateway for HttpGateway {
    async fn fetch_watchlist(&self, user_id: &str) -> Result<Vec<InstrumentRecord>, WatchlistError> {
        let url = self.url(&["watchlist", user_id])?;
        let response = self
            .send(self.client.get(url))
            .await
            .map_err(|e| WatchlistError::Load(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WatchlistError::Load(http_error(response).await));
        }

        let records: Vec<InstrumentRecord> = response
            .json()
            .await
            .map_err(|e| WatchlistError::Load(format!("malformed watchlist: {}", e)))?;

        tracing::debug!("Loaded {} watchlist entries for {}", records.len(), user_id);
        Ok(records)
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<QuoteUpdate, WatchlistError> {
        let url = self.url(&[self.config.quote_endpoint.path_segment(), ticker])?;
        let response = self.send(self.client.get(url)).await?;

        if !response.status().is_success() {
            return Err(WatchlistError::Transport(format!(
                "quote {} failed: {}",
                ticker,
                http_error(response).await
            )));
        }

        let body: QuoteResponse = response.json().await.map_err(|e| WatchlistError::Quote {
            ticker: ticker.to_string(),
            message: format!("malformed quote: {}", e),
        })?;

        body.into_update(ticker, Utc::now())
    }

    async fn add_ticker(&self, user_id: &str, ticker: &str) -> Result<(), WatchlistError> {
        let add_error = |message: String| WatchlistError::Add {
            ticker: ticker.to_string(),
            message,
        };

        let url = self.url(&["watchlist", "add"])?;
        let response = self
            .send(
                self.client
                    .post(url)
                    .query(&[("ticker", ticker), ("user_email", user_id)]),
            )
            .await
            .map_err(|e| add_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(add_error(http_error(response).await));
        }

        tracing::info!("Added {} to remote watchlist", ticker);
        Ok(())
    }

    async fn remove_ticker(&self, user_id: &str, ticker: &str) -> Result<(), WatchlistError> {
        let remove_error = |message: String| WatchlistError::Remove {
            ticker: ticker.to_string(),
            message,
        };

        let url = self.url(&["watchlist", user_id, ticker])?;
        let response = self
            .send(self.client.delete(url))
            .await
            .map_err(|e| remove_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(remove_error(http_error(response).await));
        }

        tracing::info!("Removed {} from remote watchlist", ticker);
        Ok(())
    }

    async fn persist_order(&self, user_id: &str, tickers: &[String]) -> Result<(), WatchlistError> {
        let url = self.url(&["watchlist", "reorder"])?;
        let body = ReorderRequest {
            user_email: user_id,
            tickers,
        };
        let response = self
            .send(self.client.post(url).json(&body))
            .await
            .map_err(|e| WatchlistError::Persist(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WatchlistError::Persist(http_error(response).await));
        }

        tracing::debug!("Persisted order of {} tickers", tickers.len());
        Ok(())
    }

    async fn suggest(&self, prefix: &str) -> Result<Vec<Suggestion>, WatchlistError> {
        if prefix.trim().is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url(&["autocomplete", prefix])?;
        let response = self.send(self.client.get(url)).await?;

        if !response.status().is_success() {
            tracing::warn!(
                "Autocomplete for '{}' failed ({}), returning no suggestions",
                prefix,
                response.status()
            );
            return Ok(Vec::new());
        }

        let body: SuggestResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Malformed autocomplete response for '{}': {}", prefix, e);
                return Ok(Vec::new());
            }
        };

        Ok(body
            .into_entries()
            .into_iter()
            .filter_map(SuggestionEntry::into_suggestion)
            .take(self.config.suggestion_limit)
            .collect())
    }
}

// Request structures
#[derive(Debug, Serialize)]
struct ReorderRequest<'a> {
    user_email: &'a str,
    tickers: &'a [String],
}

// Response structures

/// Quote payload. Covers both the `/stockprice` shape and the older
/// `/stock` shape (`symbol`, `latest_price`, `change`).
#[derive(Debug, Default, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default, alias = "latest_price")]
    price: Option<Decimal>,
    #[serde(default, alias = "previous_close", alias = "previousClose")]
    prev_close: Option<Decimal>,
    #[serde(default, alias = "change", alias = "priceChange")]
    price_change: Option<Decimal>,
    #[serde(default, alias = "priceChangePercent")]
    price_change_percent: Option<Decimal>,
    #[serde(default, alias = "companyName", alias = "name")]
    company_name: Option<String>,
    #[serde(default, alias = "logoUrl")]
    logo_url: Option<String>,
    #[serde(default, alias = "marketState")]
    market_state: Option<String>,
    #[serde(default)]
    extended_price: Option<Decimal>,
    #[serde(default)]
    extended_type: Option<String>,
    #[serde(default)]
    extended_change: Option<Decimal>,
    #[serde(default)]
    extended_change_percent: Option<Decimal>,
}

impl QuoteResponse {
    /// Convert into a partial record for `ticker`.
    ///
    /// The requested ticker is kept as the identity even if the upstream
    /// echoes a differently formatted symbol.
    fn into_update(self, ticker: &str, as_of: DateTime<Utc>) -> Result<QuoteUpdate, WatchlistError> {
        if let Some(message) = self.error {
            return Err(WatchlistError::Quote {
                ticker: ticker.to_string(),
                message,
            });
        }

        let extended = self.extended_quote();
        Ok(QuoteUpdate {
            ticker: ticker.to_string(),
            company_name: self.company_name,
            price: self.price,
            previous_close: self.prev_close,
            price_change: self.price_change,
            price_change_percent: self.price_change_percent,
            market_state: self.market_state.as_deref().and_then(MarketState::from_upstream),
            extended,
            logo_url: self.logo_url,
            as_of: Some(as_of),
        })
    }

    fn extended_quote(&self) -> Option<ExtendedQuote> {
        let price = self.extended_price?;
        let session = self
            .extended_type
            .as_deref()
            .and_then(ExtendedSession::from_upstream)?;

        if let (Some(change), Some(change_percent)) =
            (self.extended_change, self.extended_change_percent)
        {
            return Some(ExtendedQuote {
                session,
                price,
                change,
                change_percent,
            });
        }

        let base = match session {
            ExtendedSession::PreMarket => self.prev_close,
            ExtendedSession::PostMarket => self.price,
        }?;
        ExtendedQuote::derive(session, price, base)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuggestResponse {
    List(Vec<SuggestionEntry>),
    Wrapped {
        #[serde(default)]
        suggestions: Vec<SuggestionEntry>,
    },
}

impl SuggestResponse {
    fn into_entries(self) -> Vec<SuggestionEntry> {
        match self {
            SuggestResponse::List(entries) => entries,
            SuggestResponse::Wrapped { suggestions } => suggestions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SuggestionEntry {
    #[serde(default, alias = "ticker")]
    symbol: Option<String>,
    #[serde(default, alias = "shortname", alias = "longname")]
    name: Option<String>,
    #[serde(default)]
    exchange: Option<String>,
}

impl SuggestionEntry {
    fn into_suggestion(self) -> Option<Suggestion> {
        let symbol = self.symbol.filter(|s| !s.is_empty())?;
        let name = self.name.filter(|n| !n.is_empty())?;
        Some(Suggestion::new(symbol, name, self.exchange.unwrap_or_default()))
    }
}
