//! Market data source trait and structured upstream error types.
//!
//! The MarketDataSource trait abstracts over the provider so the scheduler can
//! be driven by a scripted source in tests.

use super::responses::{HistoryResponse, NewsResponse};
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("start date {start} cannot be after end date {end}")]
    InvalidRange { start: String, end: String },

    #[error("no API keys configured")]
    NoApiKeys,

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("provider returned HTTP {status}")]
    Transport { status: u16 },

    #[error("error decoding response: {0}")]
    Decode(String),

    #[error("no results found for {symbol}")]
    NoResults { symbol: String },
}

impl UpstreamError {
    /// Whether a second attempt at the same request can reasonably succeed.
    ///
    /// Connection failures, timeouts, truncated bodies, 408, 429 and 5xx are
    /// transient. Everything else (bad range, empty result set, other 4xx)
    /// fails the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Decode(_) => true,
            Self::Transport { status } => *status >= 500 || *status == 408 || *status == 429,
            Self::InvalidRange { .. }
            | Self::NoApiKeys
            | Self::Client(_)
            | Self::NoResults { .. } => false,
        }
    }
}

/// Source of daily price history and news for a ticker.
///
/// Methods take `&mut self`: every call advances the source's API key rotation.
pub trait MarketDataSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Daily aggregates for `symbol` over `[start, end]` (calendar days, inclusive).
    ///
    /// `limit == 0` means the provider default.
    fn fetch_history(
        &mut self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        limit: u32,
    ) -> Result<HistoryResponse, UpstreamError>;

    /// News for `symbol` published within `[start, end]`, newest first.
    ///
    /// `limit == 0` means the provider default.
    fn fetch_news(
        &mut self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<NewsResponse, UpstreamError>;
}
