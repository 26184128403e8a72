//! Polygon.io data source.
//!
//! One outbound GET per logical call. Each call sleeps for the configured
//! throttle before the request goes out and takes the next key from the pool.
//! No retries happen here; the window scheduler owns the retry policy.

use super::keys::{key_fingerprint, KeyPool};
use super::provider::{MarketDataSource, UpstreamError};
use super::responses::{ExpectedFields, HistoryResponse, NewsResponse};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::blocking::{Client, Request};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Provider cap used when the caller passes `limit == 0`.
pub const DEFAULT_HISTORY_LIMIT: u32 = 5000;

/// Provider cap used when the caller passes `limit == 0`.
pub const DEFAULT_NEWS_LIMIT: u32 = 300;

const NEWS_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone)]
pub struct PolygonSettings {
    pub base_url: String,
    /// Fixed sleep before every request.
    pub throttle: Duration,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl Default for PolygonSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            throttle: Duration::from_secs(12),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct PolygonClient {
    http: Client,
    base_url: String,
    keys: KeyPool,
    throttle: Duration,
}

impl PolygonClient {
    pub fn new(keys: Vec<String>, settings: PolygonSettings) -> Result<Self, UpstreamError> {
        let keys = KeyPool::new(keys)?;
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| UpstreamError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            keys,
            throttle: settings.throttle,
        })
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    /// Build the daily-aggregates request. Takes a key from the pool.
    pub fn history_request(
        &mut self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        limit: u32,
    ) -> Result<Request, UpstreamError> {
        if start > end {
            return Err(UpstreamError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        let limit = if limit == 0 { DEFAULT_HISTORY_LIMIT } else { limit };
        let url = format!(
            "{}/v2/aggs/ticker/{symbol}/range/1/day/{start}/{end}",
            self.base_url
        );
        let key = self.keys.next_key().to_string();
        tracing::debug!(symbol, %start, %end, key = %key_fingerprint(&key), "history request");

        self.http
            .get(url)
            .query(&[
                ("adjusted", "true".to_string()),
                ("sort", "asc".to_string()),
                ("limit", limit.to_string()),
                ("apiKey", key),
            ])
            .build()
            .map_err(|e| UpstreamError::Client(e.to_string()))
    }

    /// Build the news request. Takes a key from the pool.
    pub fn news_request(
        &mut self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Request, UpstreamError> {
        if start > end {
            return Err(UpstreamError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        let limit = if limit == 0 { DEFAULT_NEWS_LIMIT } else { limit };
        let url = format!("{}/v2/reference/news", self.base_url);
        let key = self.keys.next_key().to_string();
        tracing::debug!(symbol, %start, %end, key = %key_fingerprint(&key), "news request");

        self.http
            .get(url)
            .query(&[
                ("ticker", symbol.to_string()),
                ("order", "desc".to_string()),
                ("limit", limit.to_string()),
                ("sort", "published_utc".to_string()),
                ("apiKey", key),
                ("published_utc.gte", start.format(NEWS_TIME_FORMAT).to_string()),
                ("published_utc.lte", end.format(NEWS_TIME_FORMAT).to_string()),
            ])
            .build()
            .map_err(|e| UpstreamError::Client(e.to_string()))
    }

    /// Throttle, send, check status, decode.
    fn get_json<T>(&self, request: Request) -> Result<T, UpstreamError>
    where
        T: DeserializeOwned + ExpectedFields,
    {
        std::thread::sleep(self.throttle);

        let response = self.http.execute(request).map_err(classify_send_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Transport {
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(classify_send_error)?;
        let decoded: T =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Decode(e.to_string()))?;

        let missing = decoded.missing_fields();
        if !missing.is_empty() {
            tracing::warn!(?missing, "response has missing fields");
        }

        Ok(decoded)
    }
}

fn classify_send_error(e: reqwest::Error) -> UpstreamError {
    // Strip the URL: it carries the API key.
    let e = e.without_url();
    if e.is_timeout() {
        UpstreamError::Timeout(e.to_string())
    } else if e.is_decode() {
        UpstreamError::Decode(e.to_string())
    } else {
        UpstreamError::Network(e.to_string())
    }
}

impl MarketDataSource for PolygonClient {
    fn name(&self) -> &str {
        "polygon"
    }

    fn fetch_history(
        &mut self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        limit: u32,
    ) -> Result<HistoryResponse, UpstreamError> {
        let request = self.history_request(symbol, start, end, limit)?;
        let response: HistoryResponse = self.get_json(request)?;
        if !response.has_results() {
            return Err(UpstreamError::NoResults {
                symbol: symbol.to_string(),
            });
        }
        Ok(response)
    }

    fn fetch_news(
        &mut self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<NewsResponse, UpstreamError> {
        let request = self.news_request(symbol, start, end, limit)?;
        let response: NewsResponse = self.get_json(request)?;
        if !response.has_results() {
            return Err(UpstreamError::NoResults {
                symbol: symbol.to_string(),
            });
        }
        Ok(response)
    }
}
