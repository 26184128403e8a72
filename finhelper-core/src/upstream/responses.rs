//! Typed provider responses.
//!
//! Every field is optional: the provider omits fields freely (`otc` is only
//! present when true). Required-field checks are explicit per response type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level fields a well-formed response is expected to carry.
pub trait ExpectedFields {
    /// Names of expected fields that are absent. Empty when the response is complete.
    fn missing_fields(&self) -> Vec<&'static str>;
}

/// `/v2/aggs/ticker/{symbol}/range/1/day/{from}/{to}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default, rename = "queryCount")]
    pub query_count: Option<u64>,
    #[serde(default, rename = "resultsCount")]
    pub results_count: Option<u64>,
    #[serde(default)]
    pub adjusted: Option<bool>,
    #[serde(default)]
    pub results: Option<Vec<HistoryBar>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryBar {
    #[serde(default, rename = "v")]
    pub volume: Option<f64>,
    #[serde(default, rename = "vw")]
    pub vwap: Option<f64>,
    #[serde(default, rename = "o")]
    pub open: Option<f64>,
    #[serde(default, rename = "c")]
    pub close: Option<f64>,
    #[serde(default, rename = "h")]
    pub high: Option<f64>,
    #[serde(default, rename = "l")]
    pub low: Option<f64>,
    /// Epoch milliseconds of the start of the bar.
    #[serde(default, rename = "t")]
    pub timestamp: Option<i64>,
    #[serde(default, rename = "n")]
    pub transactions: Option<u64>,
    #[serde(default)]
    pub otc: Option<bool>,
}

impl HistoryResponse {
    pub fn has_results(&self) -> bool {
        let non_empty = self.results.as_ref().is_some_and(|r| !r.is_empty());
        non_empty && self.count != Some(0)
    }
}

impl ExpectedFields for HistoryResponse {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.ticker.is_none() {
            missing.push("ticker");
        }
        if self.query_count.is_none() {
            missing.push("queryCount");
        }
        if self.results_count.is_none() {
            missing.push("resultsCount");
        }
        if self.adjusted.is_none() {
            missing.push("adjusted");
        }
        if self.results.is_none() {
            missing.push("results");
        }
        if self.status.is_none() {
            missing.push("status");
        }
        if self.request_id.is_none() {
            missing.push("request_id");
        }
        missing
    }
}

/// `/v2/reference/news`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsResponse {
    #[serde(default)]
    pub results: Option<Vec<NewsItem>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub publisher: Option<NewsPublisher>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub article_url: Option<String>,
    #[serde(default)]
    pub tickers: Option<Vec<String>>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub insights: Option<Vec<NewsInsight>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsPublisher {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsInsight {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub sentiment_reasoning: Option<String>,
}

impl NewsResponse {
    pub fn has_results(&self) -> bool {
        let non_empty = self.results.as_ref().is_some_and(|r| !r.is_empty());
        non_empty && self.count != Some(0)
    }
}

impl ExpectedFields for NewsResponse {
    // next_url is absent on the last page, so it is not expected.
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.results.is_none() {
            missing.push("results");
        }
        if self.status.is_none() {
            missing.push("status");
        }
        if self.request_id.is_none() {
            missing.push("request_id");
        }
        if self.count.is_none() {
            missing.push("count");
        }
        missing
    }
}
