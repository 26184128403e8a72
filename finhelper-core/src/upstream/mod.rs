//! Upstream market-data and news provider access.

pub mod keys;
pub mod polygon;
pub mod provider;
pub mod responses;

pub use keys::{key_fingerprint, KeyPool};
pub use polygon::{PolygonClient, PolygonSettings, DEFAULT_HISTORY_LIMIT, DEFAULT_NEWS_LIMIT};
pub use provider::{MarketDataSource, UpstreamError};
pub use responses::{ExpectedFields, HistoryBar, HistoryResponse, NewsItem, NewsResponse};
