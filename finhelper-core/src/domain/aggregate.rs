//! DailyAggregate — one ticker's trading statistics for one calendar day.

use super::ids::DocumentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Daily price aggregate as stored in the `ticker_aggregates` collection.
///
/// Natural key is `(ticker, timestamp)`. Records are written once and never
/// mutated by the scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub ticker: String,
    pub volume: f64,
    pub vwap: f64,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub timestamp: DateTime<Utc>,
    pub transactions: u64,
    #[serde(default)]
    pub otc: bool,
}

/// `(ticker, timestamp in epoch milliseconds)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    pub ticker: String,
    pub timestamp_ms: i64,
}

impl DailyAggregate {
    pub fn key(&self) -> AggregateKey {
        AggregateKey {
            ticker: self.ticker.clone(),
            timestamp_ms: self.timestamp.timestamp_millis(),
        }
    }

    /// A record can only be deduplicated when both halves of its natural key are set.
    pub fn has_natural_key(&self) -> bool {
        !self.ticker.is_empty() && self.timestamp.timestamp_millis() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn agg(ticker: &str, ts_ms: i64) -> DailyAggregate {
        DailyAggregate {
            id: DocumentId::generate(),
            ticker: ticker.into(),
            volume: 1000.0,
            vwap: 10.0,
            open: 9.5,
            close: 10.5,
            high: 11.0,
            low: 9.0,
            timestamp: Utc.timestamp_millis_opt(ts_ms).unwrap(),
            transactions: 12,
            otc: false,
        }
    }

    #[test]
    fn key_ignores_document_id() {
        let a = agg("AAPL", 1_704_067_200_000);
        let b = agg("AAPL", 1_704_067_200_000);
        assert_ne!(a.id, b.id);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn empty_ticker_or_epoch_timestamp_has_no_natural_key() {
        assert!(agg("AAPL", 1_704_067_200_000).has_natural_key());
        assert!(!agg("", 1_704_067_200_000).has_natural_key());
        assert!(!agg("AAPL", 0).has_natural_key());
    }

    #[test]
    fn document_uses_underscore_id() {
        let json = serde_json::to_value(agg("MSFT", 1_704_067_200_000)).unwrap();
        assert!(json.get("_id").is_some());
        assert_eq!(json["ticker"], "MSFT");
    }
}
