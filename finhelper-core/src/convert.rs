//! Provider responses → stored records.
//!
//! Absent optional fields become defaults. A record whose timestamp cannot be
//! represented is a conversion error for the whole response.

use crate::domain::{ArticleInsight, DailyAggregate, DocumentId, NewsArticle, Publisher, Sentiment};
use crate::upstream::{HistoryResponse, NewsResponse};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("timestamp {millis}ms is out of range")]
    TimestampOutOfRange { millis: i64 },
}

/// Convert a history response into daily aggregates, one per result bar.
///
/// The ticker comes from the response envelope. A bar without a timestamp is
/// kept with the epoch timestamp; the store drops it because it has no usable
/// natural key.
pub fn history_to_aggregates(
    response: &HistoryResponse,
) -> Result<Vec<DailyAggregate>, ConvertError> {
    let Some(results) = response.results.as_ref() else {
        return Ok(Vec::new());
    };
    let ticker = response.ticker.clone().unwrap_or_default();

    results
        .iter()
        .map(|bar| {
            let millis = bar.timestamp.unwrap_or(0);
            let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or(ConvertError::TimestampOutOfRange { millis })?;
            Ok(DailyAggregate {
                id: DocumentId::generate(),
                ticker: ticker.clone(),
                volume: bar.volume.unwrap_or_default(),
                vwap: bar.vwap.unwrap_or_default(),
                open: bar.open.unwrap_or_default(),
                close: bar.close.unwrap_or_default(),
                high: bar.high.unwrap_or_default(),
                low: bar.low.unwrap_or_default(),
                timestamp,
                transactions: bar.transactions.unwrap_or_default(),
                otc: bar.otc.unwrap_or(false),
            })
        })
        .collect()
}

/// Convert a news response into articles.
pub fn news_to_articles(response: &NewsResponse) -> Result<Vec<NewsArticle>, ConvertError> {
    let Some(results) = response.results.as_ref() else {
        return Ok(Vec::new());
    };

    let articles = results
        .iter()
        .map(|item| {
            let publisher = item
                .publisher
                .as_ref()
                .map(|p| Publisher {
                    name: p.name.clone().unwrap_or_default(),
                    homepage_url: p.homepage_url.clone().unwrap_or_default(),
                    logo_url: p.logo_url.clone().unwrap_or_default(),
                    favicon_url: p.favicon_url.clone().unwrap_or_default(),
                })
                .unwrap_or_default();

            let insights = item
                .insights
                .iter()
                .flatten()
                .map(|ins| ArticleInsight {
                    ticker: ins.ticker.clone().unwrap_or_default(),
                    sentiment: Sentiment::parse(ins.sentiment.as_deref().unwrap_or_default()),
                    sentiment_reasoning: ins.sentiment_reasoning.clone().unwrap_or_default(),
                })
                .collect();

            NewsArticle {
                id: DocumentId::generate(),
                source_id: item.id.clone().unwrap_or_default(),
                publisher,
                title: item.title.clone().unwrap_or_default(),
                author: item.author.clone().unwrap_or_default(),
                published_at: item.published_utc.unwrap_or(DateTime::UNIX_EPOCH),
                article_url: item.article_url.clone().unwrap_or_default(),
                image_url: item.image_url.clone().unwrap_or_default(),
                description: item.description.clone().unwrap_or_default(),
                tickers: item.tickers.clone().unwrap_or_default(),
                keywords: item.keywords.clone().unwrap_or_default(),
                insights,
            }
        })
        .collect();

    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::responses::{HistoryBar, NewsInsight, NewsItem, NewsPublisher};

    fn history(bars: Vec<HistoryBar>) -> HistoryResponse {
        HistoryResponse {
            ticker: Some("AAPL".into()),
            count: Some(bars.len() as u64),
            results: Some(bars),
            ..Default::default()
        }
    }

    #[test]
    fn history_bars_take_envelope_ticker() {
        let resp = history(vec![HistoryBar {
            volume: Some(100.0),
            vwap: Some(10.1),
            open: Some(10.0),
            close: Some(10.2),
            high: Some(10.5),
            low: Some(9.9),
            timestamp: Some(1_704_153_600_000),
            transactions: Some(7),
            otc: None,
        }]);
        let aggs = history_to_aggregates(&resp).unwrap();
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].ticker, "AAPL");
        assert_eq!(aggs[0].timestamp.timestamp_millis(), 1_704_153_600_000);
        assert_eq!(aggs[0].transactions, 7);
        assert!(!aggs[0].otc);
    }

    #[test]
    fn missing_bar_fields_default_to_zero() {
        let aggs = history_to_aggregates(&history(vec![HistoryBar::default()])).unwrap();
        assert_eq!(aggs[0].volume, 0.0);
        assert_eq!(aggs[0].timestamp.timestamp_millis(), 0);
        assert!(!aggs[0].has_natural_key());
    }

    #[test]
    fn unrepresentable_timestamp_is_an_error() {
        let resp = history(vec![HistoryBar {
            timestamp: Some(i64::MAX),
            ..Default::default()
        }]);
        assert!(matches!(
            history_to_aggregates(&resp),
            Err(ConvertError::TimestampOutOfRange { .. })
        ));
    }

    #[test]
    fn absent_results_convert_to_nothing() {
        let resp = HistoryResponse::default();
        assert!(history_to_aggregates(&resp).unwrap().is_empty());
        assert!(news_to_articles(&NewsResponse::default()).unwrap().is_empty());
    }

    #[test]
    fn news_items_keep_tickers_and_insights() {
        let resp = NewsResponse {
            results: Some(vec![NewsItem {
                id: Some("abc".into()),
                publisher: Some(NewsPublisher {
                    name: Some("Wire".into()),
                    ..Default::default()
                }),
                title: Some("Title".into()),
                tickers: Some(vec!["AAPL".into(), "MSFT".into()]),
                insights: Some(vec![NewsInsight {
                    ticker: Some("AAPL".into()),
                    sentiment: Some("negative".into()),
                    sentiment_reasoning: Some("miss".into()),
                }]),
                ..Default::default()
            }]),
            count: Some(1),
            ..Default::default()
        };
        let articles = news_to_articles(&resp).unwrap();
        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.source_id, "abc");
        assert_eq!(a.publisher.name, "Wire");
        assert_eq!(a.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(a.insights[0].sentiment, Sentiment::Negative);
        assert_eq!(a.published_at, DateTime::UNIX_EPOCH);
    }
}
