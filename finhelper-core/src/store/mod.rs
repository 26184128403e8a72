//! Document store gateway.
//!
//! Two JSON document collections kept in SQLite:
//! - `ticker_aggregates`, natural key `(ticker, timestamp)`
//! - `ticker_news`, natural key `source_id` when present
//!
//! The gateway holds no state of its own. Every operation borrows a
//! connection owned by the caller.

pub mod aggregates;
pub mod articles;
pub mod connection;
pub mod migrations;

pub use aggregates::{aggregates_by_ticker_range, aggregates_over_range, insert_aggregates};
pub use articles::{
    append_insights, articles_by_ticker, articles_by_ticker_range, articles_over_range,
    insert_articles, paginate_articles, ArticleFilter, ArticlePage,
};
pub use connection::{open_in_memory, open_store, DEFAULT_BUSY_TIMEOUT};

use crate::domain::{DailyAggregate, NewsArticle};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{failed} writes failed ({inserted} succeeded): {first_error}")]
    PartialWrite {
        inserted: usize,
        failed: usize,
        first_error: String,
    },

    #[error("document not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Documents written before the failure. Zero unless the bulk write was partial.
    pub fn inserted(&self) -> usize {
        match self {
            Self::PartialWrite { inserted, .. } => *inserted,
            _ => 0,
        }
    }
}

/// Optional inclusive time bounds. A `None` bound is not applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// Which slice of a sorted result set to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultWindow {
    /// 1-based page of `page_size` documents.
    Page { page: u32, page_size: u32 },
    /// First `n` documents.
    Limit(u32),
    All,
}

impl ResultWindow {
    /// `page_size > 0` wins over `limit > 0`; neither means unbounded. Page is clamped to ≥ 1.
    pub fn from_params(limit: u32, page: u32, page_size: u32) -> Self {
        if page_size > 0 {
            Self::Page {
                page: page.max(1),
                page_size,
            }
        } else if limit > 0 {
            Self::Limit(limit)
        } else {
            Self::All
        }
    }

    /// `(limit, offset)` for SQL, `None` when unbounded.
    pub(crate) fn limit_offset(&self) -> Option<(i64, i64)> {
        match *self {
            Self::Page { page, page_size } => {
                let page = page.max(1) as i64;
                Some((page_size as i64, (page - 1) * page_size as i64))
            }
            Self::Limit(n) => Some((n as i64, 0)),
            Self::All => None,
        }
    }
}

/// Persistence seam used by the scraper.
pub trait RecordSink {
    /// Insert aggregates not already stored; returns how many were written.
    fn insert_aggregates(&self, aggregates: &[DailyAggregate]) -> Result<usize, StoreError>;

    /// Insert articles whose source ID is not already stored; returns how many were written.
    fn insert_articles(&self, articles: &[NewsArticle]) -> Result<usize, StoreError>;
}

/// SQLite-backed [`RecordSink`] over a borrowed connection.
#[derive(Clone, Copy)]
pub struct StoreGateway<'c> {
    conn: &'c Connection,
}

impl<'c> StoreGateway<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &'c Connection {
        self.conn
    }
}

impl RecordSink for StoreGateway<'_> {
    fn insert_aggregates(&self, aggregates: &[DailyAggregate]) -> Result<usize, StoreError> {
        aggregates::insert_aggregates(self.conn, aggregates)
    }

    fn insert_articles(&self, articles: &[NewsArticle]) -> Result<usize, StoreError> {
        articles::insert_articles(self.conn, articles)
    }
}
