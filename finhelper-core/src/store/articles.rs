//! `ticker_news` collection.
//!
//! Articles are keyed by the provider's `source_id`. Time filters on this
//! collection are half-open: `[start, end)`. Results come back newest first.

use super::{ResultWindow, StoreError, TimeRange};
use crate::domain::{ArticleInsight, DocumentId, NewsArticle};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

/// Applied when a query asks for neither a limit nor a page.
pub const DEFAULT_ARTICLE_LIMIT: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleFilter {
    /// No insights attached yet.
    MissingInsights,
    /// Mentions this ticker.
    Ticker(String),
    /// Published in `[start, end)`.
    PublishedBetween {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticlePage {
    pub articles: Vec<NewsArticle>,
    /// Matching articles across all pages.
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl ArticlePage {
    pub fn page_count(&self) -> u64 {
        let size = self.page_size.max(1) as u64;
        self.total.div_ceil(size)
    }
}

/// Insert articles whose `source_id` is not already stored.
///
/// An existing article is left exactly as it was, so the first title seen
/// for a source ID is the one retained. Articles without a source ID are
/// always inserted.
pub fn insert_articles(conn: &Connection, articles: &[NewsArticle]) -> Result<usize, StoreError> {
    if articles.is_empty() {
        return Ok(0);
    }

    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0usize;
    let mut failed = 0usize;
    let mut first_error: Option<String> = None;
    {
        let mut insert_doc = tx.prepare(
            "INSERT INTO ticker_news (id, source_id, published_at_ms, has_insights, document)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (source_id) WHERE source_id IS NOT NULL DO NOTHING",
        )?;
        let mut insert_ticker = tx.prepare(
            "INSERT OR IGNORE INTO ticker_news_tickers (article_id, ticker) VALUES (?1, ?2)",
        )?;

        for article in articles {
            let result = serde_json::to_string(article)
                .map_err(StoreError::from)
                .and_then(|doc| {
                    let changed = insert_doc.execute(params![
                        article.id.as_str(),
                        article.natural_key(),
                        article.published_at.timestamp_millis(),
                        !article.insights.is_empty(),
                        doc
                    ])?;
                    if changed == 1 {
                        for ticker in &article.tickers {
                            insert_ticker.execute(params![article.id.as_str(), ticker])?;
                        }
                    }
                    Ok(changed)
                });
            match result {
                Ok(1) => inserted += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        source_id = %article.source_id,
                        error = %e,
                        "article insert failed"
                    );
                    failed += 1;
                    first_error.get_or_insert_with(|| e.to_string());
                }
            }
        }
    }
    tx.commit()?;

    match first_error {
        Some(first_error) => Err(StoreError::PartialWrite {
            inserted,
            failed,
            first_error,
        }),
        None => Ok(inserted),
    }
}

/// Newest articles mentioning `ticker`. `limit == 0` means [`DEFAULT_ARTICLE_LIMIT`].
pub fn articles_by_ticker(
    conn: &Connection,
    ticker: &str,
    limit: u32,
) -> Result<Vec<NewsArticle>, StoreError> {
    let window = ResultWindow::from_params(limit, 0, 0);
    articles_by_ticker_range(conn, ticker, TimeRange::unbounded(), window)
}

/// Articles mentioning `ticker` published in `[start, end)`.
///
/// A missing start is the epoch and a missing end is now.
pub fn articles_by_ticker_range(
    conn: &Connection,
    ticker: &str,
    range: TimeRange,
    window: ResultWindow,
) -> Result<Vec<NewsArticle>, StoreError> {
    if ticker.is_empty() {
        return Ok(Vec::new());
    }
    let (start, end) = resolve_range(range);
    let filters = [
        ArticleFilter::Ticker(ticker.to_string()),
        ArticleFilter::PublishedBetween { start, end },
    ];
    select_articles(conn, &filters, default_limit(window))
}

/// Articles for every ticker published in `[start, end)`.
pub fn articles_over_range(
    conn: &Connection,
    range: TimeRange,
    window: ResultWindow,
) -> Result<Vec<NewsArticle>, StoreError> {
    let (start, end) = resolve_range(range);
    let filters = [ArticleFilter::PublishedBetween { start, end }];
    select_articles(conn, &filters, default_limit(window))
}

/// One page of articles matching every filter, plus the total match count.
///
/// `page < 1` becomes 1; `page_size` outside `1..=500` is replaced with the
/// default or capped.
pub fn paginate_articles(
    conn: &Connection,
    page: u32,
    page_size: u32,
    filters: &[ArticleFilter],
) -> Result<ArticlePage, StoreError> {
    let page = page.max(1);
    let page_size = match page_size {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    };

    let (clause, values) = where_clause(filters);
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM ticker_news{clause}"),
        params_from_iter(values),
        |row| row.get(0),
    )?;

    let articles = select_articles(conn, filters, ResultWindow::Page { page, page_size })?;
    Ok(ArticlePage {
        articles,
        total: total.max(0) as u64,
        page,
        page_size,
    })
}

/// Append insights to a stored article and return the updated document.
pub fn append_insights(
    conn: &Connection,
    id: &DocumentId,
    insights: &[ArticleInsight],
) -> Result<NewsArticle, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let doc: Option<String> = tx
        .query_row(
            "SELECT document FROM ticker_news WHERE id = ?1",
            [id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    let doc = doc.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

    let mut article: NewsArticle = serde_json::from_str(&doc)?;
    article.insights.extend_from_slice(insights);
    tx.execute(
        "UPDATE ticker_news SET document = ?1, has_insights = ?2 WHERE id = ?3",
        params![
            serde_json::to_string(&article)?,
            !article.insights.is_empty(),
            id.as_str()
        ],
    )?;
    tx.commit()?;
    Ok(article)
}

fn resolve_range(range: TimeRange) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        range.start.unwrap_or(DateTime::UNIX_EPOCH),
        range.end.unwrap_or_else(Utc::now),
    )
}

fn default_limit(window: ResultWindow) -> ResultWindow {
    match window {
        ResultWindow::All => ResultWindow::Limit(DEFAULT_ARTICLE_LIMIT),
        other => other,
    }
}

fn where_clause(filters: &[ArticleFilter]) -> (String, Vec<Value>) {
    let mut parts: Vec<&str> = Vec::new();
    let mut values = Vec::new();
    for filter in filters {
        match filter {
            ArticleFilter::MissingInsights => parts.push("has_insights = 0"),
            ArticleFilter::Ticker(ticker) => {
                parts.push("id IN (SELECT article_id FROM ticker_news_tickers WHERE ticker = ?)");
                values.push(Value::Text(ticker.clone()));
            }
            ArticleFilter::PublishedBetween { start, end } => {
                parts.push("published_at_ms >= ? AND published_at_ms < ?");
                values.push(Value::Integer(start.timestamp_millis()));
                values.push(Value::Integer(end.timestamp_millis()));
            }
        }
    }
    if parts.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", parts.join(" AND ")), values)
    }
}

fn select_articles(
    conn: &Connection,
    filters: &[ArticleFilter],
    window: ResultWindow,
) -> Result<Vec<NewsArticle>, StoreError> {
    let (clause, mut values) = where_clause(filters);
    let mut sql = format!(
        "SELECT id, document FROM ticker_news{clause} ORDER BY published_at_ms DESC, id ASC"
    );
    if let Some((limit, offset)) = window.limit_offset() {
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, doc) = row?;
        match serde_json::from_str::<NewsArticle>(&doc) {
            Ok(article) => out.push(article),
            Err(e) => tracing::warn!(%id, error = %e, "skipping malformed article document"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Publisher, Sentiment};
    use crate::store::open_in_memory;
    use chrono::{Duration, TimeZone};

    fn jan(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn article(
        source_id: &str,
        title: &str,
        published_at: DateTime<Utc>,
        tickers: &[&str],
    ) -> NewsArticle {
        NewsArticle {
            id: DocumentId::generate(),
            source_id: source_id.into(),
            publisher: Publisher {
                name: "Wire".into(),
                ..Publisher::default()
            },
            title: title.into(),
            author: "Staff".into(),
            published_at,
            article_url: format!("https://news.example/{source_id}"),
            image_url: String::new(),
            description: String::new(),
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            keywords: vec![],
            insights: vec![],
        }
    }

    fn insight(ticker: &str) -> ArticleInsight {
        ArticleInsight {
            ticker: ticker.into(),
            sentiment: Sentiment::Positive,
            sentiment_reasoning: "beat estimates".into(),
        }
    }

    #[test]
    fn first_title_for_a_source_id_is_retained() {
        let conn = open_in_memory().unwrap();
        assert_eq!(insert_articles(&conn, &[article("x1", "A", jan(2), &["AAPL"])]).unwrap(), 1);
        assert_eq!(insert_articles(&conn, &[article("x1", "B", jan(2), &["AAPL"])]).unwrap(), 0);

        let got = articles_by_ticker(&conn, "AAPL", 0).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, "A");
    }

    #[test]
    fn articles_without_source_id_are_never_deduplicated() {
        let conn = open_in_memory().unwrap();
        let batch = [article("", "A", jan(2), &["AAPL"]), article("", "A", jan(2), &["AAPL"])];
        assert_eq!(insert_articles(&conn, &batch).unwrap(), 2);
    }

    #[test]
    fn colliding_document_id_is_reported_not_dropped() {
        let conn = open_in_memory().unwrap();
        let first = article("", "A", jan(2), &["AAPL"]);
        let mut clash = article("", "B", jan(3), &["AAPL"]);
        clash.id = first.id.clone();

        let err = insert_articles(&conn, &[first, clash]).unwrap_err();
        assert!(matches!(err, StoreError::PartialWrite { inserted: 1, failed: 1, .. }));
        assert_eq!(articles_by_ticker(&conn, "AAPL", 0).unwrap().len(), 1);
    }

    #[test]
    fn ticker_range_is_half_open_and_newest_first() {
        let conn = open_in_memory().unwrap();
        let batch: Vec<_> = (1..=5)
            .map(|d| article(&format!("s{d}"), &format!("day {d}"), jan(d), &["AAPL"]))
            .collect();
        insert_articles(&conn, &batch).unwrap();

        let range = TimeRange::new(Some(jan(2)), Some(jan(4)));
        let got = articles_by_ticker_range(&conn, "AAPL", range, ResultWindow::All).unwrap();
        let titles: Vec<_> = got.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["day 3", "day 2"]);
    }

    #[test]
    fn ticker_filter_uses_membership() {
        let conn = open_in_memory().unwrap();
        insert_articles(
            &conn,
            &[
                article("a", "both", jan(1), &["AAPL", "MSFT"]),
                article("b", "msft only", jan(2), &["MSFT"]),
            ],
        )
        .unwrap();

        assert_eq!(articles_by_ticker(&conn, "AAPL", 0).unwrap().len(), 1);
        assert_eq!(articles_by_ticker(&conn, "MSFT", 0).unwrap().len(), 2);
        assert!(articles_by_ticker(&conn, "", 0).unwrap().is_empty());
    }

    #[test]
    fn unbounded_query_defaults_to_limit() {
        let conn = open_in_memory().unwrap();
        let start = jan(1);
        let batch: Vec<_> = (0..120)
            .map(|i| article(&format!("s{i}"), "t", start + Duration::minutes(i), &["SPY"]))
            .collect();
        insert_articles(&conn, &batch).unwrap();

        let got = articles_over_range(&conn, TimeRange::unbounded(), ResultWindow::All).unwrap();
        assert_eq!(got.len(), DEFAULT_ARTICLE_LIMIT as usize);
    }

    #[test]
    fn paginate_clamps_and_counts() {
        let conn = open_in_memory().unwrap();
        let batch: Vec<_> = (1..=7)
            .map(|d| article(&format!("s{d}"), "t", jan(d), &["AAPL"]))
            .collect();
        insert_articles(&conn, &batch).unwrap();

        let first = paginate_articles(&conn, 0, 3, &[]).unwrap();
        assert_eq!(first.page, 1);
        assert_eq!(first.total, 7);
        assert_eq!(first.articles.len(), 3);
        assert_eq!(first.page_count(), 3);

        let defaulted = paginate_articles(&conn, 1, 0, &[]).unwrap();
        assert_eq!(defaulted.page_size, DEFAULT_PAGE_SIZE);

        let capped = paginate_articles(&conn, 1, 10_000, &[]).unwrap();
        assert_eq!(capped.page_size, MAX_PAGE_SIZE);

        let last = paginate_articles(&conn, 3, 3, &[]).unwrap();
        assert_eq!(last.articles.len(), 1);
    }

    #[test]
    fn missing_insights_filter_tracks_appends() {
        let conn = open_in_memory().unwrap();
        let a = article("a", "t", jan(1), &["AAPL"]);
        let b = article("b", "t", jan(2), &["AAPL"]);
        insert_articles(&conn, &[a.clone(), b]).unwrap();

        let pending = paginate_articles(&conn, 1, 10, &[ArticleFilter::MissingInsights]).unwrap();
        assert_eq!(pending.total, 2);

        let updated = append_insights(&conn, &a.id, &[insight("AAPL")]).unwrap();
        assert_eq!(updated.insights.len(), 1);

        let pending = paginate_articles(&conn, 1, 10, &[ArticleFilter::MissingInsights]).unwrap();
        assert_eq!(pending.total, 1);
        assert_eq!(pending.articles[0].source_id, "b");
    }

    #[test]
    fn append_insights_accumulates() {
        let conn = open_in_memory().unwrap();
        let a = article("a", "t", jan(1), &["AAPL", "MSFT"]);
        insert_articles(&conn, &[a.clone()]).unwrap();

        append_insights(&conn, &a.id, &[insight("AAPL")]).unwrap();
        let updated = append_insights(&conn, &a.id, &[insight("MSFT")]).unwrap();
        let tickers: Vec<_> = updated.insights.iter().map(|i| i.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn append_insights_to_unknown_article_is_not_found() {
        let conn = open_in_memory().unwrap();
        let unknown = DocumentId::from_hex("deadbeef");
        let err = append_insights(&conn, &unknown, &[insight("AAPL")]).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn articles_with_insights_are_not_pending() {
        let conn = open_in_memory().unwrap();
        let mut a = article("a", "t", jan(1), &["AAPL"]);
        a.insights.push(insight("AAPL"));
        insert_articles(&conn, &[a]).unwrap();

        let pending = paginate_articles(&conn, 1, 10, &[ArticleFilter::MissingInsights]).unwrap();
        assert_eq!(pending.total, 0);
    }
}
