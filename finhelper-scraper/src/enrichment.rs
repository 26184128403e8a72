//! Sentiment enrichment: attach insights to articles that have none.

use finhelper_core::domain::{ArticleInsight, NewsArticle};
use finhelper_core::store::{
    append_insights, paginate_articles, ArticleFilter, ArticlePage, StoreError,
};
use rusqlite::Connection;
use thiserror::Error;

/// Produces insights for one article.
pub trait InsightProvider {
    fn insights_for(&mut self, article: &NewsArticle) -> Result<Vec<ArticleInsight>, InsightError>;
}

#[derive(Debug, Error)]
#[error("insight provider failed: {0}")]
pub struct InsightError(pub String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub pending: usize,
    pub enriched: usize,
    /// Provider errors or empty answers. These articles stay pending.
    pub failed: usize,
}

/// One page of articles still missing insights.
pub fn pending_articles(
    conn: &Connection,
    page: u32,
    page_size: u32,
) -> Result<ArticlePage, StoreError> {
    paginate_articles(conn, page, page_size, &[ArticleFilter::MissingInsights])
}

/// Ask `provider` about every pending article and store its answers.
///
/// The pending set is read in full before anything is written, so articles
/// leaving the filter cannot shift later pages.
pub fn enrich_pending<P>(
    conn: &Connection,
    provider: &mut P,
    page_size: u32,
) -> Result<EnrichmentSummary, StoreError>
where
    P: InsightProvider + ?Sized,
{
    let mut pending = Vec::new();
    let mut page = 1;
    loop {
        let batch = pending_articles(conn, page, page_size)?;
        let exhausted = batch.articles.is_empty() || u64::from(page) >= batch.page_count();
        pending.extend(batch.articles);
        if exhausted {
            break;
        }
        page += 1;
    }

    let mut summary = EnrichmentSummary {
        pending: pending.len(),
        ..EnrichmentSummary::default()
    };
    for article in &pending {
        match provider.insights_for(article) {
            Ok(insights) if insights.is_empty() => {
                tracing::warn!(id = %article.id, "provider returned no insights");
                summary.failed += 1;
            }
            Ok(insights) => {
                append_insights(conn, &article.id, &insights)?;
                summary.enriched += 1;
            }
            Err(e) => {
                tracing::warn!(id = %article.id, error = %e, "skipping article");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        pending = summary.pending,
        enriched = summary.enriched,
        failed = summary.failed,
        "enrichment finished"
    );
    Ok(summary)
}
