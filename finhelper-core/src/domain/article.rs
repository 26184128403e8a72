//! NewsArticle — one news item associated with one or more tickers.

use super::ids::DocumentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub homepage_url: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub favicon_url: String,
}

/// Sentiment label attached to one ticker of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    #[serde(other)]
    Other,
}

impl Sentiment {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            "neutral" => Self::Neutral,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleInsight {
    pub ticker: String,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub sentiment_reasoning: String,
}

/// News article as stored in the `ticker_news` collection.
///
/// `source_id` is the provider's article ID and acts as the natural key when
/// non-empty. Articles without one cannot be deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub publisher: Publisher,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub article_url: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub insights: Vec<ArticleInsight>,
}

impl NewsArticle {
    pub fn natural_key(&self) -> Option<&str> {
        if self.source_id.is_empty() {
            None
        } else {
            Some(&self.source_id)
        }
    }
}
