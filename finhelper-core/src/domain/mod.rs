//! Domain records for the financial-helper store.

pub mod aggregate;
pub mod article;
pub mod ids;

pub use aggregate::{AggregateKey, DailyAggregate};
pub use article::{ArticleInsight, NewsArticle, Publisher, Sentiment};
pub use ids::DocumentId;
