//! FinHelper Core — domain documents, upstream market data client, document store.
//!
//! This crate holds everything the scraper needs below the scheduling layer:
//! - Domain documents (daily aggregates, news articles, insights, IDs)
//! - Polygon-style upstream client with key rotation and throttling
//! - Conversion from upstream envelopes into stored documents
//! - SQLite document store with natural-key deduplication

pub mod convert;
pub mod domain;
pub mod store;
pub mod upstream;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: documents and clients can cross a worker thread boundary.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::DailyAggregate>();
        require_sync::<domain::DailyAggregate>();
        require_send::<domain::NewsArticle>();
        require_sync::<domain::NewsArticle>();
        require_send::<domain::DocumentId>();
        require_sync::<domain::DocumentId>();

        require_send::<upstream::HistoryResponse>();
        require_sync::<upstream::HistoryResponse>();
        require_send::<upstream::NewsResponse>();
        require_sync::<upstream::NewsResponse>();
        require_send::<upstream::UpstreamError>();
        require_sync::<upstream::UpstreamError>();
        require_send::<upstream::PolygonClient>();

        require_send::<store::StoreError>();
        require_sync::<store::StoreError>();
    }

    /// Compile-time check: the scheduler drives sources and sinks through trait objects.
    #[allow(dead_code)]
    fn assert_object_safe(
        source: &mut dyn upstream::MarketDataSource,
        sink: &dyn store::RecordSink,
    ) -> Result<usize, store::StoreError> {
        let _ = source.name();
        sink.insert_aggregates(&[])
    }
}
