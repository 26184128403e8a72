//! Window scheduler: one symbol, one range, one window at a time.
//!
//! Per window:
//! 1. fetch from the source, retrying once when the failure is transient
//! 2. convert, retrying once
//! 3. persist (never retried)
//!
//! A window that cannot get through is logged and skipped. Only an invalid
//! range or window width stops the run.

use crate::progress::{ScrapeProgress, WindowProgress, WindowReport};
use crate::window::{plan_windows, ScrapeWindow, WindowPlan};
use chrono::{DateTime, TimeDelta, Utc};
use finhelper_core::convert::{self, ConvertError};
use finhelper_core::domain::{DailyAggregate, NewsArticle};
use finhelper_core::store::{RecordSink, StoreError};
use finhelper_core::upstream::{HistoryResponse, MarketDataSource, NewsResponse, UpstreamError};
use std::marker::PhantomData;
use std::time::Instant;
use thiserror::Error;

pub const DEFAULT_WINDOW_DAYS: u32 = 7;
pub const DEFAULT_COLLECTION_LIMIT: u32 = 500;

const LOG_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Hard errors: the run for this symbol never started.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error("start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("collection window must be longer than zero")]
    InvalidWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// Window width in days.
    pub window_days: u32,
    /// Per-request result cap. Zero means the provider default.
    pub limit: u32,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            limit: DEFAULT_COLLECTION_LIMIT,
        }
    }
}

/// Counters for one symbol's run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeOutcome {
    pub windows: usize,
    pub failed_windows: usize,
    pub submitted: usize,
    pub inserted: usize,
    /// Submitted but not inserted, i.e. already stored.
    pub skipped_records: usize,
}

impl ScrapeOutcome {
    /// Duplicate records plus windows skipped entirely.
    pub fn skipped(&self) -> usize {
        self.skipped_records + self.failed_windows
    }

    fn record(&mut self, report: &WindowReport) {
        self.windows += 1;
        if report.failed {
            self.failed_windows += 1;
        } else {
            self.submitted += report.submitted;
            self.inserted += report.inserted;
            self.skipped_records += report.submitted.saturating_sub(report.inserted);
        }
    }
}

/// One kind of scrape: what to fetch, how to convert it, where it goes.
pub trait Collection {
    /// Used in log lines.
    const NAME: &'static str;
    type Response;
    type Record;

    fn plan(options: &ScrapeOptions) -> WindowPlan;

    fn fetch(
        source: &mut dyn MarketDataSource,
        window: &ScrapeWindow,
        limit: u32,
    ) -> Result<Self::Response, UpstreamError>;

    fn convert(response: &Self::Response) -> Result<Vec<Self::Record>, ConvertError>;

    fn persist(sink: &dyn RecordSink, records: &[Self::Record]) -> Result<usize, StoreError>;
}

/// Daily price history, sliced by whole calendar days.
pub struct Aggregates;

impl Collection for Aggregates {
    const NAME: &'static str = "aggregates";
    type Response = HistoryResponse;
    type Record = DailyAggregate;

    fn plan(options: &ScrapeOptions) -> WindowPlan {
        WindowPlan::Days(options.window_days)
    }

    fn fetch(
        source: &mut dyn MarketDataSource,
        window: &ScrapeWindow,
        limit: u32,
    ) -> Result<HistoryResponse, UpstreamError> {
        source.fetch_history(
            &window.symbol,
            window.start.date_naive(),
            window.end.date_naive(),
            limit,
        )
    }

    fn convert(response: &HistoryResponse) -> Result<Vec<DailyAggregate>, ConvertError> {
        convert::history_to_aggregates(response)
    }

    fn persist(sink: &dyn RecordSink, records: &[DailyAggregate]) -> Result<usize, StoreError> {
        sink.insert_aggregates(records)
    }
}

/// News articles, sliced by raw duration.
pub struct News;

impl Collection for News {
    const NAME: &'static str = "news";
    type Response = NewsResponse;
    type Record = NewsArticle;

    fn plan(options: &ScrapeOptions) -> WindowPlan {
        let span = TimeDelta::try_days(i64::from(options.window_days)).unwrap_or(TimeDelta::MAX);
        WindowPlan::Span(span)
    }

    fn fetch(
        source: &mut dyn MarketDataSource,
        window: &ScrapeWindow,
        limit: u32,
    ) -> Result<NewsResponse, UpstreamError> {
        source.fetch_news(&window.symbol, window.start, window.end, limit)
    }

    fn convert(response: &NewsResponse) -> Result<Vec<NewsArticle>, ConvertError> {
        convert::news_to_articles(response)
    }

    fn persist(sink: &dyn RecordSink, records: &[NewsArticle]) -> Result<usize, StoreError> {
        sink.insert_articles(records)
    }
}

/// Scrapes one symbol at a time for collection `C`.
pub struct WindowScheduler<'a, C: Collection> {
    source: &'a mut dyn MarketDataSource,
    sink: &'a dyn RecordSink,
    progress: &'a dyn ScrapeProgress,
    options: ScrapeOptions,
    _collection: PhantomData<C>,
}

impl<'a, C: Collection> WindowScheduler<'a, C> {
    pub fn new(
        source: &'a mut dyn MarketDataSource,
        sink: &'a dyn RecordSink,
        progress: &'a dyn ScrapeProgress,
        options: ScrapeOptions,
    ) -> Self {
        Self {
            source,
            sink,
            progress,
            options,
            _collection: PhantomData,
        }
    }

    pub fn options(&self) -> &ScrapeOptions {
        &self.options
    }

    /// Walk every window of `[start, end]` for `symbol`.
    pub fn scrape(
        &mut self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        let windows = plan_windows(symbol, start, end, C::plan(&self.options))?;

        let started = Instant::now();
        let mut outcome = ScrapeOutcome::default();
        for (done, window) in windows.iter().enumerate() {
            self.progress.on_window_start(&WindowProgress {
                window,
                done,
                elapsed: started.elapsed(),
            });

            let report = self.process_window(window);
            outcome.record(&report);

            self.progress.on_window_done(
                &WindowProgress {
                    window,
                    done: done + 1,
                    elapsed: started.elapsed(),
                },
                &report,
            );
        }

        tracing::info!(
            symbol,
            collection = C::NAME,
            windows = outcome.windows,
            failed_windows = outcome.failed_windows,
            inserted = outcome.inserted,
            skipped = outcome.skipped(),
            "symbol scrape finished"
        );
        Ok(outcome)
    }

    fn process_window(&mut self, window: &ScrapeWindow) -> WindowReport {
        let from = window.start.format(LOG_TIME_FORMAT);
        let to = window.end.format(LOG_TIME_FORMAT);

        let response = match self.fetch_with_retry(window) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    symbol = %window.symbol, %from, %to,
                    error = %e,
                    "error receiving {}, window skipped", C::NAME
                );
                return WindowReport::failed();
            }
        };

        let records = match C::convert(&response).or_else(|first| {
            tracing::warn!(
                symbol = %window.symbol,
                error = %first,
                "conversion failed, retrying once"
            );
            C::convert(&response)
        }) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(
                    symbol = %window.symbol, %from, %to,
                    error = %e,
                    "error converting {}, window skipped", C::NAME
                );
                return WindowReport::failed();
            }
        };

        let submitted = records.len();
        let inserted = match C::persist(self.sink, &records) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(
                    symbol = %window.symbol, %from, %to,
                    partial = e.inserted(),
                    error = %e,
                    "error inserting {}", C::NAME
                );
                return WindowReport::failed();
            }
        };
        if inserted != submitted {
            tracing::info!(
                symbol = %window.symbol, %from, %to,
                inserted,
                submitted,
                "some {} were already stored", C::NAME
            );
        }

        WindowReport {
            submitted,
            inserted,
            failed: false,
        }
    }

    fn fetch_with_retry(&mut self, window: &ScrapeWindow) -> Result<C::Response, UpstreamError> {
        match C::fetch(&mut *self.source, window, self.options.limit) {
            Ok(response) => Ok(response),
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    symbol = %window.symbol,
                    ordinal = window.ordinal,
                    error = %e,
                    "fetch failed, retrying once"
                );
                C::fetch(&mut *self.source, window, self.options.limit)
            }
            Err(e) => Err(e),
        }
    }
}

/// What the batch orchestrator drives, one symbol per call.
pub trait SymbolScraper {
    fn scrape_symbol(
        &mut self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ScrapeOutcome, ScrapeError>;
}

impl<C: Collection> SymbolScraper for WindowScheduler<'_, C> {
    fn scrape_symbol(
        &mut self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        self.scrape(symbol, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_counts_duplicates_and_failed_windows() {
        let mut outcome = ScrapeOutcome::default();
        outcome.record(&WindowReport { submitted: 5, inserted: 3, failed: false });
        outcome.record(&WindowReport::failed());
        outcome.record(&WindowReport { submitted: 2, inserted: 2, failed: false });

        assert_eq!(outcome.windows, 3);
        assert_eq!(outcome.failed_windows, 1);
        assert_eq!(outcome.submitted, 7);
        assert_eq!(outcome.inserted, 5);
        assert_eq!(outcome.skipped(), 3);
    }

    #[test]
    fn default_options_use_seven_days_and_five_hundred() {
        let options = ScrapeOptions::default();
        assert_eq!(options.window_days, 7);
        assert_eq!(options.limit, 500);
    }

    #[test]
    fn news_plan_is_a_duration_span() {
        let plan = News::plan(&ScrapeOptions { window_days: 3, limit: 0 });
        assert_eq!(plan, WindowPlan::Span(TimeDelta::days(3)));
        assert_eq!(Aggregates::plan(&ScrapeOptions::default()), WindowPlan::Days(7));
    }

    #[test]
    fn news_plan_saturates_huge_widths() {
        let plan = News::plan(&ScrapeOptions { window_days: u32::MAX, limit: 0 });
        assert_eq!(plan, WindowPlan::Span(TimeDelta::MAX));
    }
}
