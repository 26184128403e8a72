//! Batch orchestrator: run a scraper over many symbols, in order, one at a time.

use crate::progress::{eta, ScrapeProgress, SymbolStart};
use crate::scheduler::{ScrapeError, ScrapeOutcome, SymbolScraper};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Running totals across a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchRunStats {
    pub total_symbols: usize,
    /// Symbols whose scrape completed.
    pub symbols_processed: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failed_windows: usize,
    /// Time spent inside completed symbol scrapes.
    pub symbol_time: Duration,
    /// Wall time since the batch started.
    pub elapsed: Duration,
}

impl BatchRunStats {
    fn new(total_symbols: usize) -> Self {
        Self {
            total_symbols,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &ScrapeOutcome, took: Duration) {
        self.symbols_processed += 1;
        self.inserted += outcome.inserted;
        self.skipped += outcome.skipped();
        self.failed_windows += outcome.failed_windows;
        self.symbol_time += took;
    }

    pub fn percent(&self) -> f64 {
        if self.total_symbols == 0 {
            return 100.0;
        }
        self.symbols_processed as f64 / self.total_symbols as f64 * 100.0
    }

    pub fn avg_time_per_symbol(&self) -> Duration {
        match self.symbols_processed {
            0 => Duration::ZERO,
            n => self.symbol_time / n as u32,
        }
    }

    /// Average symbol time times symbols remaining.
    pub fn eta(&self) -> Duration {
        let remaining = self.total_symbols.saturating_sub(self.symbols_processed);
        self.avg_time_per_symbol() * remaining as u32
    }

    pub fn avg_inserted_per_symbol(&self) -> f64 {
        match self.symbols_processed {
            0 => 0.0,
            n => self.inserted as f64 / n as f64,
        }
    }

    pub fn avg_skipped_per_symbol(&self) -> f64 {
        match self.symbols_processed {
            0 => 0.0,
            n => self.skipped as f64 / n as f64,
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no symbols to scrape")]
    NoSymbols,

    #[error("error scraping {symbol}: {source}")]
    Aborted {
        symbol: String,
        /// Totals up to and excluding the failing symbol.
        stats: BatchRunStats,
        source: ScrapeError,
    },
}

/// Scrape every symbol over `[start, end]` in input order.
///
/// Window failures inside a symbol are absorbed by the scraper. A hard
/// [`ScrapeError`] aborts the batch at that symbol; symbols after it are
/// never attempted. The final results are reported either way.
pub fn run_batch<S>(
    scraper: &mut S,
    symbols: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    progress: &dyn ScrapeProgress,
) -> Result<BatchRunStats, BatchError>
where
    S: SymbolScraper + ?Sized,
{
    if symbols.is_empty() {
        return Err(BatchError::NoSymbols);
    }

    let started = Instant::now();
    let mut stats = BatchRunStats::new(symbols.len());

    for (index, symbol) in symbols.iter().enumerate() {
        let elapsed = started.elapsed();
        progress.on_symbol_start(&SymbolStart {
            symbol,
            index,
            total: symbols.len(),
            elapsed,
            eta: eta(elapsed, stats.symbols_processed, symbols.len()),
        });

        let symbol_started = Instant::now();
        let result = scraper.scrape_symbol(symbol, start, end);
        let took = symbol_started.elapsed();
        stats.elapsed = started.elapsed();

        match result {
            Ok(outcome) => {
                stats.record(&outcome, took);
                progress.on_symbol_done(&stats);
            }
            Err(source) => {
                tracing::error!(%symbol, error = %source, "batch aborted");
                progress.on_symbol_done(&stats);
                progress.on_batch_done(&stats, true);
                return Err(BatchError::Aborted {
                    symbol: symbol.clone(),
                    stats,
                    source,
                });
            }
        }
    }

    stats.elapsed = started.elapsed();
    progress.on_batch_done(&stats, false);
    tracing::info!(
        symbols = stats.symbols_processed,
        inserted = stats.inserted,
        skipped = stats.skipped,
        "batch finished"
    );
    Ok(stats)
}
