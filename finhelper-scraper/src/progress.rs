//! Progress reporting for scrape runs.
//!
//! Progress output is for people watching the run and goes to stdout.
//! Diagnostics go through `tracing`.

use crate::batch::BatchRunStats;
use crate::window::ScrapeWindow;
use std::time::Duration;

/// Where one symbol's windows stand.
#[derive(Debug, Clone, Copy)]
pub struct WindowProgress<'a> {
    pub window: &'a ScrapeWindow,
    /// Windows finished so far, including this one once it is done.
    pub done: usize,
    pub elapsed: Duration,
}

impl WindowProgress<'_> {
    pub fn percent(&self) -> f64 {
        if self.window.count == 0 {
            return 100.0;
        }
        self.done as f64 / self.window.count as f64 * 100.0
    }

    /// Unknown until at least one window has finished.
    pub fn eta(&self) -> Option<Duration> {
        eta(self.elapsed, self.done, self.window.count)
    }
}

/// What happened to one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowReport {
    pub submitted: usize,
    pub inserted: usize,
    /// Fetch, conversion or persistence gave up on this window.
    pub failed: bool,
}

impl WindowReport {
    pub fn failed() -> Self {
        Self {
            failed: true,
            ..Self::default()
        }
    }
}

/// A symbol about to be scraped.
#[derive(Debug, Clone, Copy)]
pub struct SymbolStart<'a> {
    pub symbol: &'a str,
    /// 0-based position in the batch.
    pub index: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
}

/// Callbacks for scrape runs.
pub trait ScrapeProgress: Send {
    /// Called before a window's fetch goes out.
    fn on_window_start(&self, progress: &WindowProgress<'_>);

    /// Called after every window, successful or not.
    fn on_window_done(&self, progress: &WindowProgress<'_>, report: &WindowReport);

    fn on_symbol_start(&self, start: &SymbolStart<'_>);

    /// Called after each symbol with the running batch totals.
    fn on_symbol_done(&self, stats: &BatchRunStats);

    /// Called once at the end of a batch, including when it aborts.
    fn on_batch_done(&self, stats: &BatchRunStats, aborted: bool);
}

/// `elapsed / done * remaining`, or `None` before anything is done.
pub fn eta(elapsed: Duration, done: usize, total: usize) -> Option<Duration> {
    if done == 0 {
        return None;
    }
    let per_unit = elapsed / done as u32;
    Some(per_unit * total.saturating_sub(done) as u32)
}

/// `1h02m03s`, `4m05s`, `7s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(d) if !d.is_zero() => format_duration(d),
        _ => "??".to_string(),
    }
}

/// Plain-text reporter that prints to stdout.
pub struct StdoutProgress;

impl ScrapeProgress for StdoutProgress {
    fn on_window_start(&self, p: &WindowProgress<'_>) {
        println!(
            "  {} [{}/{}] {} .. {} elapsed:{} eta:{}",
            p.window.symbol,
            p.window.ordinal,
            p.window.count,
            p.window.start.format("%Y-%m-%dT%H:%M:%SZ"),
            p.window.end.format("%Y-%m-%dT%H:%M:%SZ"),
            format_duration(p.elapsed),
            format_eta(p.eta()),
        );
    }

    fn on_window_done(&self, p: &WindowProgress<'_>, report: &WindowReport) {
        if report.failed {
            println!(
                "  {} window {}/{} skipped ({:.1}%)",
                p.window.symbol,
                p.window.ordinal,
                p.window.count,
                p.percent()
            );
        } else {
            println!(
                "  {} window {}/{} inserted {}/{} ({:.1}%)",
                p.window.symbol,
                p.window.ordinal,
                p.window.count,
                report.inserted,
                report.submitted,
                p.percent()
            );
        }
    }

    fn on_symbol_start(&self, s: &SymbolStart<'_>) {
        println!(
            "Starting ({}/{}): {} elapsed:{} eta:{}",
            s.index + 1,
            s.total,
            s.symbol,
            format_duration(s.elapsed),
            format_eta(s.eta)
        );
    }

    fn on_symbol_done(&self, stats: &BatchRunStats) {
        println!(
            "\nPROGRESS: {:.1}%\neta={}\navg_time_per_symbol={}\ninserted={}\nskipped={}\nsymbols={}\navg_inserted_per_symbol={:.2}\navg_skipped_per_symbol={:.2}",
            stats.percent(),
            format_duration(stats.eta()),
            format_duration(stats.avg_time_per_symbol()),
            stats.inserted,
            stats.skipped,
            stats.symbols_processed,
            stats.avg_inserted_per_symbol(),
            stats.avg_skipped_per_symbol(),
        );
    }

    fn on_batch_done(&self, stats: &BatchRunStats, aborted: bool) {
        let header = if aborted { "RESULTS (aborted):" } else { "=== RESULTS: ===" };
        println!(
            "\n{header}\ntotal_time={}\naverage_time_per_symbol={}\nsymbols_processed={}\ninserted={}\nskipped={}\navg_inserted_per_symbol={:.2}\navg_skipped_per_symbol={:.2}\n",
            format_duration(stats.elapsed),
            format_duration(stats.avg_time_per_symbol()),
            stats.symbols_processed,
            stats.inserted,
            stats.skipped,
            stats.avg_inserted_per_symbol(),
            stats.avg_skipped_per_symbol(),
        );
    }
}

/// Reporter that discards everything.
pub struct NoProgress;

impl ScrapeProgress for NoProgress {
    fn on_window_start(&self, _progress: &WindowProgress<'_>) {}
    fn on_window_done(&self, _progress: &WindowProgress<'_>, _report: &WindowReport) {}
    fn on_symbol_start(&self, _start: &SymbolStart<'_>) {}
    fn on_symbol_done(&self, _stats: &BatchRunStats) {}
    fn on_batch_done(&self, _stats: &BatchRunStats, _aborted: bool) {}
}
