//! Window planning: split one symbol's overall range into consecutive sub-ranges.

use crate::scheduler::ScrapeError;
use chrono::{DateTime, TimeDelta, Utc};

/// How an overall range is cut into windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPlan {
    /// Whole calendar days, inclusive on both ends. The next window starts
    /// the day after the previous one ends. Widths below 1 are treated as 1.
    Days(u32),
    /// Raw duration. The next window starts exactly where the previous one ends.
    Span(TimeDelta),
}

/// One window of work for one symbol. Ordinals are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeWindow {
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub ordinal: usize,
    pub count: usize,
}

/// Every window for `symbol` over `[start, end]`, in time order.
///
/// `start == end` yields a single window. `start > end` is rejected, as is a
/// non-positive span.
pub fn plan_windows(
    symbol: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    plan: WindowPlan,
) -> Result<Vec<ScrapeWindow>, ScrapeError> {
    if start > end {
        return Err(ScrapeError::InvalidRange { start, end });
    }

    let mut bounds = Vec::new();
    match plan {
        WindowPlan::Days(days) => {
            // A window never needs to be wider than the whole range.
            let width_days = (i64::from(days.max(1)) - 1).min((end - start).num_days() + 1);
            let width = TimeDelta::days(width_days);
            let mut cursor = start;
            while cursor <= end {
                let window_end = clipped_add(cursor, width, end);
                bounds.push((cursor, window_end));
                match window_end.checked_add_signed(TimeDelta::days(1)) {
                    Some(next) => cursor = next,
                    None => break,
                }
            }
        }
        WindowPlan::Span(span) => {
            if span <= TimeDelta::zero() {
                return Err(ScrapeError::InvalidWindow);
            }
            let span = span.min(end - start);
            let mut cursor = start;
            loop {
                let window_end = clipped_add(cursor, span, end);
                bounds.push((cursor, window_end));
                if window_end >= end {
                    break;
                }
                cursor = window_end;
            }
        }
    }

    let count = bounds.len();
    Ok(bounds
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| ScrapeWindow {
            symbol: symbol.to_string(),
            start,
            end,
            ordinal: i + 1,
            count,
        })
        .collect())
}

fn clipped_add(at: DateTime<Utc>, by: TimeDelta, end: DateTime<Utc>) -> DateTime<Utc> {
    at.checked_add_signed(by).map_or(end, |t| t.min(end))
}
