//! Scrape instruction files.
//!
//! ```json
//! {
//!   "tickers": ["AAPL", "MSFT"],
//!   "start_time": "2024-01-01",
//!   "end_time": "2024-03-31",
//!   "options": { "collection_window": 7, "collection_limit": 500 }
//! }
//! ```

use crate::scheduler::{ScrapeOptions, DEFAULT_COLLECTION_LIMIT, DEFAULT_WINDOW_DAYS};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum InstructionsError {
    #[error("failed to read instructions file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse instructions JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no tickers provided in instructions")]
    NoTickers,

    #[error("invalid {field} {value:?}: {source}")]
    InvalidDate {
        field: &'static str,
        value: String,
        source: chrono::ParseError,
    },
}

#[derive(Debug, Deserialize)]
struct RawInstructions {
    #[serde(default)]
    tickers: Vec<String>,
    #[serde(default)]
    start_time: String,
    #[serde(default)]
    end_time: String,
    #[serde(default)]
    options: Option<RawOptions>,
}

#[derive(Debug, Deserialize)]
struct RawOptions {
    collection_window: Option<i64>,
    collection_limit: Option<i64>,
}

/// A validated instruction file. `start > end` is left for the scheduler to reject.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeInstructions {
    pub tickers: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub options: ScrapeOptions,
}

impl ScrapeInstructions {
    pub fn from_file(path: &Path) -> Result<Self, InstructionsError> {
        let content = std::fs::read_to_string(path).map_err(|source| InstructionsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, InstructionsError> {
        let raw: RawInstructions = serde_json::from_str(content)?;

        let tickers: Vec<String> = raw
            .tickers
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tickers.is_empty() {
            return Err(InstructionsError::NoTickers);
        }

        let start = parse_date("start_time", &raw.start_time)?;
        let end = parse_date("end_time", &raw.end_time)?;

        let options = match raw.options {
            Some(o) => ScrapeOptions {
                window_days: o.collection_window.map_or(DEFAULT_WINDOW_DAYS, clamp_u32),
                limit: o.collection_limit.map_or(DEFAULT_COLLECTION_LIMIT, clamp_u32),
            },
            None => ScrapeOptions::default(),
        };

        Ok(Self {
            tickers,
            start,
            end,
            options,
        })
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<DateTime<Utc>, InstructionsError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|source| InstructionsError::InvalidDate {
            field,
            value: value.to_string(),
            source,
        })
}

// Negative values behave like zero.
fn clamp_u32(v: i64) -> u32 {
    u32::try_from(v.max(0)).unwrap_or(u32::MAX)
}
