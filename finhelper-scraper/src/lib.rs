//! FinHelper Scraper — windowed scraping on top of `finhelper-core`.
//!
//! This crate provides:
//! - Window planning (calendar-day and duration slicing)
//! - Window scheduler with retry-once and skip-on-failure
//! - Batch orchestration with running statistics
//! - Progress reporting
//! - Instruction files and application configuration
//! - Sentiment enrichment of stored articles

pub mod batch;
pub mod config;
pub mod enrichment;
pub mod instructions;
pub mod progress;
pub mod scheduler;
pub mod window;

pub use batch::{run_batch, BatchError, BatchRunStats};
pub use config::{AppConfig, ConfigError};
pub use enrichment::{
    enrich_pending, pending_articles, EnrichmentSummary, InsightError, InsightProvider,
};
pub use instructions::{InstructionsError, ScrapeInstructions};
pub use progress::{NoProgress, ScrapeProgress, StdoutProgress, WindowProgress, WindowReport};
pub use scheduler::{
    Aggregates, Collection, News, ScrapeError, ScrapeOptions, ScrapeOutcome, SymbolScraper,
    WindowScheduler,
};
pub use window::{plan_windows, ScrapeWindow, WindowPlan};
