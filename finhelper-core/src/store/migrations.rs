//! Named, idempotent schema migrations.

use rusqlite::Connection;

const CREATE_TICKER_AGGREGATES: &str = "
    CREATE TABLE IF NOT EXISTS ticker_aggregates (
        id TEXT PRIMARY KEY,
        ticker TEXT NOT NULL,
        timestamp_ms INTEGER NOT NULL,
        document TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_ticker_aggregates_ticker_timestamp
        ON ticker_aggregates (ticker, timestamp_ms);
    CREATE INDEX IF NOT EXISTS idx_ticker_aggregates_timestamp
        ON ticker_aggregates (timestamp_ms);
";

const CREATE_TICKER_NEWS: &str = "
    CREATE TABLE IF NOT EXISTS ticker_news (
        id TEXT PRIMARY KEY,
        source_id TEXT,
        published_at_ms INTEGER NOT NULL,
        has_insights INTEGER NOT NULL DEFAULT 0,
        document TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_ticker_news_source_id
        ON ticker_news (source_id) WHERE source_id IS NOT NULL;
    CREATE INDEX IF NOT EXISTS idx_ticker_news_published
        ON ticker_news (published_at_ms);
    CREATE TABLE IF NOT EXISTS ticker_news_tickers (
        article_id TEXT NOT NULL REFERENCES ticker_news (id) ON DELETE CASCADE,
        ticker TEXT NOT NULL,
        PRIMARY KEY (article_id, ticker)
    );
    CREATE INDEX IF NOT EXISTS idx_ticker_news_tickers_ticker
        ON ticker_news_tickers (ticker);
";

/// Apply every migration not yet recorded in the `migrations` table.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_ticker_aggregates", CREATE_TICKER_AGGREGATES)?;
    run_migration(conn, "002_ticker_news", CREATE_TICKER_NEWS)?;
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> rusqlite::Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("running migration: {name}");
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?1)", [name])?;
    }
    Ok(())
}
