//! `ticker_aggregates` collection.

use super::{ResultWindow, StoreError, TimeRange};
use crate::domain::{AggregateKey, DailyAggregate};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{BTreeMap, HashSet};

/// Key pairs per existence query. Two bound parameters each.
const KEY_LOOKUP_CHUNK: usize = 400;

/// Insert every aggregate whose natural key is not already stored.
///
/// Records missing either half of the key are dropped. Within one call, the
/// last record for a key wins. Existing documents are never touched.
///
/// Writes happen in one transaction but a failing row does not stop the
/// rest; any failure turns the result into [`StoreError::PartialWrite`].
pub fn insert_aggregates(
    conn: &Connection,
    aggregates: &[DailyAggregate],
) -> Result<usize, StoreError> {
    let mut unique: BTreeMap<AggregateKey, &DailyAggregate> = BTreeMap::new();
    let mut dropped = 0usize;
    for agg in aggregates {
        if agg.has_natural_key() {
            unique.insert(agg.key(), agg);
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "aggregates without a natural key dropped");
    }
    if unique.is_empty() {
        return Ok(0);
    }

    let keys: Vec<&AggregateKey> = unique.keys().collect();
    let existing = existing_keys(conn, &keys)?;
    let fresh: Vec<&DailyAggregate> = unique
        .iter()
        .filter(|(key, _)| !existing.contains(*key))
        .map(|(_, agg)| *agg)
        .collect();
    if fresh.is_empty() {
        return Ok(0);
    }

    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0usize;
    let mut failed = 0usize;
    let mut first_error: Option<String> = None;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO ticker_aggregates (id, ticker, timestamp_ms, document)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for agg in fresh {
            let result = serde_json::to_string(agg)
                .map_err(StoreError::from)
                .and_then(|doc| {
                    stmt.execute(params![
                        agg.id.as_str(),
                        agg.ticker,
                        agg.timestamp.timestamp_millis(),
                        doc
                    ])
                    .map_err(StoreError::from)
                });
            match result {
                Ok(_) => inserted += 1,
                Err(e) => {
                    tracing::warn!(
                        ticker = %agg.ticker,
                        timestamp = %agg.timestamp,
                        error = %e,
                        "aggregate insert failed"
                    );
                    failed += 1;
                    first_error.get_or_insert_with(|| e.to_string());
                }
            }
        }
    }
    tx.commit()?;

    match first_error {
        Some(first_error) => Err(StoreError::PartialWrite {
            inserted,
            failed,
            first_error,
        }),
        None => Ok(inserted),
    }
}

fn existing_keys(
    conn: &Connection,
    keys: &[&AggregateKey],
) -> Result<HashSet<AggregateKey>, StoreError> {
    let mut found = HashSet::new();
    for chunk in keys.chunks(KEY_LOOKUP_CHUNK) {
        let clause = vec!["(ticker = ? AND timestamp_ms = ?)"; chunk.len()].join(" OR ");
        let sql = format!("SELECT ticker, timestamp_ms FROM ticker_aggregates WHERE {clause}");
        let values = chunk.iter().flat_map(|key| {
            [
                Value::Text(key.ticker.clone()),
                Value::Integer(key.timestamp_ms),
            ]
        });

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok(AggregateKey {
                ticker: row.get(0)?,
                timestamp_ms: row.get(1)?,
            })
        })?;
        for key in rows {
            found.insert(key?);
        }
    }
    Ok(found)
}

/// Aggregates for one ticker, ascending by timestamp. An empty ticker matches nothing.
pub fn aggregates_by_ticker_range(
    conn: &Connection,
    ticker: &str,
    range: TimeRange,
    window: ResultWindow,
) -> Result<Vec<DailyAggregate>, StoreError> {
    if ticker.is_empty() {
        return Ok(Vec::new());
    }
    query_aggregates(conn, Some(ticker), range, window)
}

/// Aggregates for all tickers, ascending by timestamp.
pub fn aggregates_over_range(
    conn: &Connection,
    range: TimeRange,
    window: ResultWindow,
) -> Result<Vec<DailyAggregate>, StoreError> {
    query_aggregates(conn, None, range, window)
}

fn query_aggregates(
    conn: &Connection,
    ticker: Option<&str>,
    range: TimeRange,
    window: ResultWindow,
) -> Result<Vec<DailyAggregate>, StoreError> {
    let mut sql = String::from("SELECT id, document FROM ticker_aggregates WHERE 1 = 1");
    let mut values: Vec<Value> = Vec::new();

    if let Some(ticker) = ticker {
        sql.push_str(" AND ticker = ?");
        values.push(Value::Text(ticker.to_string()));
    }
    if let Some(start) = range.start {
        sql.push_str(" AND timestamp_ms >= ?");
        values.push(Value::Integer(start.timestamp_millis()));
    }
    if let Some(end) = range.end {
        sql.push_str(" AND timestamp_ms <= ?");
        values.push(Value::Integer(end.timestamp_millis()));
    }
    sql.push_str(" ORDER BY timestamp_ms ASC, ticker ASC, id ASC");
    if let Some((limit, offset)) = window.limit_offset() {
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, doc) = row?;
        match serde_json::from_str::<DailyAggregate>(&doc) {
            Ok(agg) => out.push(agg),
            Err(e) => tracing::warn!(%id, error = %e, "skipping malformed aggregate document"),
        }
    }
    Ok(out)
}
