//! SQLite storage adapter.
//!
//! Three tables: reference rows for commodities and sources (created on first
//! sighting, never deleted), and `price_data` keyed by the natural key
//! `(timestamp, commodity_id, source_id)`. Upserts run as multi-row inserts
//! inside a single transaction, so a batch commits entirely or not at all.
//!
//! Timestamps are stored as UTC unix seconds.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use enerflux_core::domain::{Commodity, PriceRecord, SourceInfo};

use crate::config::StorageConfig;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt stored timestamp: {0}")]
    Timestamp(i64),
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS commodities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    unit TEXT
);

CREATE TABLE IF NOT EXISTS data_sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    base_url TEXT,
    api_version TEXT
);

CREATE TABLE IF NOT EXISTS price_data (
    timestamp INTEGER NOT NULL,
    commodity_id INTEGER NOT NULL REFERENCES commodities(id),
    source_id INTEGER NOT NULL REFERENCES data_sources(id),
    price REAL NOT NULL,
    volume INTEGER,
    open REAL,
    high REAL,
    low REAL,
    close REAL,
    UNIQUE(timestamp, commodity_id, source_id)
);

CREATE INDEX IF NOT EXISTS idx_price_data_timestamp
    ON price_data(timestamp);

CREATE INDEX IF NOT EXISTS idx_price_data_series
    ON price_data(commodity_id, source_id, timestamp);
"#;

/// Columns bound per price row in the multi-row insert.
const PARAMS_PER_ROW: usize = 9;

/// Hard cap on rows per statement, below SQLite's host-parameter limit.
const MAX_ROWS_PER_STMT: usize = 80;

/// Aggregate price statistics for one commodity across all sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceStatistics {
    pub record_count: u64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub total_volume: u64,
}

/// SQLite-backed price store. The connection is serialized behind a mutex;
/// upsert calls are short and never span a fetch.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    config: StorageConfig,
}

impl SqliteStore {
    /// Open (and migrate) a file-backed store with WAL journaling.
    pub fn open(path: impl AsRef<Path>, config: StorageConfig) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        // journal_mode reports the resulting mode as a row, so query it.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::from_connection(conn, config)
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory(config: StorageConfig) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, config)
    }

    fn from_connection(conn: Connection, config: StorageConfig) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    /// Idempotent commodity upsert; returns the surrogate id.
    pub fn ensure_commodity(&self, commodity: &Commodity) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        ensure_commodity_on(&conn, commodity)
    }

    /// Idempotent source upsert; returns the surrogate id.
    pub fn ensure_source(&self, source: &SourceInfo) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        ensure_source_on(&conn, source)
    }

    /// Bulk insert a batch; on natural-key conflict every value column is
    /// overwritten (or the row is skipped when upsert mode is off). Returns
    /// the number of rows affected. Atomic: the whole batch commits or none
    /// of it does.
    pub fn upsert_batch(&self, batch: &[PriceRecord]) -> Result<usize, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // Resolve reference ids once per distinct symbol/source.
        let mut commodity_ids: HashMap<&str, i64> = HashMap::new();
        let mut source_ids: HashMap<&str, i64> = HashMap::new();
        for record in batch {
            if !commodity_ids.contains_key(record.commodity.as_str()) {
                let id = ensure_commodity_on(&tx, &Commodity::from_symbol(&record.commodity))?;
                commodity_ids.insert(record.commodity.as_str(), id);
            }
            if !source_ids.contains_key(record.source.as_str()) {
                let id = ensure_source_on(&tx, &SourceInfo::named(&record.source))?;
                source_ids.insert(record.source.as_str(), id);
            }
        }

        let chunk_rows = self.config.batch_size.clamp(1, MAX_ROWS_PER_STMT);
        let mut affected = 0usize;

        for chunk in batch.chunks(chunk_rows) {
            let sql = upsert_sql(chunk.len(), self.config.upsert);
            let mut stmt = tx.prepare_cached(&sql)?;

            let mut values: Vec<Value> = Vec::with_capacity(chunk.len() * PARAMS_PER_ROW);
            for record in chunk {
                values.push(Value::Integer(record.timestamp.timestamp()));
                values.push(Value::Integer(commodity_ids[record.commodity.as_str()]));
                values.push(Value::Integer(source_ids[record.source.as_str()]));
                values.push(Value::Real(record.price));
                values.push(opt_int(record.volume.map(|v| v as i64)));
                values.push(opt_real(record.open));
                values.push(opt_real(record.high));
                values.push(opt_real(record.low));
                values.push(opt_real(record.close));
            }

            affected += stmt.execute(params_from_iter(values))?;
        }

        tx.commit()?;
        tracing::info!(rows = batch.len(), affected, "batch upsert committed");
        Ok(affected)
    }

    /// Latest stored timestamp across all commodities and sources.
    pub fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let max: Option<i64> =
            conn.query_row("SELECT MAX(timestamp) FROM price_data", [], |row| row.get(0))?;
        max.map(from_unix).transpose()
    }

    /// Latest timestamp and price for one commodity/source pair.
    pub fn latest_for(
        &self,
        commodity: &str,
        source: &str,
    ) -> Result<Option<(DateTime<Utc>, f64)>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT p.timestamp, p.price
                 FROM price_data p
                 JOIN commodities c ON c.id = p.commodity_id
                 JOIN data_sources s ON s.id = p.source_id
                 WHERE c.symbol = ?1 AND s.name = ?2
                 ORDER BY p.timestamp DESC
                 LIMIT 1",
                params![commodity, source],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
            )
            .optional()?;

        row.map(|(ts, price)| Ok((from_unix(ts)?, price))).transpose()
    }

    /// Records for one commodity/source pair, ascending by timestamp.
    pub fn get_range(
        &self,
        commodity: &str,
        source: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<PriceRecord>, StoreError> {
        let mut sql = String::from(
            "SELECT p.timestamp, c.symbol, s.name, p.price, p.volume, p.open, p.high, p.low, p.close
             FROM price_data p
             JOIN commodities c ON c.id = p.commodity_id
             JOIN data_sources s ON s.id = p.source_id
             WHERE c.symbol = ?1 AND s.name = ?2",
        );
        let mut params_vec: Vec<Value> = vec![
            Value::Text(commodity.to_string()),
            Value::Text(source.to_string()),
        ];

        if let Some(start) = start {
            params_vec.push(Value::Integer(start.timestamp()));
            sql.push_str(&format!(" AND p.timestamp >= ?{}", params_vec.len()));
        }
        if let Some(end) = end {
            params_vec.push(Value::Integer(end.timestamp()));
            sql.push_str(&format!(" AND p.timestamp <= ?{}", params_vec.len()));
        }
        sql.push_str(" ORDER BY p.timestamp ASC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params_vec), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<i64>>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, Option<f64>>(6)?,
                row.get::<_, Option<f64>>(7)?,
                row.get::<_, Option<f64>>(8)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (ts, symbol, name, price, volume, open, high, low, close) = row?;
            records.push(PriceRecord {
                timestamp: from_unix(ts)?,
                commodity: symbol,
                source: name,
                price,
                volume: volume.map(|v| v as u64),
                open,
                high,
                low,
                close,
            });
        }
        Ok(records)
    }

    /// Aggregate statistics for one commodity across all sources.
    pub fn statistics(
        &self,
        commodity: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<PriceStatistics, StoreError> {
        let mut sql = String::from(
            "SELECT COUNT(p.timestamp), AVG(p.price), MIN(p.price), MAX(p.price), SUM(p.volume)
             FROM price_data p
             JOIN commodities c ON c.id = p.commodity_id
             WHERE c.symbol = ?1",
        );
        let mut params_vec: Vec<Value> = vec![Value::Text(commodity.to_string())];

        if let Some(start) = start {
            params_vec.push(Value::Integer(start.timestamp()));
            sql.push_str(&format!(" AND p.timestamp >= ?{}", params_vec.len()));
        }
        if let Some(end) = end {
            params_vec.push(Value::Integer(end.timestamp()));
            sql.push_str(&format!(" AND p.timestamp <= ?{}", params_vec.len()));
        }

        let conn = self.conn.lock().unwrap();
        let stats = conn.query_row(&sql, params_from_iter(params_vec), |row| {
            Ok(PriceStatistics {
                record_count: row.get::<_, i64>(0)? as u64,
                avg_price: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                min_price: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                max_price: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                total_volume: row.get::<_, Option<i64>>(4)?.unwrap_or(0) as u64,
            })
        })?;
        Ok(stats)
    }
}

fn ensure_commodity_on(conn: &Connection, commodity: &Commodity) -> Result<i64, StoreError> {
    let inserted = conn.execute(
        "INSERT INTO commodities (symbol, name, description, unit)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(symbol) DO NOTHING",
        params![
            commodity.symbol,
            commodity.name,
            commodity.description,
            commodity.unit
        ],
    )?;
    if inserted > 0 {
        tracing::info!(symbol = %commodity.symbol, "created commodity");
    }

    let id = conn.query_row(
        "SELECT id FROM commodities WHERE symbol = ?1",
        params![commodity.symbol],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn ensure_source_on(conn: &Connection, source: &SourceInfo) -> Result<i64, StoreError> {
    let inserted = conn.execute(
        "INSERT INTO data_sources (name, description, base_url, api_version)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name) DO NOTHING",
        params![
            source.name,
            source.description,
            source.base_url,
            source.api_version
        ],
    )?;
    if inserted > 0 {
        tracing::info!(name = %source.name, "created data source");
    }

    let id = conn.query_row(
        "SELECT id FROM data_sources WHERE name = ?1",
        params![source.name],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn upsert_sql(rows: usize, upsert: bool) -> String {
    let placeholders = vec!["(?, ?, ?, ?, ?, ?, ?, ?, ?)"; rows].join(", ");
    let mut sql = format!(
        "INSERT INTO price_data
         (timestamp, commodity_id, source_id, price, volume, open, high, low, close)
         VALUES {placeholders}"
    );
    if upsert {
        sql.push_str(
            " ON CONFLICT(timestamp, commodity_id, source_id) DO UPDATE SET
             price = excluded.price,
             volume = excluded.volume,
             open = excluded.open,
             high = excluded.high,
             low = excluded.low,
             close = excluded.close",
        );
    } else {
        sql.push_str(" ON CONFLICT(timestamp, commodity_id, source_id) DO NOTHING");
    }
    sql
}

fn opt_real(v: Option<f64>) -> Value {
    v.map(Value::Real).unwrap_or(Value::Null)
}

fn opt_int(v: Option<i64>) -> Value {
    v.map(Value::Integer).unwrap_or(Value::Null)
}

fn from_unix(ts: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(ts, 0).ok_or(StoreError::Timestamp(ts))
}
