//! SQLite-backed execution store.
//!
//! One row per intent nonce. The store is the crash-recovery source of
//! truth: the engine reloads all unsettled rows at startup and resumes
//! them, so every mutation here is written through immediately.
//!
//! Storage conventions:
//! - decimals are stored as TEXT to keep exact precision
//! - order ids are stored as a JSON array
//! - timestamps are Unix milliseconds

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use vault_core::{Execution, ExecutionStatus, Usd};

use crate::error::{Result, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS executions (
    nonce               INTEGER PRIMARY KEY,
    target_usd          TEXT    NOT NULL,
    filled_usd          TEXT    NOT NULL,
    status              TEXT    NOT NULL
        CHECK (status IN ('OPEN', 'PARTIAL', 'FILLED', 'SETTLED')),
    order_ids           TEXT    NOT NULL,
    trade_pnl_usd       TEXT    NOT NULL,
    funding_usd         TEXT    NOT NULL,
    fees_usd            TEXT    NOT NULL,
    net_pnl_usd         TEXT    NOT NULL,
    prev_state_snapshot TEXT,
    last_fill_check     INTEGER NOT NULL,
    settled             INTEGER NOT NULL DEFAULT 0,
    created_at          INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_executions_unsettled
    ON executions (settled, created_at);
"#;

/// Durable store of execution rows, keyed by intent nonce.
#[derive(Debug, Clone)]
pub struct ExecutionStore {
    pool: SqlitePool,
}

impl ExecutionStore {
    /// Open (creating if missing) the store at `path` and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.as_ref().display(), "Execution store opened");
        Ok(store)
    }

    /// In-memory store for tests. Single connection so all queries see
    /// the same database.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a new row. Returns false if a row for this nonce already
    /// exists; the existing row is left untouched, which is what makes
    /// intent ingestion idempotent across restarts.
    pub async fn insert(&self, exec: &Execution) -> Result<bool> {
        let order_ids = serde_json::to_string(&exec.order_ids)?;
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO executions (
                nonce, target_usd, filled_usd, status, order_ids,
                trade_pnl_usd, funding_usd, fees_usd, net_pnl_usd,
                prev_state_snapshot, last_fill_check, settled, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(exec.nonce as i64)
        .bind(exec.target_usd.to_string())
        .bind(exec.filled_usd.to_string())
        .bind(exec.status.as_str())
        .bind(order_ids)
        .bind(exec.trade_pnl_usd.to_string())
        .bind(exec.funding_usd.to_string())
        .bind(exec.fees_usd.to_string())
        .bind(exec.net_pnl_usd.to_string())
        .bind(exec.prev_state_snapshot.as_deref())
        .bind(exec.last_fill_check)
        .bind(exec.settled as i64)
        .bind(exec.created_at)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            debug!(nonce = exec.nonce, target = %exec.target_usd, "Execution row created");
        }
        Ok(inserted)
    }

    /// Fetch a row by nonce.
    pub async fn get(&self, nonce: u64) -> Result<Option<Execution>> {
        let row = sqlx::query("SELECT * FROM executions WHERE nonce = ?")
            .bind(nonce as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_row(&r)).transpose()
    }

    /// Write back the mutable fields of a row.
    ///
    /// `nonce`, `target_usd`, `prev_state_snapshot` and `created_at` are
    /// immutable after insert and never updated here.
    pub async fn update(&self, exec: &Execution) -> Result<()> {
        let order_ids = serde_json::to_string(&exec.order_ids)?;
        sqlx::query(
            r#"
            UPDATE executions SET
                filled_usd = ?,
                status = ?,
                order_ids = ?,
                trade_pnl_usd = ?,
                funding_usd = ?,
                fees_usd = ?,
                net_pnl_usd = ?,
                last_fill_check = ?,
                settled = ?
            WHERE nonce = ?
            "#,
        )
        .bind(exec.filled_usd.to_string())
        .bind(exec.status.as_str())
        .bind(order_ids)
        .bind(exec.trade_pnl_usd.to_string())
        .bind(exec.funding_usd.to_string())
        .bind(exec.fees_usd.to_string())
        .bind(exec.net_pnl_usd.to_string())
        .bind(exec.last_fill_check)
        .bind(exec.settled as i64)
        .bind(exec.nonce as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminally mark a row settled. Returns false if the row was
    /// already settled (or absent), so callers can detect a double
    /// settlement attempt.
    pub async fn mark_settled(&self, nonce: u64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE executions SET settled = 1, status = 'SETTLED' \
             WHERE nonce = ? AND settled = 0",
        )
        .bind(nonce as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether the row for `nonce` exists and is marked settled.
    pub async fn is_settled(&self, nonce: u64) -> Result<bool> {
        let row = sqlx::query("SELECT settled FROM executions WHERE nonce = ?")
            .bind(nonce as i64)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(r) => r.try_get::<i64, _>("settled")? != 0,
            None => false,
        })
    }

    /// Whether any row exists for `nonce`, settled or not.
    pub async fn exists(&self, nonce: u64) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM executions WHERE nonce = ?")
            .bind(nonce as i64)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// All unsettled rows, oldest first. This is the crash-recovery
    /// working set.
    pub async fn load_unsettled(&self) -> Result<Vec<Execution>> {
        let rows = sqlx::query(
            "SELECT * FROM executions WHERE settled = 0 ORDER BY created_at, nonce",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_row).collect()
    }

    /// Total row count, for diagnostics.
    pub async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM executions")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }
}

fn decode_usd(row: &SqliteRow, column: &'static str) -> Result<Usd> {
    let text: String = row.try_get(column)?;
    Usd::from_str(&text).map_err(|e| StoreError::decode(column, e))
}

fn decode_row(row: &SqliteRow) -> Result<Execution> {
    let status_text: String = row.try_get("status")?;
    let status = ExecutionStatus::from_str(&status_text)
        .map_err(|e| StoreError::decode("status", e))?;

    let order_ids_json: String = row.try_get("order_ids")?;
    let order_ids: Vec<u64> = serde_json::from_str(&order_ids_json)?;

    Ok(Execution {
        nonce: row.try_get::<i64, _>("nonce")? as u64,
        target_usd: decode_usd(row, "target_usd")?,
        filled_usd: decode_usd(row, "filled_usd")?,
        status,
        order_ids,
        trade_pnl_usd: decode_usd(row, "trade_pnl_usd")?,
        funding_usd: decode_usd(row, "funding_usd")?,
        fees_usd: decode_usd(row, "fees_usd")?,
        net_pnl_usd: decode_usd(row, "net_pnl_usd")?,
        prev_state_snapshot: row.try_get("prev_state_snapshot")?,
        last_fill_check: row.try_get("last_fill_check")?,
        settled: row.try_get::<i64, _>("settled")? != 0,
        created_at: row.try_get("created_at")?,
    })
}
