use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, SqlitePool,
};
use tracing::warn;

use crate::analytics::{filter, DayWindow, TransactionSource};
use crate::error::PipelineError;
use crate::models::{TransactionRecord, ZERO_ADDRESS};

pub type DbPool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    ensure_dir_exists(database_url)?;

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid DATABASE_URL {}", database_url))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("failed to connect to SQLite")?;

    apply_schema(&pool).await?;
    Ok(pool)
}

fn ensure_dir_exists(database_url: &str) -> Result<()> {
    if let Some(path) = database_url.strip_prefix("sqlite://") {
        if path != ":memory:" {
            if let Some(dir) = Path::new(path).parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed creating db directory {:?}", dir))?;
            }
        }
    }
    Ok(())
}

async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            txid TEXT PRIMARY KEY,
            block_height INTEGER NOT NULL,
            block_hash TEXT NOT NULL,
            block_time INTEGER NOT NULL,
            from_addr TEXT NOT NULL,
            to_addr TEXT,
            value TEXT NOT NULL,
            gas_provided TEXT NOT NULL,
            gas_used TEXT,
            gas_price TEXT,
            status INTEGER NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contracts (
            address TEXT PRIMARY KEY
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_transactions_block_time ON transactions(block_time);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn insert_transactions(pool: &SqlitePool, txs: &[TransactionRecord]) -> Result<()> {
    let mut txn = pool.begin().await?;

    for tx in txs {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                txid, block_height, block_hash, block_time, from_addr, to_addr,
                value, gas_provided, gas_used, gas_price, status
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(txid) DO NOTHING;
            "#,
        )
        .bind(&tx.txid)
        .bind(tx.block_height)
        .bind(&tx.block_hash)
        .bind(tx.block_time.timestamp())
        .bind(tx.from.to_lowercase())
        .bind(tx.to.as_ref().map(|to| to.to_lowercase()))
        .bind(tx.value.to_string())
        .bind(tx.gas_provided.to_string())
        .bind(tx.gas_used.as_ref().map(ToString::to_string))
        .bind(tx.gas_price.as_ref().map(ToString::to_string))
        .bind(tx.success)
        .execute(&mut *txn)
        .await?;
    }

    txn.commit().await?;
    Ok(())
}

pub async fn insert_contracts<S: AsRef<str>>(pool: &SqlitePool, addresses: &[S]) -> Result<()> {
    let mut txn = pool.begin().await?;

    for address in addresses {
        sqlx::query(
            r#"
            INSERT INTO contracts (address) VALUES (?1)
            ON CONFLICT(address) DO NOTHING;
            "#,
        )
        .bind(address.as_ref().to_lowercase())
        .execute(&mut *txn)
        .await?;
    }

    txn.commit().await?;
    Ok(())
}

#[derive(FromRow)]
struct TxRow {
    txid: String,
    block_height: i64,
    block_hash: String,
    block_time: i64,
    from_addr: String,
    to_addr: Option<String>,
    value: String,
    gas_provided: String,
    gas_used: Option<String>,
    gas_price: Option<String>,
    status: bool,
}

impl TxRow {
    /// `None` when a mandatory column does not hold a usable value.
    fn into_record(self) -> Option<TransactionRecord> {
        let block_time = DateTime::<Utc>::from_timestamp(self.block_time, 0)?;
        let value = parse_decimal(&self.txid, "value", &self.value)?;
        let gas_provided = parse_decimal(&self.txid, "gas_provided", &self.gas_provided)?;
        let gas_used = self
            .gas_used
            .as_deref()
            .and_then(|v| parse_decimal(&self.txid, "gas_used", v));
        let gas_price = self
            .gas_price
            .as_deref()
            .and_then(|v| parse_decimal(&self.txid, "gas_price", v));

        Some(TransactionRecord {
            txid: self.txid,
            block_height: self.block_height,
            block_hash: self.block_hash,
            block_time,
            from: self.from_addr,
            to: self.to_addr,
            value,
            gas_provided,
            gas_used,
            gas_price,
            success: self.status,
        })
    }
}

fn parse_decimal(txid: &str, column: &str, raw: &str) -> Option<BigDecimal> {
    match BigDecimal::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("transaction {} has unparsable {} {:?}: {}", txid, column, raw, e);
            None
        }
    }
}

/// Transaction source over the SQLite store. Contract, zero-address and
/// status exclusion run inside the query; the zero-value check runs on the
/// parsed decimal since `value` is stored as text.
#[derive(Clone)]
pub struct SqliteSource {
    pool: DbPool,
}

impl SqliteSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionSource for SqliteSource {
    async fn organic_transfers(
        &self,
        window: &DayWindow,
    ) -> Result<Vec<TransactionRecord>, PipelineError> {
        // Held until the end of this call, on every path.
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(PipelineError::source_unavailable)?;

        let rows = sqlx::query_as::<_, TxRow>(
            r#"
            SELECT txid, block_height, block_hash, block_time, from_addr, to_addr,
                   value, gas_provided, gas_used, gas_price, status
            FROM transactions
            WHERE block_time >= ?1
              AND block_time < ?2
              AND status = 1
              AND to_addr IS NOT NULL
              AND from_addr != ?3
              AND to_addr != ?3
              AND from_addr NOT IN (SELECT address FROM contracts)
              AND to_addr NOT IN (SELECT address FROM contracts)
            ORDER BY block_time ASC;
            "#,
        )
        .bind(window.start.timestamp())
        .bind(window.end.timestamp())
        .bind(ZERO_ADDRESS)
        .fetch_all(&mut *conn)
        .await
        .map_err(PipelineError::source_unavailable)?;

        Ok(rows
            .into_iter()
            .filter_map(TxRow::into_record)
            .filter(filter::carries_value)
            .collect())
    }
}
