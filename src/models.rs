use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// One transaction as read from the store. Decimal quantities are kept in
/// their smallest on-chain denomination (wei).
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub txid: String,
    pub block_height: i64,
    pub block_hash: String,
    pub block_time: DateTime<Utc>,
    pub from: String,
    pub to: Option<String>,
    pub value: BigDecimal,
    pub gas_provided: BigDecimal,
    pub gas_used: Option<BigDecimal>,
    pub gas_price: Option<BigDecimal>,
    pub success: bool,
}

/// Mean fee of one hourly bucket, as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyAverage {
    /// Bucket start, unix seconds.
    pub t: i64,
    /// Mean fee in whole ether.
    pub v: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyGasResponse {
    pub result: Vec<HourlyAverage>,
}
