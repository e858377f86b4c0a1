use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use ethers_core::types::{Block, BlockId, Transaction, TransactionReceipt, H160, U256, U64};
use ethers_providers::{Http, Middleware, Provider};
use url::Url;

use crate::models::TransactionRecord;

#[derive(Clone)]
pub struct EthClient {
    provider: Provider<Http>,
}

/// Output of one ingestion run, ready to be written to the store.
#[derive(Debug, Default)]
pub struct IngestBatch {
    pub blocks: usize,
    pub transactions: Vec<TransactionRecord>,
    pub contracts: Vec<String>,
}

impl EthClient {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .context("failed to build reqwest client")?;
        let url = Url::parse(rpc_url).context("invalid ETH_RPC_URL")?;
        let transport = Http::new_with_client(url, client);
        let provider = Provider::new(transport);
        Ok(Self { provider })
    }

    /// Fetches the last `count` blocks with a receipt per transaction and
    /// classifies every participant as contract or EOA.
    pub async fn fetch_recent_blocks(&self, count: u64) -> Result<IngestBatch> {
        let mut batch = IngestBatch::default();
        if count == 0 {
            return Ok(batch);
        }

        let latest = self
            .provider
            .get_block_number()
            .await
            .context("failed to fetch latest block number")?;

        let start = latest.saturating_sub((count - 1).into());
        let mut has_code: HashMap<H160, bool> = HashMap::new();
        let mut created: HashSet<H160> = HashSet::new();

        for num in start.as_u64()..=latest.as_u64() {
            let block_id = BlockId::Number(num.into());
            let Some(block) = self
                .provider
                .get_block_with_txs(block_id)
                .await
                .with_context(|| format!("failed to fetch block {}", num))?
            else {
                tracing::warn!("block {} not returned by node", num);
                continue;
            };
            let Some((height, hash, block_time)) = block_header(&block) else {
                continue;
            };

            for tx in block.transactions {
                let receipt = self
                    .provider
                    .get_transaction_receipt(tx.hash)
                    .await
                    .with_context(|| format!("failed to fetch receipt {:?}", tx.hash))?;
                if let Some(address) = receipt.as_ref().and_then(|r| r.contract_address) {
                    created.insert(address);
                }

                for address in std::iter::once(tx.from).chain(tx.to) {
                    if has_code.contains_key(&address) {
                        continue;
                    }
                    let code = self
                        .provider
                        .get_code(address, Some(block_id))
                        .await
                        .with_context(|| format!("failed to fetch code of {:?}", address))?;
                    has_code.insert(address, !code.is_empty());
                }

                batch
                    .transactions
                    .push(normalize_tx(tx, receipt.as_ref(), height, &hash, block_time)?);
            }
            batch.blocks += 1;
        }

        batch.contracts = has_code
            .into_iter()
            .filter_map(|(address, code)| code.then_some(address))
            .chain(created)
            .collect::<HashSet<_>>()
            .into_iter()
            .map(address_to_lower_hex)
            .collect();
        batch.contracts.sort();

        Ok(batch)
    }
}

/// Height, hash and time of a mined block; `None` for pending blocks or
/// values that do not fit the store's integer columns.
fn block_header(block: &Block<Transaction>) -> Option<(i64, String, DateTime<Utc>)> {
    let number = block.number?;
    let hash = format!("0x{:x}", block.hash?);
    let Ok(height) = i64::try_from(number.as_u64()) else {
        tracing::warn!("skipping block {}: height out of range", number);
        return None;
    };
    let block_time = u64::try_from(block.timestamp)
        .ok()
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    let Some(block_time) = block_time else {
        tracing::warn!(
            "skipping block {}: timestamp {} out of range",
            number,
            block.timestamp
        );
        return None;
    };
    Some((height, hash, block_time))
}

fn normalize_tx(
    tx: Transaction,
    receipt: Option<&TransactionReceipt>,
    block_height: i64,
    block_hash: &str,
    block_time: DateTime<Utc>,
) -> Result<TransactionRecord> {
    let gas_price = tx
        .gas_price
        .or_else(|| receipt.and_then(|r| r.effective_gas_price));
    Ok(TransactionRecord {
        txid: format!("0x{:x}", tx.hash),
        block_height,
        block_hash: block_hash.to_string(),
        block_time,
        from: address_to_lower_hex(tx.from),
        to: tx.to.map(address_to_lower_hex),
        value: u256_to_decimal(tx.value)?,
        gas_provided: u256_to_decimal(tx.gas)?,
        gas_used: receipt
            .and_then(|r| r.gas_used)
            .map(u256_to_decimal)
            .transpose()?,
        gas_price: gas_price.map(u256_to_decimal).transpose()?,
        success: receipt.and_then(|r| r.status) == Some(U64::one()),
    })
}

fn address_to_lower_hex(addr: H160) -> String {
    format!("0x{:x}", addr)
}

fn u256_to_decimal(value: U256) -> Result<BigDecimal> {
    BigDecimal::from_str(&value.to_string())
        .with_context(|| format!("cannot represent {} as decimal", value))
}
