use async_trait::async_trait;

use super::day::DayWindow;
use super::filter::{ContractAddressSet, OrganicFilter};
use crate::error::PipelineError;
use crate::models::TransactionRecord;

/// Supplies the organic transfers whose block time lies in a window.
///
/// Implementations may push the filtering down into their store; whatever
/// they return must satisfy [`OrganicFilter::admits`] and lie inside
/// `[window.start, window.end)`. The pipeline passes a window already shifted
/// by the skew correction.
#[async_trait]
pub trait TransactionSource {
    async fn organic_transfers(
        &self,
        window: &DayWindow,
    ) -> Result<Vec<TransactionRecord>, PipelineError>;
}

/// Source backed by records held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    transactions: Vec<TransactionRecord>,
    contracts: ContractAddressSet,
}

impl InMemorySource {
    pub fn new(transactions: Vec<TransactionRecord>, contracts: ContractAddressSet) -> Self {
        Self {
            transactions,
            contracts,
        }
    }
}

#[async_trait]
impl TransactionSource for InMemorySource {
    async fn organic_transfers(
        &self,
        window: &DayWindow,
    ) -> Result<Vec<TransactionRecord>, PipelineError> {
        let filter = OrganicFilter::new(&self.contracts);
        Ok(self
            .transactions
            .iter()
            .filter(|tx| window.contains(tx.block_time) && filter.admits(tx))
            .cloned()
            .collect())
    }
}
