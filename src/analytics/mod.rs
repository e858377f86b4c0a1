//! Hourly average fee of organic transfers for one day.
//!
//! A run validates the day, pulls the day's organic transfers from a
//! [`TransactionSource`], derives each transfer's fee, folds the fees into
//! hour buckets and returns the bucket means in ascending time order.

pub mod bucket;
pub mod day;
pub mod fee;
pub mod filter;
pub mod source;

use chrono::Duration;

use crate::error::PipelineError;
use crate::models::{HourlyAverage, HourlyGasResponse};

pub use bucket::{FeeSample, HourlyAggregator};
pub use day::DayWindow;
pub use filter::{ContractAddressSet, OrganicFilter};
pub use source::{InMemorySource, TransactionSource};

/// Per-call knobs. Owned by the caller, borrowed for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Subtracted from the block time before truncating to the hour.
    pub skew_correction: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            skew_correction: Duration::minutes(1),
        }
    }
}

pub async fn hourly_fees<S>(
    source: &S,
    raw_day: &str,
    settings: &PipelineSettings,
) -> Result<HourlyGasResponse, PipelineError>
where
    S: TransactionSource + ?Sized,
{
    let window = DayWindow::parse(raw_day)?.shifted(settings.skew_correction);
    let transfers = source.organic_transfers(&window).await?;
    if transfers.is_empty() {
        return Err(PipelineError::EmptyResult(window.day));
    }

    let mut aggregator = HourlyAggregator::new();
    let mut skipped = 0usize;
    for tx in &transfers {
        match fee::fee_in_ether(tx) {
            Ok(fee) => {
                aggregator.fold(FeeSample::new(tx.block_time, fee, settings.skew_correction));
            }
            Err(err) => {
                skipped += 1;
                tracing::warn!("skipping record: {}", err);
            }
        }
    }

    tracing::debug!(
        day = %window.day,
        transfers = transfers.len(),
        skipped,
        "aggregated hourly fees"
    );

    let averages = aggregator.finish();
    if averages.is_empty() {
        return Err(PipelineError::EmptyResult(window.day));
    }
    Ok(present(bucket::chronological(averages)))
}

pub fn present(averages: Vec<HourlyAverage>) -> HourlyGasResponse {
    HourlyGasResponse { result: averages }
}
