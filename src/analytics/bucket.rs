use std::collections::HashMap;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Duration, Utc};

use crate::models::HourlyAverage;

const BUCKET_SECS: i64 = 3600;

/// A fee assigned to the hour it is averaged into.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeSample {
    pub bucket_start: DateTime<Utc>,
    pub fee: BigDecimal,
}

impl FeeSample {
    pub fn new(block_time: DateTime<Utc>, fee: BigDecimal, skew: Duration) -> Self {
        Self {
            bucket_start: bucket_start(block_time, skew),
            fee,
        }
    }
}

/// Start of the hour `block_time - skew` falls in.
pub fn bucket_start(block_time: DateTime<Utc>, skew: Duration) -> DateTime<Utc> {
    let shifted = block_time - skew;
    let into_hour = shifted.timestamp().rem_euclid(BUCKET_SECS);
    shifted
        - Duration::seconds(into_hour)
        - Duration::nanoseconds(i64::from(shifted.timestamp_subsec_nanos()))
}

#[derive(Debug, Clone)]
pub struct HourlyBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: u64,
    pub sum: BigDecimal,
}

impl HourlyBucket {
    fn open(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: start + Duration::seconds(BUCKET_SECS),
            count: 0,
            sum: BigDecimal::from(0u64),
        }
    }

    fn add(&mut self, fee: BigDecimal) {
        self.count += 1;
        self.sum += fee;
    }

    /// `None` when the exact mean has no finite `f64` representation.
    pub fn mean(&self) -> Option<f64> {
        let mean = self.sum.clone() / BigDecimal::from(self.count);
        mean.to_f64().filter(|v| v.is_finite())
    }

    fn finalize(&self) -> Option<HourlyAverage> {
        let Some(v) = self.mean() else {
            tracing::warn!(
                "dropping bucket {}: mean of {} samples is not representable",
                self.start,
                self.count
            );
            return None;
        };
        Some(HourlyAverage {
            t: self.start.timestamp(),
            v,
        })
    }
}

/// Streaming fold of fee samples into hour buckets. Only hours that received
/// at least one sample exist.
#[derive(Debug, Default)]
pub struct HourlyAggregator {
    buckets: HashMap<DateTime<Utc>, HourlyBucket>,
}

impl HourlyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, sample: FeeSample) {
        self.buckets
            .entry(sample.bucket_start)
            .or_insert_with(|| HourlyBucket::open(sample.bucket_start))
            .add(sample.fee);
    }

    pub fn sample_count(&self) -> u64 {
        self.buckets.values().map(|b| b.count).sum()
    }

    pub fn buckets(&self) -> impl Iterator<Item = &HourlyBucket> {
        self.buckets.values()
    }

    /// Finalizes every bucket. Order is unspecified, see [`chronological`].
    pub fn finish(self) -> Vec<HourlyAverage> {
        self.buckets
            .values()
            .filter_map(HourlyBucket::finalize)
            .collect()
    }
}

pub fn chronological(mut averages: Vec<HourlyAverage>) -> Vec<HourlyAverage> {
    averages.sort_by_key(|avg| avg.t);
    averages
}
