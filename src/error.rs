use chrono::NaiveDate;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal outcomes of one hourly-fee computation.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid day {0:?}, expected a value like 2021-Jan-01")]
    InvalidDateFormat(String),
    #[error("transaction source unavailable")]
    SourceUnavailable(#[source] BoxError),
    #[error("no transfers found for {0}")]
    EmptyResult(NaiveDate),
}

impl PipelineError {
    pub fn source_unavailable(err: impl Into<BoxError>) -> Self {
        Self::SourceUnavailable(err.into())
    }
}

/// A record that cannot contribute a fee sample. Skipped, never fatal.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("transaction {txid} is missing {field}")]
pub struct MalformedRecord {
    pub txid: String,
    pub field: &'static str,
}
