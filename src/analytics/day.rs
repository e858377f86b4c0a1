use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::PipelineError;

const DAY_FORMAT: &str = "%Y-%b-%d";

/// A UTC calendar day, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Parses a day written as `YYYY-Mon-DD`, e.g. `2021-Jan-01`.
    ///
    /// The month abbreviation must be title case and both the year and the
    /// day of month must be zero padded; chrono alone accepts looser input.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        if !has_day_shape(raw) {
            return Err(PipelineError::InvalidDateFormat(raw.to_string()));
        }
        let day = NaiveDate::parse_from_str(raw, DAY_FORMAT)
            .map_err(|_| PipelineError::InvalidDateFormat(raw.to_string()))?;
        Ok(Self::for_day(day))
    }

    pub fn for_day(day: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
        Self {
            day,
            start,
            end: start + Duration::days(1),
        }
    }

    /// Moves both edges forward by `skew`, so that the block times selected
    /// are exactly those whose skew-corrected hour falls inside the day.
    pub fn shifted(self, skew: Duration) -> Self {
        Self {
            day: self.day,
            start: self.start + skew,
            end: self.end + skew,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

fn has_day_shape(raw: &str) -> bool {
    let b = raw.as_bytes();
    b.len() == 11
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5].is_ascii_uppercase()
        && b[6].is_ascii_lowercase()
        && b[7].is_ascii_lowercase()
        && b[8] == b'-'
        && b[9..].iter().all(u8::is_ascii_digit)
}
