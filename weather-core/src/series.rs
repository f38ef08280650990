//! Pure reductions of a forecast series into the two chart views.
//!
//! The daily view is a fixed sampling rule (every 8th sample, i.e. once per
//! 24h at 3-hour spacing), not a calendar-day aggregation. If the provider's
//! spacing changes, the "daily" entries drift accordingly.

use chrono::{Local, TimeZone};
use serde::Serialize;
use std::fmt::Display;

use crate::model::ForecastSample;

/// Samples per day at the provider's 3-hour spacing.
pub const SAMPLES_PER_DAY: usize = 8;

/// Upper bound on daily summaries.
pub const MAX_DAILY_SUMMARIES: usize = 5;

/// Length of the near-term chart series (~24h).
pub const INTRADAY_POINTS: usize = 8;

/// One point of the temperature/humidity trend chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntradayPoint {
    /// Short local time, e.g. "03:00 PM".
    pub label: String,
    pub temperature: i64,
    pub humidity_pct: u8,
}

/// Samples at indices 0, 8, 16, 24, 32, as far as the series reaches.
pub fn to_daily_summaries(samples: &[ForecastSample]) -> Vec<ForecastSample> {
    samples
        .iter()
        .step_by(SAMPLES_PER_DAY)
        .take(MAX_DAILY_SUMMARIES)
        .cloned()
        .collect()
}

/// First eight samples, labelled in the local timezone.
pub fn to_intraday_series(samples: &[ForecastSample]) -> Vec<IntradayPoint> {
    to_intraday_series_in(samples, &Local)
}

pub fn to_intraday_series_in<Tz>(samples: &[ForecastSample], tz: &Tz) -> Vec<IntradayPoint>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    samples
        .iter()
        .take(INTRADAY_POINTS)
        .map(|sample| IntradayPoint {
            label: sample
                .timestamp
                .with_timezone(tz)
                .format("%I:%M %p")
                .to_string(),
            temperature: sample.temperature.round() as i64,
            humidity_pct: sample.humidity_pct,
        })
        .collect()
}
