use crate::price_series::PriceSeries;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

pub const POINTS_PER_DAY: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct IncompleteDate {
    pub date: NaiveDate,
    pub points: usize,
}

/// Two adjacent points further apart than one hour.
#[derive(Debug, Clone, PartialEq)]
pub struct Gap {
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
    pub missing_hours: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageDiagnostics {
    pub first_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
    pub span_days: i64,
    pub incomplete_dates: Vec<IncompleteDate>,
    pub gaps: Vec<Gap>,
    pub rows_with_missing_values: usize,
}

/// Coverage summary of a series; `None` when there is nothing to describe.
///
/// Every calendar date from the first to the last point is checked, so a day
/// with no points at all is reported with a count of zero.
pub fn coverage(series: &PriceSeries) -> Option<CoverageDiagnostics> {
    let first_timestamp = series.first_timestamp()?;
    let last_timestamp = series.last_timestamp()?;

    let mut per_date: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut date = first_timestamp.date_naive();
    while date <= last_timestamp.date_naive() {
        per_date.insert(date, 0);
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    for point in series.points() {
        *per_date.entry(point.timestamp.date_naive()).or_default() += 1;
    }

    let incomplete_dates = per_date
        .into_iter()
        .filter(|&(_, points)| points != POINTS_PER_DAY)
        .map(|(date, points)| IncompleteDate { date, points })
        .collect();

    let gaps = series
        .points()
        .windows(2)
        .filter_map(|w| {
            let spacing = w[1].timestamp - w[0].timestamp;
            (spacing != Duration::hours(1)).then(|| Gap {
                after: w[0].timestamp,
                before: w[1].timestamp,
                missing_hours: spacing.num_hours() - 1,
            })
        })
        .collect();

    let rows_with_missing_values = series.points().iter().filter(|p| p.has_missing_field()).count();

    Some(CoverageDiagnostics {
        first_timestamp,
        last_timestamp,
        span_days: (last_timestamp - first_timestamp).num_days() + 1,
        incomplete_dates,
        gaps,
        rows_with_missing_values,
    })
}
