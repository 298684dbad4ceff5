use crate::strategy::{Position, StrategyFrame};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct YearlyStats {
    pub year: usize, // 1-based
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rows: usize,
    pub long_signals: usize,
    pub short_signals: usize,
    pub strategy_return_sum: f64,
    /// Median of the nonzero `strategy_return * position` values.
    pub median_trade_return: Option<f64>,
    pub buy_and_hold_return_sum: f64,
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Splits the series into consecutive `bucket_days`-long buckets starting at
/// its first timestamp; the last bucket may be partial.
///
/// `timestamps` must be sorted and aligned with `frame`.
pub fn yearly_breakdown(
    timestamps: &[DateTime<Utc>],
    frame: &StrategyFrame,
    bucket_days: i64,
) -> Vec<YearlyStats> {
    let (Some(&first), Some(&last)) = (timestamps.first(), timestamps.last()) else {
        return Vec::new();
    };
    if bucket_days <= 0 {
        return Vec::new();
    }

    let buckets = (last - first).num_days() / bucket_days + 1;

    (0..buckets)
        .map(|i| {
            let start = first + Duration::days(i * bucket_days);
            let end = start + Duration::days(bucket_days);
            let lo = timestamps.partition_point(|t| *t < start);
            let hi = timestamps.partition_point(|t| *t < end);
            let rows = lo..hi;

            let positions = &frame.positions[rows.clone()];
            let strategy = &frame.strategy_returns[rows.clone()];

            let trade_returns = strategy
                .iter()
                .zip(positions)
                .filter_map(|(ret, pos)| Some((*ret)? * (*pos)?.sign()))
                .filter(|r| *r != 0.0)
                .collect();

            YearlyStats {
                year: i as usize + 1,
                start,
                end,
                rows: rows.len(),
                long_signals: positions.iter().filter(|p| **p == Some(Position::Long)).count(),
                short_signals: positions.iter().filter(|p| **p == Some(Position::Short)).count(),
                strategy_return_sum: strategy.iter().flatten().sum(),
                median_trade_return: median(trade_returns),
                buy_and_hold_return_sum: frame.returns[rows].iter().flatten().sum(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_series::test_support::hour;

    fn daily(days: i64) -> Vec<DateTime<Utc>> {
        (0..=days).map(|d| hour(d * 24)).collect()
    }

    #[test]
    fn four_hundred_days_make_two_buckets_second_partial() {
        let timestamps = daily(400);
        let closes: Vec<Option<f64>> =
            (0..timestamps.len()).map(|i| Some(100.0 + i as f64)).collect();
        let frame = StrategyFrame::build(&closes, &vec![Some(0.0); closes.len()]);

        let years = yearly_breakdown(&timestamps, &frame, 365);

        assert_eq!(years.len(), 2);
        assert_eq!(years[0].rows, 365);
        assert_eq!(years[1].rows, 36);
        assert_eq!(years[1].start, hour(365 * 24));
        assert_eq!(years[0].long_signals + years[1].long_signals, 401);
        assert_eq!(years[0].short_signals, 0);
    }

    #[test]
    fn per_bucket_sums_and_median() {
        let timestamps: Vec<_> = (0..5).map(hour).collect();
        let closes = [Some(100.0), Some(110.0), Some(99.0), Some(99.0), Some(108.9)];
        let frame = StrategyFrame::build(&closes, &[Some(105.0); 5]);
        // positions: S L S S L ; returns: - .1 -.1 0 .1
        // strategy: - -.1 -.1 0 -.1 ; strategy * position: - -.1 .1 0 -.1

        let years = yearly_breakdown(&timestamps, &frame, 365);
        assert_eq!(years.len(), 1);
        let y = &years[0];

        assert_eq!(y.long_signals, 2);
        assert_eq!(y.short_signals, 3);
        assert!((y.strategy_return_sum - (-0.3)).abs() < 1e-9);
        assert!((y.buy_and_hold_return_sum - 0.1).abs() < 1e-9);
        // zero trade return is excluded before taking the median of [.1, -.1, -.1]
        assert!((y.median_trade_return.unwrap() - (-0.1)).abs() < 1e-9);
    }

    #[test]
    fn median_of_even_count_averages_middle_pair() {
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn empty_input_has_no_buckets() {
        let frame = StrategyFrame::build(&[], &[]);
        assert!(yearly_breakdown(&[], &frame, 365).is_empty());
    }
}
