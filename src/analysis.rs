//! Analysis pipeline: coverage diagnostics, moving average, crossover signal,
//! returns, and the summary metrics gathered into an [`AnalysisReport`].

use crate::diagnostics::{self, CoverageDiagnostics};
use crate::indicators::simple_moving_average;
use crate::price_series::{PricePoint, PriceSeries};
use crate::storage_utils::StrategyConfig;
use crate::strategy::{StrategyFrame, compounded};
use crate::yearly::{YearlyStats, yearly_breakdown};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct WindowPerformance {
    pub since: DateTime<Utc>,
    pub buy_and_hold_return: f64,
    pub strategy_return: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceAt {
    pub target: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub close: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub as_of: DateTime<Utc>,
    pub points: usize,
    pub sma_period: usize,
    pub diagnostics: Option<CoverageDiagnostics>,
    /// Compounded over the whole series, minus one.
    pub total_buy_and_hold_return: f64,
    pub total_strategy_return: f64,
    pub performance: Option<WindowPerformance>,
    pub price_one_year_ago: Option<PriceAt>,
    pub yearly: Vec<YearlyStats>,
}

/// Compounded returns over the rows at or after `since`.
///
/// The first row inside the window is the base price, so its own return (the
/// move into the window) is left out.
pub fn window_performance(
    timestamps: &[DateTime<Utc>],
    frame: &StrategyFrame,
    since: DateTime<Utc>,
) -> Option<WindowPerformance> {
    let start = timestamps.partition_point(|t| *t < since);
    if start >= timestamps.len() {
        return None;
    }
    let rows = start + 1..timestamps.len();

    Some(WindowPerformance {
        since,
        buy_and_hold_return: compounded(&frame.returns[rows.clone()]) - 1.0,
        strategy_return: compounded(&frame.strategy_returns[rows]) - 1.0,
    })
}

/// The point closest to `target`; on a tie the earlier point wins.
pub fn nearest_point(series: &PriceSeries, target: DateTime<Utc>) -> Option<&PricePoint> {
    series
        .points()
        .iter()
        .min_by_key(|p| (p.timestamp - target).abs())
}

pub fn analyze(
    series: &PriceSeries,
    config: &StrategyConfig,
    as_of: DateTime<Utc>,
) -> AnalysisReport {
    let timestamps = series.timestamps();
    let closes = series.closes();

    let reference = simple_moving_average(&closes, config.sma_period);
    let frame = StrategyFrame::build(&closes, &reference);

    let window_start = as_of - Duration::days(config.performance_window_days);
    let one_year_ago = as_of - Duration::days(365);

    AnalysisReport {
        as_of,
        points: series.len(),
        sma_period: config.sma_period,
        diagnostics: diagnostics::coverage(series),
        total_buy_and_hold_return: frame.cumulative_returns.last().map_or(0.0, |c| c - 1.0),
        total_strategy_return: frame.cumulative_strategy_returns.last().map_or(0.0, |c| c - 1.0),
        performance: window_performance(&timestamps, &frame, window_start),
        price_one_year_ago: nearest_point(series, one_year_ago).map(|p| PriceAt {
            target: one_year_ago,
            timestamp: p.timestamp,
            close: p.close,
        }),
        yearly: yearly_breakdown(&timestamps, &frame, config.bucket_days),
    }
}
