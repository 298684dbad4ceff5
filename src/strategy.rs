//! Moving-average crossover signal and the return series derived from it.
//!
//! Every vector here is aligned with the price series: index `t` refers to the
//! point at index `t`. `None` marks a value that is undefined at that point
//! (warm-up, missing close, first row, non-positive previous close).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Long,
    Short,
}

impl Position {
    pub fn sign(self) -> f64 {
        match self {
            Position::Long => 1.0,
            Position::Short => -1.0,
        }
    }
}

/// Long when the close is strictly above its reference average, short otherwise.
pub fn positions(closes: &[Option<f64>], reference: &[Option<f64>]) -> Vec<Option<Position>> {
    closes
        .iter()
        .zip(reference)
        .map(|(close, avg)| match (close, avg) {
            (Some(c), Some(a)) if c > a => Some(Position::Long),
            (Some(_), Some(_)) => Some(Position::Short),
            _ => None,
        })
        .collect()
}

/// `close[t] / close[t-1] - 1`.
pub fn period_returns(closes: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut returns = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return returns;
    }
    returns.push(None);
    returns.extend(closes.windows(2).map(|w| match (w[0], w[1]) {
        (Some(prev), Some(curr)) if prev > 0.0 => Some(curr / prev - 1.0),
        _ => None,
    }));
    returns
}

/// `return[t] * position[t-1]`: the position decided at the previous close is
/// the one that earns the current return.
pub fn strategy_returns(
    returns: &[Option<f64>],
    positions: &[Option<Position>],
) -> Vec<Option<f64>> {
    returns
        .iter()
        .enumerate()
        .map(|(t, ret)| {
            let held = t.checked_sub(1).and_then(|prev| positions.get(prev).copied().flatten())?;
            ret.map(|r| r * held.sign())
        })
        .collect()
}

/// Running product of `(1 + return)`. Undefined returns leave the product unchanged.
pub fn cumulative_product(returns: &[Option<f64>]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |acc, ret| {
            if let Some(r) = ret {
                *acc *= 1.0 + r;
            }
            Some(*acc)
        })
        .collect()
}

/// Final value of [`cumulative_product`], or `1.0` for an empty slice.
pub fn compounded(returns: &[Option<f64>]) -> f64 {
    returns.iter().flatten().fold(1.0, |acc, r| acc * (1.0 + r))
}

/// Every derived column of the crossover strategy, aligned with the series.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFrame {
    pub positions: Vec<Option<Position>>,
    pub returns: Vec<Option<f64>>,
    pub strategy_returns: Vec<Option<f64>>,
    pub cumulative_returns: Vec<f64>,
    pub cumulative_strategy_returns: Vec<f64>,
}

impl StrategyFrame {
    pub fn build(closes: &[Option<f64>], reference: &[Option<f64>]) -> Self {
        let positions = positions(closes, reference);
        let returns = period_returns(closes);
        let strategy_returns = strategy_returns(&returns, &positions);
        let cumulative_returns = cumulative_product(&returns);
        let cumulative_strategy_returns = cumulative_product(&strategy_returns);
        Self {
            positions,
            returns,
            strategy_returns,
            cumulative_returns,
            cumulative_strategy_returns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < EPS)
    }

    #[test]
    fn worked_example_with_constant_reference() {
        let closes = [Some(100.0), Some(110.0), Some(99.0)];
        let frame = StrategyFrame::build(&closes, &[Some(105.0); 3]);

        assert_eq!(
            frame.positions,
            vec![Some(Position::Short), Some(Position::Long), Some(Position::Short)]
        );
        assert_eq!(frame.returns[0], None);
        assert!(approx(frame.returns[1], 0.10));
        assert!(approx(frame.returns[2], -0.10));

        assert_eq!(frame.strategy_returns[0], None);
        // short at t0 against +10% at t1, long at t1 against -10% at t2
        assert!(approx(frame.strategy_returns[1], -0.10));
        assert!(approx(frame.strategy_returns[2], -0.10));

        assert!((frame.cumulative_returns[2] - 0.99).abs() < EPS);
        assert!((frame.cumulative_strategy_returns[2] - 0.81).abs() < EPS);
    }

    #[test]
    fn close_equal_to_average_is_short() {
        let p = positions(&[Some(105.0)], &[Some(105.0)]);
        assert_eq!(p, vec![Some(Position::Short)]);
    }

    #[test]
    fn undefined_reference_means_no_position() {
        let p = positions(&[Some(1.0), None], &[None, Some(1.0)]);
        assert_eq!(p, vec![None, None]);
    }

    #[test]
    fn changing_a_future_position_never_changes_past_strategy_returns() {
        let closes = [Some(100.0), Some(101.0), Some(103.0), Some(99.0), Some(98.0)];
        let returns = period_returns(&closes);
        let mut pos = vec![Some(Position::Long); 5];
        let before = strategy_returns(&returns, &pos);

        pos[3] = Some(Position::Short);
        let after = strategy_returns(&returns, &pos);

        assert_eq!(before[..=3], after[..=3]);
        assert_ne!(before[4], after[4]);
    }

    #[test]
    fn returns_skip_missing_and_non_positive_previous_close() {
        let returns = period_returns(&[Some(0.0), Some(10.0), None, Some(12.0), Some(15.0)]);
        assert_eq!(returns[..4], [None, None, None, None]);
        assert!(approx(returns[4], 0.25));
        assert!(period_returns(&[]).is_empty());
    }

    #[test]
    fn compounding_is_associative_across_a_split() {
        let closes: Vec<Option<f64>> = [100.0, 104.0, 98.5, 101.0, 120.0, 90.0, 95.5, 97.0]
            .into_iter()
            .map(Some)
            .collect();
        let returns = period_returns(&closes);
        let whole = *cumulative_product(&returns).last().unwrap();

        for split in 0..=returns.len() {
            let (left, right) = returns.split_at(split);
            let joined = compounded(left) * compounded(right);
            assert!((whole - joined).abs() < 1e-12, "split at {split}");
        }
        assert!((whole - 0.97).abs() < 1e-12);
    }

    #[test]
    fn undefined_returns_do_not_move_the_product() {
        assert_eq!(
            cumulative_product(&[None, Some(0.5), None, Some(-0.5)]),
            vec![1.0, 1.5, 1.5, 0.75]
        );
    }
}
