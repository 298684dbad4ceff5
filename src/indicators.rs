use ta::indicators::SimpleMovingAverage;
use ta::{Next, Reset};

/// Trailing `period`-point simple moving average of `closes`.
///
/// A value is only produced once `period` consecutive closes are present; a
/// missing close restarts the warm-up.
pub fn simple_moving_average(closes: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let Ok(mut sma) = SimpleMovingAverage::new(period) else {
        return vec![None; closes.len()];
    };

    let mut filled = 0;
    closes
        .iter()
        .map(|close| match close {
            Some(price) => {
                let value = sma.next(*price);
                filled += 1;
                (filled >= period).then_some(value)
            }
            None => {
                sma.reset();
                filled = 0;
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let value = actual.expect("expected a defined average");
        assert!((value - expected).abs() < 1e-9, "{value} != {expected}");
    }

    #[test]
    fn undefined_during_warm_up() {
        let sma = simple_moving_average(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0)], 3);
        assert_eq!(sma[0], None);
        assert_eq!(sma[1], None);
        assert_close(sma[2], 2.0);
        assert_close(sma[3], 3.0);
    }

    #[test]
    fn missing_close_restarts_the_window() {
        let closes = [Some(10.0), Some(20.0), None, Some(30.0), Some(50.0)];
        let sma = simple_moving_average(&closes, 2);
        assert_close(sma[1], 15.0);
        assert_eq!(sma[2], None);
        assert_eq!(sma[3], None);
        assert_close(sma[4], 40.0);
    }

    #[test]
    fn zero_period_yields_nothing() {
        assert_eq!(simple_moving_average(&[Some(1.0)], 0), vec![None]);
    }
}
