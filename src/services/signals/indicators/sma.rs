//! Simple Moving Average (SMA).

/// SMA over a trailing window.
///
/// Positions with fewer than `period` points behind them are `None`.
#[derive(Debug, Clone, Copy)]
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// Rolling mean, same length as `values`.
    pub fn series(&self, values: &[f64]) -> Vec<Option<f64>> {
        let n = self.period;
        let mut out = Vec::with_capacity(values.len());
        let mut sum = 0.0;
        for (i, v) in values.iter().enumerate() {
            sum += v;
            if i >= n {
                sum -= values[i - n];
            }
            out.push(if i + 1 >= n { Some(sum / n as f64) } else { None });
        }
        out
    }

    /// Mean of the last `period` values.
    pub fn latest(&self, values: &[f64]) -> Option<f64> {
        if values.len() < self.period {
            return None;
        }
        let window = &values[values.len() - self.period..];
        Some(window.iter().sum::<f64>() / self.period as f64)
    }
}
