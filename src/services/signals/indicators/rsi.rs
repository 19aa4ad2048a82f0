//! Relative Strength Index (RSI).

/// Added to the loss average so a lossless run stays finite.
const LOSS_EPSILON: f64 = 1e-9;

/// Both averages below this means the market is flat.
const FLAT_EPSILON: f64 = 1e-12;

/// Neutral RSI used where the value is undefined.
pub const NEUTRAL_RSI: f64 = 50.0;

/// RSI with Wilder smoothing (alpha = 1/period).
///
/// Values range from 0-100:
/// - Below 30: oversold
/// - Above 70: overbought
#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// RSI at every position. Index 0 has no change behind it and is neutral.
    pub fn series(&self, values: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(values.len());
        if values.is_empty() {
            return out;
        }
        out.push(NEUTRAL_RSI);

        let alpha = 1.0 / self.period as f64;
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;

        for i in 1..values.len() {
            let change = values[i] - values[i - 1];
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);

            if i == 1 {
                avg_gain = gain;
                avg_loss = loss;
            } else {
                avg_gain += alpha * (gain - avg_gain);
                avg_loss += alpha * (loss - avg_loss);
            }

            out.push(Self::from_averages(avg_gain, avg_loss));
        }
        out
    }

    pub fn latest(&self, values: &[f64]) -> f64 {
        self.series(values).last().copied().unwrap_or(NEUTRAL_RSI)
    }

    fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_gain < FLAT_EPSILON && avg_loss < FLAT_EPSILON {
            return NEUTRAL_RSI;
        }
        let rs = avg_gain / (avg_loss + LOSS_EPSILON);
        let rsi = 100.0 - 100.0 / (1.0 + rs);
        if rsi.is_finite() {
            rsi.clamp(0.0, 100.0)
        } else {
            NEUTRAL_RSI
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uptrend(count: usize) -> Vec<f64> {
        (0..count).map(|i| 100.0 + i as f64 * 1.5).collect()
    }

    fn downtrend(count: usize) -> Vec<f64> {
        (0..count).map(|i| 200.0 - i as f64 * 1.5).collect()
    }

    #[test]
    fn test_rsi_same_length_as_input() {
        let rsi = Rsi::default();
        assert_eq!(rsi.series(&uptrend(30)).len(), 30);
        assert!(rsi.series(&[]).is_empty());
    }

    #[test]
    fn test_rsi_first_value_neutral() {
        let rsi = Rsi::default();
        assert_eq!(rsi.series(&uptrend(10))[0], NEUTRAL_RSI);
        assert_eq!(rsi.latest(&[]), NEUTRAL_RSI);
        assert_eq!(rsi.latest(&[42.0]), NEUTRAL_RSI);
    }

    #[test]
    fn test_rsi_uptrend_high_value() {
        let value = Rsi::default().latest(&uptrend(50));
        assert!(value > 90.0, "RSI in uptrend should be high, got {}", value);
        assert!(value <= 100.0);
    }

    #[test]
    fn test_rsi_downtrend_low_value() {
        let value = Rsi::default().latest(&downtrend(50));
        assert!(value < 10.0, "RSI in downtrend should be low, got {}", value);
        assert!(value >= 0.0);
    }

    #[test]
    fn test_rsi_flat_market_is_neutral() {
        let value = Rsi::default().latest(&[100.0; 40]);
        assert_eq!(value, NEUTRAL_RSI);
    }

    #[test]
    fn test_rsi_alternating_near_middle() {
        let values: Vec<f64> = (0..60)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let value = Rsi::default().latest(&values);
        assert!(value > 35.0 && value < 65.0, "got {}", value);
    }
}
