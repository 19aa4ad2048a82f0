//! Average True Range (ATR).

use crate::types::PriceBar;

/// ATR as a simple mean of true ranges.
///
/// TR = max(High-Low, |High-PrevClose|, |Low-PrevClose|), with the first bar
/// using High-Low. ATR at index `i` is the mean of the `period` true ranges
/// ending at `i`, defined once `i >= period`; earlier positions are 0.
#[derive(Debug, Clone, Copy)]
pub struct Atr {
    period: usize,
}

impl Default for Atr {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    fn true_range(current: &PriceBar, previous: &PriceBar) -> f64 {
        let hl = current.high - current.low;
        let hc = (current.high - previous.close).abs();
        let lc = (current.low - previous.close).abs();
        hl.max(hc).max(lc)
    }

    pub fn true_ranges(bars: &[PriceBar]) -> Vec<f64> {
        let mut out = Vec::with_capacity(bars.len());
        for (i, bar) in bars.iter().enumerate() {
            if i == 0 {
                out.push(bar.range());
            } else {
                out.push(Self::true_range(bar, &bars[i - 1]));
            }
        }
        out
    }

    pub fn series(&self, bars: &[PriceBar]) -> Vec<f64> {
        let n = self.period;
        let tr = Self::true_ranges(bars);
        let mut out = vec![0.0; bars.len()];
        let mut sum = 0.0;
        for i in 0..tr.len() {
            sum += tr[i];
            if i >= n {
                sum -= tr[i - n];
                out[i] = (sum / n as f64).max(0.0);
            }
        }
        out
    }

    /// Latest ATR, 0 when there is not enough history.
    pub fn latest(&self, bars: &[PriceBar]) -> f64 {
        if bars.len() <= self.period {
            return 0.0;
        }
        let tr = Self::true_ranges(&bars[bars.len() - self.period - 1..]);
        (tr[1..].iter().sum::<f64>() / self.period as f64).max(0.0)
    }
}
