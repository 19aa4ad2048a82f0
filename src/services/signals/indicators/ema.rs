//! Exponential Moving Average (EMA).

/// EMA with smoothing factor 2/(period+1).
///
/// Seeded with the first value, so it is defined at every position.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    fn alpha(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }

    pub fn series(&self, values: &[f64]) -> Vec<f64> {
        let alpha = self.alpha();
        let mut out = Vec::with_capacity(values.len());
        let mut iter = values.iter();
        let Some(&first) = iter.next() else {
            return out;
        };
        let mut ema = first;
        out.push(ema);
        for v in iter {
            ema = (v - ema) * alpha + ema;
            out.push(ema);
        }
        out
    }

    pub fn latest(&self, values: &[f64]) -> Option<f64> {
        self.series(values).last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_seeded_with_first_value() {
        let ema = Ema::new(9);
        let out = ema.series(&[10.0, 11.0, 12.0]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], 10.0);
        assert!(out[1] > 10.0 && out[1] < 11.0);
    }

    #[test]
    fn test_ema_constant_input() {
        let ema = Ema::new(21);
        let out = ema.series(&[5.0; 40]);
        assert!(out.iter().all(|v| (*v - 5.0).abs() < 1e-12));
    }

    #[test]
    fn test_ema_fast_tracks_closer_than_slow() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let fast = Ema::new(9).latest(&values).unwrap();
        let slow = Ema::new(50).latest(&values).unwrap();
        assert!(fast > slow);
        assert!(fast < 159.0);
    }

    #[test]
    fn test_ema_empty_input() {
        assert!(Ema::new(9).series(&[]).is_empty());
        assert!(Ema::new(9).latest(&[]).is_none());
    }
}
