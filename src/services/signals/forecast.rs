//! Pluggable candidate generators beyond the rule cascade.

use crate::config::ForecastConfig;
use crate::services::signals::context::FeatureContext;
use crate::types::{Candidate, RuleKind, Series, Side};

/// Produces extra candidates for an already classified context.
pub trait CandidateGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Candidates in emission order; empty when nothing significant is seen.
    fn generate(&self, primary: &Series, ctx: &FeatureContext) -> Vec<Candidate>;
}

/// Least-squares line through the last closes, projected `horizon` bars ahead.
///
/// Every step whose projected move clears `min_move_pct` yields a candidate.
pub struct LinearForecaster {
    config: ForecastConfig,
}

impl LinearForecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    /// Slope and intercept of the regression line over `values` (x = 0..n).
    pub fn fit(values: &[f64]) -> Option<(f64, f64)> {
        let n = values.len();
        if n < 2 {
            return None;
        }
        let n_f = n as f64;
        let mean_x = (n_f - 1.0) / 2.0;
        let mean_y = values.iter().sum::<f64>() / n_f;

        let mut cov = 0.0;
        let mut var = 0.0;
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - mean_x;
            cov += dx * (y - mean_y);
            var += dx * dx;
        }
        if var <= 0.0 {
            return None;
        }
        let slope = cov / var;
        Some((slope, mean_y - slope * mean_x))
    }
}

impl CandidateGenerator for LinearForecaster {
    fn name(&self) -> &str {
        "linear_forecast"
    }

    fn generate(&self, primary: &Series, ctx: &FeatureContext) -> Vec<Candidate> {
        if !self.config.is_enabled() || ctx.atr <= 0.0 || ctx.price <= 0.0 {
            return Vec::new();
        }

        let closes: Vec<f64> = primary
            .tail(self.config.lookback)
            .iter()
            .map(|b| b.close)
            .collect();
        let Some((slope, intercept)) = Self::fit(&closes) else {
            return Vec::new();
        };
        let last_x = (closes.len() - 1) as f64;

        (1..=self.config.horizon)
            .filter_map(|step| {
                let projected = intercept + slope * (last_x + step as f64);
                let change = projected - ctx.price;
                let pct = change / ctx.price;
                if !pct.is_finite() || pct.abs() < self.config.min_move_pct {
                    return None;
                }
                let side = if change > 0.0 { Side::Long } else { Side::Short };
                let confidence = (self.config.min_confidence + change.abs() / ctx.atr * 0.05)
                    .clamp(self.config.min_confidence, self.config.max_confidence);
                Some(
                    Candidate::new(
                        side,
                        confidence,
                        RuleKind::Forecast,
                        format!("linreg h={} move={:+.2}%", step, pct * 100.0),
                    )
                    .with_horizon(step),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::signals::rules::tests::neutral_context;
    use crate::types::PriceBar;

    fn series_from_closes(closes: &[f64]) -> Series {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, c)| PriceBar::new(i as i64 * 60_000, *c, c + 0.5, c - 0.5, *c, 1.0))
            .collect();
        Series::new(bars).unwrap()
    }

    fn enabled(horizon: usize) -> ForecastConfig {
        ForecastConfig {
            horizon,
            ..Default::default()
        }
    }

    #[test]
    fn test_fit_exact_line() {
        let (slope, intercept) = LinearForecaster::fit(&[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
        assert!(LinearForecaster::fit(&[1.0]).is_none());
    }

    #[test]
    fn test_rising_closes_project_long() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let series = series_from_closes(&closes);
        let mut ctx = neutral_context();
        ctx.price = *closes.last().unwrap();

        let candidates = LinearForecaster::new(enabled(3)).generate(&series, &ctx);
        assert_eq!(candidates.len(), 3);
        for (i, candidate) in candidates.iter().enumerate() {
            assert_eq!(candidate.side, Side::Long);
            assert_eq!(candidate.rule, RuleKind::Forecast);
            assert_eq!(candidate.horizon, Some(i + 1));
            assert!(candidate.base_confidence >= 0.5 && candidate.base_confidence <= 0.7);
        }
    }

    #[test]
    fn test_flat_closes_project_nothing() {
        let series = series_from_closes(&[100.0; 60]);
        let ctx = neutral_context();
        assert!(LinearForecaster::new(enabled(5))
            .generate(&series, &ctx)
            .is_empty());
    }

    #[test]
    fn test_disabled_by_default() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 - i as f64).collect();
        let series = series_from_closes(&closes);
        let ctx = neutral_context();
        assert!(LinearForecaster::new(ForecastConfig::default())
            .generate(&series, &ctx)
            .is_empty());
    }

    #[test]
    fn test_reversed_band_does_not_panic() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let series = series_from_closes(&closes);
        let mut ctx = neutral_context();
        ctx.price = *closes.last().unwrap();

        let config = ForecastConfig {
            horizon: 2,
            min_confidence: 0.7,
            max_confidence: 0.5,
            ..Default::default()
        };
        let candidates = LinearForecaster::new(config).generate(&series, &ctx);
        assert_eq!(candidates.len(), 2);
        assert!(candidates
            .iter()
            .all(|c| c.base_confidence >= 0.5 && c.base_confidence <= 0.7));
    }
}
