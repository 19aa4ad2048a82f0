//! Feature context assembly.
//!
//! Turns a primary series plus optional higher-timeframe series into one
//! immutable `FeatureContext`. Everything is computed from the same snapshot,
//! so building twice from identical input yields identical contexts.

use crate::config::ContextConfig;
use crate::error::{Result, SignalError};
use crate::services::signals::indicators::{Atr, Ema, Macd, Rsi, Sma};
use crate::types::{HtfBias, PriceBar, Series, Side, Timeframe, Trend};
use serde::{Deserialize, Serialize};

/// Trend reading for one higher timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HigherTrend {
    pub timeframe: Timeframe,
    pub trend: Trend,
}

/// Typed snapshot of every feature the classifier reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureContext {
    /// Latest close.
    pub price: f64,
    pub atr: f64,
    /// Timestamp of the latest primary bar.
    pub as_of: i64,
    /// Primary bar count.
    pub bars: usize,

    pub ema_fast: f64,
    pub ema_mid: f64,
    pub ema_slow: f64,
    pub ema_fast_slope: f64,
    pub ema_slow_slope: f64,

    pub rsi: f64,
    pub macd_histogram: f64,

    /// Latest bar high minus low.
    pub range: f64,
    pub avg_range: f64,
    pub compressed: bool,

    pub volume: f64,
    pub avg_volume: f64,
    pub vol_climax: bool,

    /// Highest high of the bars before the latest one.
    pub prior_high: f64,
    /// Lowest low of the bars before the latest one.
    pub prior_low: f64,
    pub sweep_high: bool,
    pub sweep_low: bool,

    pub htf_trends: Vec<HigherTrend>,
    pub htf_bias: HtfBias,

    pub micro_trend_up: bool,
    pub micro_trend_down: bool,
    pub exhaustion_up: bool,
    pub exhaustion_down: bool,
}

impl FeatureContext {
    /// Name of the first numeric field that is not finite.
    pub fn invalid_field(&self) -> Option<&'static str> {
        let fields = [
            ("price", self.price),
            ("atr", self.atr),
            ("emaFast", self.ema_fast),
            ("emaMid", self.ema_mid),
            ("emaSlow", self.ema_slow),
            ("emaFastSlope", self.ema_fast_slope),
            ("emaSlowSlope", self.ema_slow_slope),
            ("rsi", self.rsi),
            ("macdHistogram", self.macd_histogram),
            ("range", self.range),
            ("avgRange", self.avg_range),
            ("volume", self.volume),
            ("avgVolume", self.avg_volume),
            ("priorHigh", self.prior_high),
            ("priorLow", self.prior_low),
        ];
        fields
            .iter()
            .find(|(_, value)| !value.is_finite())
            .map(|(name, _)| *name)
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_field().is_none()
    }

    /// Latest range measured in ATRs (0 when ATR is not positive).
    pub fn range_atr(&self) -> f64 {
        if self.atr > 0.0 {
            self.range / self.atr
        } else {
            0.0
        }
    }

    /// Short-term direction from the fast EMA slope.
    pub fn micro_trend(&self, side: Side) -> bool {
        match side {
            Side::Long => self.micro_trend_up,
            Side::Short => self.micro_trend_down,
        }
    }

    /// Tags appended to signal reasons.
    pub fn context_tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        if self.compressed {
            tags.push("comp");
        }
        if self.vol_climax {
            tags.push("climax");
        }
        if self.exhaustion_up {
            tags.push("exu");
        }
        if self.exhaustion_down {
            tags.push("exd");
        }
        if self.htf_bias == HtfBias::Mixed {
            tags.push("htf_mixed");
        }
        tags
    }
}

/// Builds feature contexts with a fixed set of windows.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Derive the context for `primary`, with trends from `higher`.
    pub fn build(
        &self,
        primary: &Series,
        higher: &[(Timeframe, Series)],
    ) -> Result<FeatureContext> {
        let cfg = &self.config;
        let required = cfg.min_bars.max(2);
        if primary.len() < required {
            return Err(SignalError::InsufficientHistory {
                required,
                actual: primary.len(),
            });
        }

        let htf_trends = higher
            .iter()
            .map(|(timeframe, series)| self.higher_trend(*timeframe, series))
            .collect::<Result<Vec<_>>>()?;
        let htf_bias = HtfBias::from_trends(htf_trends.iter().map(|t| t.trend));

        let bars = primary.bars();
        let latest = match bars.last() {
            Some(bar) => *bar,
            None => {
                return Err(SignalError::InsufficientHistory {
                    required,
                    actual: 0,
                })
            }
        };
        let closes = primary.closes();

        let atr = Atr::new(cfg.atr_period).latest(bars);

        let fast = Ema::new(cfg.ema_fast).series(&closes);
        let mid = Ema::new(cfg.ema_mid).series(&closes);
        let slow = Ema::new(cfg.ema_slow).series(&closes);
        let ema_fast = fast.last().copied().unwrap_or(f64::NAN);
        let ema_mid = mid.last().copied().unwrap_or(f64::NAN);
        let ema_slow = slow.last().copied().unwrap_or(f64::NAN);
        let ema_fast_slope = slope(&fast, cfg.slope_lookback);
        let ema_slow_slope = slope(&slow, cfg.slope_lookback);

        let rsi = Rsi::new(cfg.rsi_period).latest(&closes);
        let macd_histogram = Macd::new(cfg.macd_fast, cfg.macd_slow, cfg.macd_signal)
            .latest(&closes)
            .map(|m| m.histogram)
            .unwrap_or(f64::NAN);

        // Windows longer than the history leave the averages undefined, which
        // invalidates the context rather than failing the build.
        let range = latest.range();
        let avg_range = Sma::new(cfg.range_window)
            .latest(&primary.ranges())
            .unwrap_or(f64::NAN);
        let compressed = range < cfg.compression_ratio * avg_range;

        let volume = latest.volume;
        let avg_volume = Sma::new(cfg.volume_window)
            .latest(&primary.volumes())
            .unwrap_or(f64::NAN);
        let vol_climax = volume > cfg.climax_ratio * avg_volume;

        let (prior_high, prior_low) = prior_extremes(bars, cfg.sweep_lookback);
        let sweep_margin = cfg.sweep_atr_mult * atr;
        let sweep_high = latest.high > prior_high + sweep_margin && latest.close < prior_high;
        let sweep_low = latest.low < prior_low - sweep_margin && latest.close > prior_low;

        Ok(FeatureContext {
            price: latest.close,
            atr,
            as_of: latest.timestamp,
            bars: bars.len(),
            ema_fast,
            ema_mid,
            ema_slow,
            ema_fast_slope,
            ema_slow_slope,
            rsi,
            macd_histogram,
            range,
            avg_range,
            compressed,
            volume,
            avg_volume,
            vol_climax,
            prior_high,
            prior_low,
            sweep_high,
            sweep_low,
            htf_trends,
            htf_bias,
            micro_trend_up: ema_fast_slope > 0.0,
            micro_trend_down: ema_fast_slope < 0.0,
            exhaustion_up: rsi > cfg.exhaustion_rsi_high && ema_fast_slope > 0.0,
            exhaustion_down: rsi < cfg.exhaustion_rsi_low && ema_fast_slope < 0.0,
        })
    }

    fn higher_trend(&self, timeframe: Timeframe, series: &Series) -> Result<HigherTrend> {
        let required = self.config.min_htf_bars;
        if series.len() < required || series.is_empty() {
            return Err(SignalError::InsufficientHistory {
                required: required.max(1),
                actual: series.len(),
            });
        }
        let closes = series.closes();
        let fast = Ema::new(self.config.htf_ema_fast).latest(&closes);
        let slow = Ema::new(self.config.htf_ema_slow).latest(&closes);
        let trend = match (fast, slow) {
            (Some(f), Some(s)) if f > s => Trend::Up,
            _ => Trend::Down,
        };
        Ok(HigherTrend { timeframe, trend })
    }
}

/// Latest value minus the value `lookback` positions earlier.
fn slope(values: &[f64], lookback: usize) -> f64 {
    let n = values.len();
    if lookback == 0 || n <= lookback {
        return f64::NAN;
    }
    values[n - 1] - values[n - 1 - lookback]
}

/// Highest high and lowest low of the `lookback` bars before the latest one.
fn prior_extremes(bars: &[PriceBar], lookback: usize) -> (f64, f64) {
    let end = bars.len().saturating_sub(1);
    let start = end.saturating_sub(lookback);
    let window = &bars[start..end];
    if window.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    (high, low)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bars(count: usize, price: f64, volume: f64) -> Vec<PriceBar> {
        (0..count)
            .map(|i| {
                PriceBar::new(
                    1_700_000_000_000 + i as i64 * 300_000,
                    price,
                    price + 0.5,
                    price - 0.5,
                    price,
                    volume,
                )
            })
            .collect()
    }

    fn rising_series(count: usize) -> Series {
        let bars = (0..count)
            .map(|i| {
                let base = 100.0 + i as f64;
                PriceBar::new(i as i64 * 60_000, base, base + 1.5, base - 0.5, base + 1.0, 10.0)
            })
            .collect();
        Series::new(bars).unwrap()
    }

    fn falling_series(count: usize) -> Series {
        let bars = (0..count)
            .map(|i| {
                let base = 300.0 - i as f64;
                PriceBar::new(i as i64 * 60_000, base, base + 0.5, base - 1.5, base - 1.0, 10.0)
            })
            .collect();
        Series::new(bars).unwrap()
    }

    #[test]
    fn test_insufficient_primary_history() {
        let builder = ContextBuilder::default();
        let series = Series::new(flat_bars(10, 100.0, 5.0)).unwrap();
        let err = builder.build(&series, &[]).unwrap_err();
        assert!(matches!(
            err,
            SignalError::InsufficientHistory {
                required: 60,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_insufficient_higher_history() {
        let builder = ContextBuilder::default();
        let primary = Series::new(flat_bars(80, 100.0, 5.0)).unwrap();
        let short = Series::new(flat_bars(12, 100.0, 5.0)).unwrap();
        let err = builder
            .build(&primary, &[(Timeframe::H1, short)])
            .unwrap_err();
        assert!(matches!(
            err,
            SignalError::InsufficientHistory {
                required: 30,
                actual: 12
            }
        ));
    }

    #[test]
    fn test_flat_market_context() {
        let builder = ContextBuilder::default();
        let series = Series::new(flat_bars(80, 100.0, 5.0)).unwrap();
        let ctx = builder.build(&series, &[]).unwrap();

        assert!(ctx.is_valid());
        assert_eq!(ctx.price, 100.0);
        assert_eq!(ctx.bars, 80);
        assert!((ctx.atr - 1.0).abs() < 1e-9);
        assert_eq!(ctx.rsi, 50.0);
        assert!(!ctx.compressed);
        assert!(!ctx.vol_climax);
        assert!(!ctx.sweep_high && !ctx.sweep_low);
        assert_eq!(ctx.htf_bias, HtfBias::Absent);
        assert!(ctx.context_tags().is_empty());
    }

    #[test]
    fn test_sweep_low_and_climax_detection() {
        let mut bars = flat_bars(80, 100.0, 5.0);
        let last = bars.len() - 1;
        // Wick 2 below the prior low (99.5), close back inside, double volume.
        bars[last] = PriceBar::new(bars[last].timestamp, 99.8, 100.2, 97.5, 100.0, 10.0);
        let ctx = ContextBuilder::default()
            .build(&Series::new(bars).unwrap(), &[])
            .unwrap();

        assert_eq!(ctx.prior_low, 99.5);
        assert!(ctx.sweep_low);
        assert!(!ctx.sweep_high);
        assert!(ctx.vol_climax);
        assert!(ctx.context_tags().contains(&"climax"));
    }

    #[test]
    fn test_compression_flag() {
        let mut bars = flat_bars(80, 100.0, 5.0);
        let last = bars.len() - 1;
        bars[last] = PriceBar::new(bars[last].timestamp, 100.0, 100.2, 99.9, 100.1, 5.0);
        let ctx = ContextBuilder::default()
            .build(&Series::new(bars).unwrap(), &[])
            .unwrap();
        assert!(ctx.compressed);
        assert!(ctx.context_tags().contains(&"comp"));
    }

    #[test]
    fn test_trend_features_and_htf_bias() {
        let builder = ContextBuilder::default();
        let ctx = builder
            .build(
                &rising_series(80),
                &[(Timeframe::H1, rising_series(40)), (Timeframe::H4, rising_series(40))],
            )
            .unwrap();

        assert!(ctx.ema_fast > ctx.ema_mid && ctx.ema_mid > ctx.ema_slow);
        assert!(ctx.ema_fast_slope > 0.0 && ctx.ema_slow_slope > 0.0);
        assert!(ctx.micro_trend_up && !ctx.micro_trend_down);
        assert!(ctx.micro_trend(Side::Long));
        assert_eq!(ctx.htf_bias, HtfBias::Up);
        assert!(ctx.exhaustion_up);

        let mixed = builder
            .build(
                &rising_series(80),
                &[(Timeframe::H1, rising_series(40)), (Timeframe::H4, falling_series(40))],
            )
            .unwrap();
        assert_eq!(mixed.htf_bias, HtfBias::Mixed);
        assert_eq!(mixed.htf_trends[1].trend, Trend::Down);
    }

    #[test]
    fn test_context_is_pure() {
        let builder = ContextBuilder::default();
        let primary = rising_series(90);
        let higher = vec![(Timeframe::H1, falling_series(35))];
        let a = builder.build(&primary, &higher).unwrap();
        let b = builder.build(&primary, &higher).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_window_longer_than_history_invalidates() {
        let config = ContextConfig {
            min_bars: 10,
            volume_window: 30,
            ..Default::default()
        };
        let series = Series::new(flat_bars(20, 100.0, 5.0)).unwrap();
        let ctx = ContextBuilder::new(config).build(&series, &[]).unwrap();
        assert!(!ctx.is_valid());
        assert_eq!(ctx.invalid_field(), Some("avgVolume"));
    }
}
