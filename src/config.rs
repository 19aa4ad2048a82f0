use crate::types::Timeframe;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use tracing::warn;

/// Read and parse an environment variable, falling back to `default`.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Comma separated list, empty entries dropped.
fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|s| {
        s.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

/// Finite, ordered confidence band inside [0, 1].
///
/// Non-finite bounds fall back to `default`; reversed bounds are swapped.
fn confidence_band(name: &str, min: f64, max: f64, default: (f64, f64)) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        warn!(
            "{} confidence band [{}, {}] is not finite, using [{}, {}]",
            name, min, max, default.0, default.1
        );
        return default;
    }
    let (min, max) = (min.clamp(0.0, 1.0), max.clamp(0.0, 1.0));
    if min > max {
        warn!("{} confidence band [{}, {}] is reversed, swapping", name, min, max);
        (max, min)
    } else {
        (min, max)
    }
}

/// Windows and multipliers used when deriving a feature context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
    /// Minimum bars on the primary timeframe.
    pub min_bars: usize,
    /// Minimum bars on each higher timeframe.
    pub min_htf_bars: usize,
    pub ema_fast: usize,
    pub ema_mid: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Bars between the two EMA samples used for slopes.
    pub slope_lookback: usize,
    /// Window of the average bar range.
    pub range_window: usize,
    /// Window of the average volume.
    pub volume_window: usize,
    /// Prior bars inspected for liquidity sweeps.
    pub sweep_lookback: usize,
    /// How far past the prior extreme (in ATRs) a wick must reach.
    pub sweep_atr_mult: f64,
    /// Range below this fraction of the average marks compression.
    pub compression_ratio: f64,
    /// Volume above this multiple of the average marks a climax.
    pub climax_ratio: f64,
    pub htf_ema_fast: usize,
    pub htf_ema_slow: usize,
    /// RSI above which a rising market is flagged as exhausted.
    pub exhaustion_rsi_high: f64,
    /// RSI below which a falling market is flagged as exhausted.
    pub exhaustion_rsi_low: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            min_bars: 60,
            min_htf_bars: 30,
            ema_fast: 9,
            ema_mid: 21,
            ema_slow: 50,
            rsi_period: 14,
            atr_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            slope_lookback: 5,
            range_window: 20,
            volume_window: 30,
            sweep_lookback: 19,
            sweep_atr_mult: 0.2,
            compression_ratio: 0.7,
            climax_ratio: 1.5,
            htf_ema_fast: 9,
            htf_ema_slow: 21,
            exhaustion_rsi_high: 72.0,
            exhaustion_rsi_low: 28.0,
        }
    }
}

/// Inclusive RSI interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiBand {
    pub min: f64,
    pub max: f64,
}

impl RsiBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, rsi: f64) -> bool {
        rsi >= self.min && rsi <= self.max
    }
}

/// Volatility gate bounds and per-rule thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleThresholds {
    /// Latest range must be at least this many ATRs.
    pub gate_min_atr_mult: f64,
    /// Latest range must be at most this many ATRs.
    pub gate_max_atr_mult: f64,

    pub reversal_long_rsi_max: f64,
    pub reversal_short_rsi_min: f64,
    pub reversal_base: f64,
    pub reversal_compression_bonus: f64,
    pub reversal_htf_bonus: f64,

    pub trend_long_rsi: RsiBand,
    pub trend_short_rsi: RsiBand,
    pub trend_base: f64,
    pub trend_htf_bonus: f64,
    /// Added when the mid EMA is also on the right side of the slow EMA.
    pub trend_alignment_bonus: f64,

    pub pullback_long_rsi: RsiBand,
    pub pullback_short_rsi: RsiBand,
    pub pullback_base: f64,
    pub pullback_htf_bonus: f64,

    pub exhaustion_long_rsi_max: f64,
    pub exhaustion_short_rsi_min: f64,
    pub exhaustion_deep_low: f64,
    pub exhaustion_deep_high: f64,
    pub exhaustion_base: f64,
    pub exhaustion_deep_bonus: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            gate_min_atr_mult: 0.3,
            gate_max_atr_mult: 3.5,

            reversal_long_rsi_max: 35.0,
            reversal_short_rsi_min: 65.0,
            reversal_base: 0.58,
            reversal_compression_bonus: 0.05,
            reversal_htf_bonus: 0.04,

            trend_long_rsi: RsiBand::new(45.0, 78.0),
            trend_short_rsi: RsiBand::new(22.0, 55.0),
            trend_base: 0.50,
            trend_htf_bonus: 0.02,
            trend_alignment_bonus: 0.08,

            pullback_long_rsi: RsiBand::new(35.0, 60.0),
            pullback_short_rsi: RsiBand::new(40.0, 65.0),
            pullback_base: 0.52,
            pullback_htf_bonus: 0.03,

            exhaustion_long_rsi_max: 28.0,
            exhaustion_short_rsi_min: 72.0,
            exhaustion_deep_low: 20.0,
            exhaustion_deep_high: 80.0,
            exhaustion_base: 0.55,
            exhaustion_deep_bonus: 0.03,
        }
    }
}

/// Logistic recalibration `1 / (1 + e^-(slope * raw - offset))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidCalibration {
    pub slope: f64,
    pub offset: f64,
}

impl Default for SigmoidCalibration {
    fn default() -> Self {
        Self {
            slope: 9.0,
            offset: 6.2,
        }
    }
}

/// Nudges confidence by the instrument's historical win rate once enough
/// outcomes have been reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinRateAdaptation {
    pub min_outcomes: u32,
    /// Win rate above which confidence is raised.
    pub high_win_rate: f64,
    /// Win rate below which confidence is lowered.
    pub low_win_rate: f64,
    pub step: f64,
}

impl Default for WinRateAdaptation {
    fn default() -> Self {
        Self {
            min_outcomes: 40,
            high_win_rate: 0.60,
            low_win_rate: 0.45,
            step: 0.02,
        }
    }
}

/// Confidence band, streak adjustment and risk levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjusterConfig {
    pub min_confidence: f64,
    pub max_confidence: f64,
    /// Absolute streak length that triggers an adjustment.
    pub streak_threshold: i32,
    pub streak_step: f64,
    pub stop_atr_mult: f64,
    pub take_atr_base: f64,
    /// Applied to the base confidence before any other adjustment.
    pub calibration: Option<SigmoidCalibration>,
    pub win_rate: Option<WinRateAdaptation>,
}

impl Default for AdjusterConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.45,
            max_confidence: 0.95,
            streak_threshold: 2,
            streak_step: 0.03,
            stop_atr_mult: 1.2,
            take_atr_base: 2.0,
            calibration: None,
            win_rate: None,
        }
    }
}

impl AdjusterConfig {
    /// Copy with a usable confidence band.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        (self.min_confidence, self.max_confidence) = confidence_band(
            "adjuster",
            self.min_confidence,
            self.max_confidence,
            (defaults.min_confidence, defaults.max_confidence),
        );
        self
    }
}

/// Linear-regression horizon forecaster. Disabled when `horizon` is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastConfig {
    /// Number of bars ahead to project.
    pub horizon: usize,
    /// Closes used to fit the regression line.
    pub lookback: usize,
    /// Minimum projected move, as a fraction of price.
    pub min_move_pct: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 0,
            lookback: 50,
            min_move_pct: 0.002,
            min_confidence: 0.50,
            max_confidence: 0.70,
        }
    }
}

impl ForecastConfig {
    pub fn is_enabled(&self) -> bool {
        self.horizon > 0 && self.lookback >= 2
    }

    /// Copy with a usable confidence band.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        (self.min_confidence, self.max_confidence) = confidence_band(
            "forecast",
            self.min_confidence,
            self.max_confidence,
            (defaults.min_confidence, defaults.max_confidence),
        );
        self
    }
}

/// Everything the per-instrument pipeline needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub context: ContextConfig,
    pub thresholds: RuleThresholds,
    pub adjuster: AdjusterConfig,
    pub forecast: ForecastConfig,
    /// Minimum gap between accepted signals for one (instrument, side).
    pub cooldown_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context: ContextConfig::default(),
            thresholds: RuleThresholds::default(),
            adjuster: AdjusterConfig::default(),
            forecast: ForecastConfig::default(),
            cooldown_ms: 3 * 60 * 1000,
        }
    }
}

/// Fan-out settings for a batch scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    pub primary_timeframe: Timeframe,
    pub higher_timeframes: Vec<Timeframe>,
    /// Bars requested per timeframe.
    pub candle_count: usize,
    pub max_concurrency: usize,
    pub fetch_timeout_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            primary_timeframe: Timeframe::M5,
            higher_timeframes: vec![Timeframe::H1],
            candle_count: 150,
            max_concurrency: 20,
            fetch_timeout_ms: 10_000,
        }
    }
}

/// Data source and scan loop settings for the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub binance_api_url: String,
    /// Fixed instrument list. Empty means ask the universe for the top movers.
    pub instruments: Vec<String>,
    pub universe_limit: usize,
    pub scan_interval_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            binance_api_url: "https://api.binance.com/api/v3".to_string(),
            instruments: Vec::new(),
            universe_limit: 50,
            scan_interval_secs: 60,
        }
    }
}

/// Position sizing for logged signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskConfig {
    /// Account balance in quote currency. Sizing is skipped when unset.
    pub account_balance: Option<f64>,
    /// Fraction of the balance risked between entry and stop.
    pub risk_per_trade: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_balance: None,
            risk_per_trade: 0.005,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub engine: EngineConfig,
    pub batch: BatchConfig,
    pub source: SourceConfig,
    pub risk: RiskConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let engine_defaults = EngineConfig::default();
        let batch_defaults = BatchConfig::default();
        let source_defaults = SourceConfig::default();

        let mut context = engine_defaults.context.clone();
        context.min_bars = env_or("MIN_BARS", context.min_bars);

        let mut thresholds = engine_defaults.thresholds.clone();
        thresholds.gate_min_atr_mult = env_or("GATE_MIN_ATR_MULT", thresholds.gate_min_atr_mult);
        thresholds.gate_max_atr_mult = env_or("GATE_MAX_ATR_MULT", thresholds.gate_max_atr_mult);

        let mut adjuster = engine_defaults.adjuster.clone();
        adjuster.min_confidence = env_or("MIN_CONFIDENCE", adjuster.min_confidence);
        adjuster.max_confidence = env_or("MAX_CONFIDENCE", adjuster.max_confidence);
        if env_or("CALIBRATE_CONFIDENCE", false) {
            adjuster.calibration = Some(SigmoidCalibration::default());
        }
        if env_or("ADAPT_WIN_RATE", false) {
            adjuster.win_rate = Some(WinRateAdaptation::default());
        }

        let mut forecast = engine_defaults.forecast.clone();
        forecast.horizon = env_or("FORECAST_HORIZON", forecast.horizon);

        let primary_timeframe = env::var("PRIMARY_TIMEFRAME")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(batch_defaults.primary_timeframe);

        // Format: "1h,4h"; unknown entries are ignored
        let higher_timeframes = env_list("HIGHER_TIMEFRAMES")
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.parse().ok())
                    .collect()
            })
            .unwrap_or(batch_defaults.higher_timeframes);

        let instruments = env_list("INSTRUMENTS")
            .map(|items| items.into_iter().map(|s| s.to_uppercase()).collect())
            .unwrap_or_default();

        Self {
            engine: EngineConfig {
                context,
                thresholds,
                adjuster: adjuster.sanitized(),
                forecast: forecast.sanitized(),
                cooldown_ms: env_or("COOLDOWN_MS", engine_defaults.cooldown_ms),
            },
            batch: BatchConfig {
                primary_timeframe,
                higher_timeframes,
                candle_count: env_or("CANDLE_COUNT", batch_defaults.candle_count),
                max_concurrency: env_or("MAX_CONCURRENCY", batch_defaults.max_concurrency).max(1),
                fetch_timeout_ms: env_or("FETCH_TIMEOUT_MS", batch_defaults.fetch_timeout_ms),
            },
            source: SourceConfig {
                binance_api_url: env::var("BINANCE_API_URL")
                    .unwrap_or(source_defaults.binance_api_url),
                instruments,
                universe_limit: env_or("UNIVERSE_LIMIT", source_defaults.universe_limit),
                scan_interval_secs: env_or(
                    "SCAN_INTERVAL_SECS",
                    source_defaults.scan_interval_secs,
                ),
            },
            risk: RiskConfig {
                account_balance: env::var("ACCOUNT_BALANCE")
                    .ok()
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .filter(|b| b.is_finite() && *b > 0.0),
                risk_per_trade: env_or("RISK_PER_TRADE", RiskConfig::default().risk_per_trade),
            },
        }
    }
}
