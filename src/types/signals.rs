use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an EMA(9)/EMA(21) pair on one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn side(&self) -> Side {
        match self {
            Trend::Up => Side::Long,
            Trend::Down => Side::Short,
        }
    }
}

/// Summary of all higher-timeframe trends for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtfBias {
    /// No higher-timeframe input was supplied.
    Absent,
    Up,
    Down,
    /// Higher timeframes disagree with each other.
    Mixed,
}

impl HtfBias {
    /// Combine per-timeframe trends.
    pub fn from_trends<I: IntoIterator<Item = Trend>>(trends: I) -> Self {
        let mut bias = HtfBias::Absent;
        for trend in trends {
            bias = match (bias, trend) {
                (HtfBias::Absent, Trend::Up) | (HtfBias::Up, Trend::Up) => HtfBias::Up,
                (HtfBias::Absent, Trend::Down) | (HtfBias::Down, Trend::Down) => HtfBias::Down,
                _ => HtfBias::Mixed,
            };
        }
        bias
    }

    /// Higher timeframes explicitly point the same way as `side`.
    pub fn agrees(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (HtfBias::Up, Side::Long) | (HtfBias::Down, Side::Short)
        )
    }

    /// Higher timeframes do not contradict `side` (agreement or no input).
    pub fn permits(&self, side: Side) -> bool {
        *self == HtfBias::Absent || self.agrees(side)
    }
}

/// Which generator produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Reversal,
    TrendContinuation,
    Pullback,
    Exhaustion,
    Forecast,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Reversal => "reversal",
            RuleKind::TrendContinuation => "trend",
            RuleKind::Pullback => "pullback",
            RuleKind::Exhaustion => "exhaustion",
            RuleKind::Forecast => "forecast",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proposed trade before confidence adjustment and cooldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub side: Side,
    /// Confidence assigned by the rule, in (0, 1).
    pub base_confidence: f64,
    pub rule: RuleKind,
    /// Short tag describing the conditions that fired.
    pub reason: String,
    /// Forecast step this candidate refers to (multi-horizon generators only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon: Option<usize>,
}

impl Candidate {
    pub fn new(side: Side, base_confidence: f64, rule: RuleKind, reason: impl Into<String>) -> Self {
        Self {
            side,
            base_confidence,
            rule,
            reason: reason.into(),
            horizon: None,
        }
    }

    pub fn with_horizon(mut self, step: usize) -> Self {
        self.horizon = Some(step);
        self
    }
}

/// Why an evaluation produced no candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoTradeReason {
    /// A required feature was missing or non-finite.
    InvalidContext { field: String },
    /// Latest bar range was outside the allowed ATR band.
    VolatilityGate { range_atr: f64 },
    /// Every rule was tried and none matched.
    NoRuleMatched,
}

impl fmt::Display for NoTradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoTradeReason::InvalidContext { field } => write!(f, "invalid context ({})", field),
            NoTradeReason::VolatilityGate { range_atr } => {
                write!(f, "volatility gate (range {:.2}x ATR)", range_atr)
            }
            NoTradeReason::NoRuleMatched => f.write_str("no rule matched"),
        }
    }
}

/// Outcome of classifying one feature context.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Trade(Candidate),
    NoTrade(NoTradeReason),
}

impl Decision {
    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            Decision::Trade(c) => Some(c),
            Decision::NoTrade(_) => None,
        }
    }

    pub fn is_trade(&self) -> bool {
        matches!(self, Decision::Trade(_))
    }
}

/// An emitted trading signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: Uuid,
    pub instrument: String,
    pub side: Side,
    /// Adjusted confidence, clamped to the configured band.
    pub confidence: f64,
    pub entry_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_price: Option<f64>,
    pub rule: RuleKind,
    pub reason: String,
    /// Unix timestamp (milliseconds) when generated.
    pub generated_at: i64,
}

impl Signal {
    /// Confidence bucket label used in notifications.
    pub fn grade(&self) -> &'static str {
        if self.confidence >= 0.70 {
            "strong"
        } else if self.confidence >= 0.55 {
            "medium"
        } else {
            "weak"
        }
    }

    /// Units to trade so that hitting the stop loses `balance * risk_pct`.
    ///
    /// None without a stop, with a zero entry/stop distance, or when either
    /// input is not positive.
    pub fn position_size(&self, balance: f64, risk_pct: f64) -> Option<f64> {
        let stop = self.stop_price?;
        let distance = (self.entry_price - stop).abs();
        if !(distance > 0.0 && balance > 0.0 && risk_pct > 0.0) {
            return None;
        }
        let size = balance * risk_pct / distance;
        size.is_finite().then_some(size)
    }
}

/// Why an instrument contributed nothing to a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Candle source failed, timed out, or returned a malformed series.
    Retrieval { message: String },
    InsufficientHistory { required: usize, actual: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Retrieval { message } => write!(f, "retrieval: {}", message),
            SkipReason::InsufficientHistory { required, actual } => {
                write!(f, "insufficient history ({} of {} bars)", actual, required)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedInstrument {
    pub instrument: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoTradeInstrument {
    pub instrument: String,
    pub reason: NoTradeReason,
}

/// Result of one batch scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Accepted signals, highest confidence first.
    pub signals: Vec<Signal>,
    /// Instruments that failed before classification.
    pub skipped: Vec<SkippedInstrument>,
    /// Instruments that were classified as NO_TRADE.
    pub no_trade: Vec<NoTradeInstrument>,
    /// Signals rejected by the cooldown gate.
    pub suppressed: Vec<Signal>,
    /// Number of instruments scanned.
    pub instruments: usize,
    pub started_at: i64,
    pub finished_at: i64,
}
