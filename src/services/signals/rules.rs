//! Volatility gate and the ordered rule cascade.

use crate::config::RuleThresholds;
use crate::services::signals::context::FeatureContext;
use crate::types::{Candidate, HtfBias, NoTradeReason, RuleKind, Side};

/// A single candidate-producing rule.
///
/// Rules are pure predicates over a feature context; the classifier tries
/// them in order and keeps the first match.
pub trait Rule: Send + Sync {
    fn kind(&self) -> RuleKind;

    /// Return a candidate when the rule's conditions hold.
    fn evaluate(&self, ctx: &FeatureContext, th: &RuleThresholds) -> Option<Candidate>;
}

/// Rejects bars whose range is abnormally small or large relative to ATR.
pub struct VolatilityGate;

impl VolatilityGate {
    /// `Some(reason)` when the context must not be traded.
    pub fn check(ctx: &FeatureContext, th: &RuleThresholds) -> Option<NoTradeReason> {
        let blocked = ctx.atr <= 0.0
            || ctx.range < th.gate_min_atr_mult * ctx.atr
            || ctx.range > th.gate_max_atr_mult * ctx.atr;
        if blocked {
            Some(NoTradeReason::VolatilityGate {
                range_atr: ctx.range_atr(),
            })
        } else {
            None
        }
    }
}

/// Liquidity sweep against a volume climax with stretched RSI.
pub struct ReversalRule;

impl Rule for ReversalRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Reversal
    }

    fn evaluate(&self, ctx: &FeatureContext, th: &RuleThresholds) -> Option<Candidate> {
        if !ctx.vol_climax {
            return None;
        }
        let (side, tag) = if ctx.sweep_low && ctx.rsi < th.reversal_long_rsi_max {
            (Side::Long, "sweep_low")
        } else if ctx.sweep_high && ctx.rsi > th.reversal_short_rsi_min {
            (Side::Short, "sweep_high")
        } else {
            return None;
        };

        let mut confidence = th.reversal_base;
        if ctx.compressed {
            confidence += th.reversal_compression_bonus;
        }
        if ctx.htf_bias.agrees(side) {
            confidence += th.reversal_htf_bonus;
        }

        Some(Candidate::new(
            side,
            confidence,
            self.kind(),
            format!(
                "{} rsi={:.1} vol={:.1}x",
                tag,
                ctx.rsi,
                ctx.volume / ctx.avg_volume
            ),
        ))
    }
}

/// Trade with an established short-term trend.
pub struct TrendContinuationRule;

impl Rule for TrendContinuationRule {
    fn kind(&self) -> RuleKind {
        RuleKind::TrendContinuation
    }

    fn evaluate(&self, ctx: &FeatureContext, th: &RuleThresholds) -> Option<Candidate> {
        let long = ctx.ema_fast > ctx.ema_mid
            && ctx.htf_bias.permits(Side::Long)
            && th.trend_long_rsi.contains(ctx.rsi)
            && ctx.ema_fast_slope > 0.0;
        let short = ctx.ema_fast < ctx.ema_mid
            && ctx.htf_bias.permits(Side::Short)
            && th.trend_short_rsi.contains(ctx.rsi)
            && ctx.ema_fast_slope < 0.0;

        let side = match (long, short) {
            (true, _) => Side::Long,
            (_, true) => Side::Short,
            _ => return None,
        };

        let aligned = match side {
            Side::Long => ctx.ema_mid > ctx.ema_slow,
            Side::Short => ctx.ema_mid < ctx.ema_slow,
        };

        let mut confidence = th.trend_base;
        if ctx.htf_bias.agrees(side) {
            confidence += th.trend_htf_bonus;
        }
        if aligned {
            confidence += th.trend_alignment_bonus;
        }

        Some(Candidate::new(
            side,
            confidence,
            self.kind(),
            format!(
                "ema_stack{} rsi={:.1}",
                if aligned { "_full" } else { "" },
                ctx.rsi
            ),
        ))
    }
}

/// Price pulled back between the fast and mid EMA inside a trend.
pub struct PullbackRule;

impl Rule for PullbackRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Pullback
    }

    fn evaluate(&self, ctx: &FeatureContext, th: &RuleThresholds) -> Option<Candidate> {
        let long = ctx.ema_fast > ctx.ema_mid
            && ctx.price >= ctx.ema_mid
            && ctx.price <= ctx.ema_fast
            && ctx.htf_bias.permits(Side::Long)
            && th.pullback_long_rsi.contains(ctx.rsi);
        let short = ctx.ema_fast < ctx.ema_mid
            && ctx.price <= ctx.ema_mid
            && ctx.price >= ctx.ema_fast
            && ctx.htf_bias.permits(Side::Short)
            && th.pullback_short_rsi.contains(ctx.rsi);

        let side = match (long, short) {
            (true, _) => Side::Long,
            (_, true) => Side::Short,
            _ => return None,
        };

        let mut confidence = th.pullback_base;
        if ctx.htf_bias.agrees(side) {
            confidence += th.pullback_htf_bonus;
        }

        Some(Candidate::new(
            side,
            confidence,
            self.kind(),
            format!("ema_pullback rsi={:.1}", ctx.rsi),
        ))
    }
}

/// Counter-trend entry when momentum turns at an RSI extreme.
pub struct ExhaustionRule;

impl ExhaustionRule {
    /// Whether the higher trend still points the opposite way of `side`.
    fn higher_trend_against(ctx: &FeatureContext, side: Side) -> bool {
        match ctx.htf_bias {
            HtfBias::Absent => match side {
                Side::Long => ctx.ema_slow_slope < 0.0,
                Side::Short => ctx.ema_slow_slope > 0.0,
            },
            bias => bias.agrees(side.opposite()),
        }
    }
}

impl Rule for ExhaustionRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Exhaustion
    }

    fn evaluate(&self, ctx: &FeatureContext, th: &RuleThresholds) -> Option<Candidate> {
        let long = ctx.rsi < th.exhaustion_long_rsi_max
            && Self::higher_trend_against(ctx, Side::Long)
            && ctx.ema_fast_slope > 0.0;
        let short = ctx.rsi > th.exhaustion_short_rsi_min
            && Self::higher_trend_against(ctx, Side::Short)
            && ctx.ema_fast_slope < 0.0;

        let side = match (long, short) {
            (true, _) => Side::Long,
            (_, true) => Side::Short,
            _ => return None,
        };

        let deep = match side {
            Side::Long => ctx.rsi < th.exhaustion_deep_low,
            Side::Short => ctx.rsi > th.exhaustion_deep_high,
        };

        let mut confidence = th.exhaustion_base;
        if deep {
            confidence += th.exhaustion_deep_bonus;
        }

        Some(Candidate::new(
            side,
            confidence,
            self.kind(),
            format!("exhaustion{} rsi={:.1}", if deep { "_deep" } else { "" }, ctx.rsi),
        ))
    }
}

/// Rules in evaluation order.
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ReversalRule),
        Box::new(TrendContinuationRule),
        Box::new(PullbackRule),
        Box::new(ExhaustionRule),
    ]
}
