//! Confidence adjustment and risk levels.

use crate::config::{AdjusterConfig, SigmoidCalibration};
use crate::services::signals::context::FeatureContext;
use crate::services::signals::streak::OutcomeStats;
use crate::types::{Candidate, Signal};
use uuid::Uuid;

/// Turns a candidate into a signal.
///
/// Stages, in order: optional sigmoid calibration of the base confidence,
/// streak bias, optional win-rate adaptation, clamp to the band, then
/// ATR stop and take levels.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceAdjuster {
    config: AdjusterConfig,
}

impl SigmoidCalibration {
    /// Map a raw confidence (clamped to [0, 1]) through the logistic curve.
    pub fn apply(&self, raw: f64) -> f64 {
        let raw = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
        1.0 / (1.0 + (-(self.slope * raw - self.offset)).exp())
    }
}

impl ConfidenceAdjuster {
    pub fn new(config: AdjusterConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &AdjusterConfig {
        &self.config
    }

    /// Confidence delta for a signed win/loss streak.
    pub fn streak_adjustment(&self, streak: i32) -> f64 {
        let threshold = self.config.streak_threshold.max(1);
        if streak >= threshold {
            self.config.streak_step
        } else if streak <= -threshold {
            -self.config.streak_step
        } else {
            0.0
        }
    }

    /// Confidence delta from the historical win rate. Zero while adaptation
    /// is off or fewer than `min_outcomes` are recorded.
    pub fn win_rate_adjustment(&self, outcomes: &OutcomeStats) -> f64 {
        let Some(adaptation) = self.config.win_rate else {
            return 0.0;
        };
        if outcomes.total() < adaptation.min_outcomes {
            return 0.0;
        }
        match outcomes.win_rate() {
            Some(rate) if rate > adaptation.high_win_rate => adaptation.step,
            Some(rate) if rate < adaptation.low_win_rate => -adaptation.step,
            _ => 0.0,
        }
    }

    pub fn clamp(&self, confidence: f64) -> f64 {
        confidence.clamp(self.config.min_confidence, self.config.max_confidence)
    }

    pub fn adjust(
        &self,
        instrument: &str,
        candidate: &Candidate,
        ctx: &FeatureContext,
        outcomes: &OutcomeStats,
        now_ms: i64,
    ) -> Signal {
        let base = match &self.config.calibration {
            Some(calibration) => calibration.apply(candidate.base_confidence),
            None => candidate.base_confidence,
        };
        let confidence = self.clamp(
            base + self.streak_adjustment(outcomes.streak) + self.win_rate_adjustment(outcomes),
        );
        let price = ctx.price;
        let sign = candidate.side.sign();

        let (stop_price, take_price) = if ctx.atr > 0.0 {
            let stop = price - sign * self.config.stop_atr_mult * ctx.atr;
            let take = price + sign * (self.config.take_atr_base + (confidence - 0.5)) * ctx.atr;
            (Some(stop), Some(take))
        } else {
            (None, None)
        };

        let tags = ctx.context_tags();
        let reason = if tags.is_empty() {
            candidate.reason.clone()
        } else {
            format!("{}|ctx:{}", candidate.reason, tags.join(","))
        };

        Signal {
            id: Uuid::new_v4(),
            instrument: instrument.to_uppercase(),
            side: candidate.side,
            confidence,
            entry_price: price,
            stop_price,
            take_price,
            rule: candidate.rule,
            reason,
            generated_at: now_ms,
        }
    }
}
