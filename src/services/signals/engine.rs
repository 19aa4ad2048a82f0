//! Per-instrument pipeline: context, classification, adjustment, cooldown.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::services::signals::adjuster::ConfidenceAdjuster;
use crate::services::signals::classifier::SignalClassifier;
use crate::services::signals::context::{ContextBuilder, FeatureContext};
use crate::services::signals::cooldown::CooldownGate;
use crate::services::signals::forecast::{CandidateGenerator, LinearForecaster};
use crate::services::signals::streak::StreakStore;
use crate::types::{Candidate, Decision, NoTradeReason, Series, Signal, Timeframe};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything one evaluation produced.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub instrument: String,
    pub context: FeatureContext,
    pub decision: Decision,
    /// Signals that passed the cooldown gate.
    pub signals: Vec<Signal>,
    /// Signals blocked by the cooldown gate.
    pub suppressed: Vec<Signal>,
}

impl Evaluation {
    /// NO_TRADE reason when nothing at all was proposed.
    pub fn no_trade_reason(&self) -> Option<&NoTradeReason> {
        match &self.decision {
            Decision::NoTrade(reason) if self.signals.is_empty() && self.suppressed.is_empty() => {
                Some(reason)
            }
            _ => None,
        }
    }
}

/// Owns the shared cooldown and streak state.
pub struct SignalEngine {
    builder: ContextBuilder,
    classifier: SignalClassifier,
    adjuster: ConfidenceAdjuster,
    generators: Vec<Box<dyn CandidateGenerator>>,
    cooldown: Arc<CooldownGate>,
    streaks: Arc<StreakStore>,
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        Self::with_state(config, StreakStore::new())
    }

    /// Build an engine that shares an existing streak store.
    pub fn with_state(config: EngineConfig, streaks: Arc<StreakStore>) -> Arc<Self> {
        let mut generators: Vec<Box<dyn CandidateGenerator>> = Vec::new();
        if config.forecast.is_enabled() {
            generators.push(Box::new(LinearForecaster::new(config.forecast.clone())));
        }

        Arc::new(Self {
            builder: ContextBuilder::new(config.context),
            classifier: SignalClassifier::new(config.thresholds),
            adjuster: ConfidenceAdjuster::new(config.adjuster),
            generators,
            cooldown: CooldownGate::new(config.cooldown_ms),
            streaks,
        })
    }

    /// Outcome reporter entry point.
    pub fn register_outcome(&self, instrument: &str, won: bool) -> i32 {
        self.streaks.register_outcome(instrument, won)
    }

    /// Candidates for a context, rule match first then generators.
    fn candidates(&self, primary: &Series, ctx: &FeatureContext, decision: &Decision) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let run_generators = match decision {
            Decision::Trade(candidate) => {
                candidates.push(candidate.clone());
                true
            }
            Decision::NoTrade(NoTradeReason::NoRuleMatched) => true,
            Decision::NoTrade(_) => false,
        };
        if run_generators {
            for generator in &self.generators {
                let extra = generator.generate(primary, ctx);
                if !extra.is_empty() {
                    debug!("{} proposed {} candidates", generator.name(), extra.len());
                }
                candidates.extend(extra);
            }
        }
        candidates
    }

    /// Run the full pipeline for one instrument at `now_ms`.
    pub fn evaluate(
        &self,
        instrument: &str,
        primary: &Series,
        higher: &[(Timeframe, Series)],
        now_ms: i64,
    ) -> Result<Evaluation> {
        let instrument = instrument.to_uppercase();
        let context = self.builder.build(primary, higher)?;
        let decision = self.classifier.classify(&context);

        let outcomes = self.streaks.stats(&instrument);
        let mut signals = Vec::new();
        let mut suppressed = Vec::new();

        for candidate in self.candidates(primary, &context, &decision) {
            let signal = self
                .adjuster
                .adjust(&instrument, &candidate, &context, &outcomes, now_ms);
            if self.cooldown.try_acquire(&instrument, signal.side, now_ms) {
                info!(
                    "Signal {} {} {:.2} @ {} ({})",
                    signal.instrument, signal.side, signal.confidence, signal.entry_price, signal.reason
                );
                signals.push(signal);
            } else {
                debug!(
                    "Cooldown suppressed {} {} ({})",
                    signal.instrument, signal.side, signal.rule
                );
                suppressed.push(signal);
            }
        }

        if let Decision::NoTrade(reason) = &decision {
            debug!("{}: no trade, {}", instrument, reason);
        }

        Ok(Evaluation {
            instrument,
            context,
            decision,
            signals,
            suppressed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdjusterConfig, ForecastConfig, WinRateAdaptation};
    use crate::error::SignalError;
    use crate::types::{PriceBar, RuleKind, Side};

    /// Steady uptrend with alternating pullback bars, ending on a normal bar.
    fn trending_series(count: usize) -> Series {
        let bars = (0..count)
            .map(|i| {
                let drift = i as f64 * 0.4;
                let wiggle = if i % 3 == 2 { -0.6 } else { 0.3 };
                let close = 100.0 + drift + wiggle;
                let open = close - wiggle * 0.5;
                PriceBar::new(
                    1_700_000_000_000 + i as i64 * 300_000,
                    open,
                    open.max(close) + 0.4,
                    open.min(close) - 0.4,
                    close,
                    1000.0,
                )
            })
            .collect();
        Series::new(bars).unwrap()
    }

    #[test]
    fn test_insufficient_history_propagates() {
        let engine = SignalEngine::new(EngineConfig::default());
        let err = engine
            .evaluate("BTCUSDT", &trending_series(10), &[], 0)
            .unwrap_err();
        assert!(err.is_insufficient_history());
    }

    #[test]
    fn test_second_evaluation_suppressed() {
        let engine = SignalEngine::new(EngineConfig::default());
        let series = trending_series(120);

        let first = engine.evaluate("BTCUSDT", &series, &[], 1_000).unwrap();
        assert!(first.decision.is_trade(), "decision: {:?}", first.decision);
        assert_eq!(first.signals.len(), 1);

        let second = engine.evaluate("BTCUSDT", &series, &[], 61_000).unwrap();
        assert!(second.signals.is_empty());
        assert_eq!(second.suppressed.len(), 1);
        assert!(second.no_trade_reason().is_none());

        let later = engine.evaluate("BTCUSDT", &series, &[], 181_000).unwrap();
        assert_eq!(later.signals.len(), 1);
    }

    #[test]
    fn test_streak_raises_confidence() {
        let engine = SignalEngine::new(EngineConfig::default());
        let series = trending_series(120);
        let base = engine.evaluate("AAA", &series, &[], 0).unwrap().signals[0].confidence;

        engine.register_outcome("BBB", true);
        engine.register_outcome("BBB", true);
        let boosted = engine.evaluate("BBB", &series, &[], 0).unwrap().signals[0].confidence;
        assert!((boosted - base - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_win_rate_adaptation_uses_history() {
        let config = EngineConfig {
            adjuster: AdjusterConfig {
                win_rate: Some(WinRateAdaptation::default()),
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = SignalEngine::new(config);
        let series = trending_series(120);
        let base = engine.evaluate("AAA", &series, &[], 0).unwrap().signals[0].confidence;

        // 30 wins then 10 losses: losing streak of 10, win rate 0.75.
        for _ in 0..30 {
            engine.register_outcome("BBB", true);
        }
        for _ in 0..10 {
            engine.register_outcome("BBB", false);
        }
        let adapted = engine.evaluate("BBB", &series, &[], 0).unwrap().signals[0].confidence;
        assert!((adapted - (base - 0.03 + 0.02)).abs() < 1e-9);
    }

    #[test]
    fn test_forecast_candidates_follow_rule() {
        let config = EngineConfig {
            forecast: ForecastConfig {
                horizon: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = SignalEngine::new(config);
        let eval = engine
            .evaluate("ETHUSDT", &trending_series(120), &[], 0)
            .unwrap();

        let rule_signal = &eval.signals[0];
        assert_ne!(rule_signal.rule, RuleKind::Forecast);
        assert_eq!(rule_signal.side, Side::Long);
        // Forecast candidates share the side, so the gate holds them back.
        assert!(eval
            .suppressed
            .iter()
            .all(|s| s.rule == RuleKind::Forecast && s.side == Side::Long));
        assert!(!eval.suppressed.is_empty());
    }

    #[test]
    fn test_invalid_series_never_reaches_engine() {
        let bad = vec![PriceBar::new(1, 100.0, 99.0, 101.0, 100.0, 1.0)];
        assert!(matches!(Series::new(bad), Err(SignalError::InvalidSeries(_))));
    }
}
