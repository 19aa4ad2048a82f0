//! Signal classifier: gate, then first matching rule.

use crate::config::RuleThresholds;
use crate::services::signals::context::FeatureContext;
use crate::services::signals::rules::{default_rules, Rule, VolatilityGate};
use crate::types::{Decision, NoTradeReason};
use tracing::debug;

pub struct SignalClassifier {
    rules: Vec<Box<dyn Rule>>,
    thresholds: RuleThresholds,
}

impl SignalClassifier {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self::with_rules(thresholds, default_rules())
    }

    /// Use a custom rule list, evaluated in the given order.
    pub fn with_rules(thresholds: RuleThresholds, rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules, thresholds }
    }

    /// Classify one context. Deterministic for a given context.
    pub fn classify(&self, ctx: &FeatureContext) -> Decision {
        if let Some(field) = ctx.invalid_field() {
            debug!("Context invalid: {} is not finite", field);
            return Decision::NoTrade(NoTradeReason::InvalidContext {
                field: field.to_string(),
            });
        }

        if let Some(reason) = VolatilityGate::check(ctx, &self.thresholds) {
            debug!(
                "Volatility gate: range {:.4} vs ATR {:.4}",
                ctx.range, ctx.atr
            );
            return Decision::NoTrade(reason);
        }

        for rule in &self.rules {
            if let Some(candidate) = rule.evaluate(ctx, &self.thresholds) {
                debug!(
                    "Rule {} matched: {} {:.2} ({})",
                    rule.kind(),
                    candidate.side,
                    candidate.base_confidence,
                    candidate.reason
                );
                return Decision::Trade(candidate);
            }
        }

        Decision::NoTrade(NoTradeReason::NoRuleMatched)
    }
}

impl Default for SignalClassifier {
    fn default() -> Self {
        Self::new(RuleThresholds::default())
    }
}
