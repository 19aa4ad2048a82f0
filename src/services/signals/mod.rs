//! Trading signal pipeline.
//!
//! Series math feeds a typed feature context, the classifier picks at most
//! one rule candidate, optional generators add more, and the adjuster and
//! cooldown gate turn candidates into emitted signals.

pub mod adjuster;
pub mod batch;
pub mod classifier;
pub mod context;
pub mod cooldown;
pub mod engine;
pub mod forecast;
pub mod indicators;
pub mod rules;
pub mod streak;

pub use adjuster::ConfidenceAdjuster;
pub use batch::BatchScanner;
pub use classifier::SignalClassifier;
pub use context::{ContextBuilder, FeatureContext, HigherTrend};
pub use cooldown::{CooldownGate, CooldownState};
pub use engine::{Evaluation, SignalEngine};
pub use forecast::{CandidateGenerator, LinearForecaster};
pub use rules::{default_rules, Rule, VolatilityGate};
pub use streak::{OutcomeStats, StreakStore};
