pub mod signals;

pub use signals::{
    BatchScanner, ConfidenceAdjuster, ContextBuilder, CooldownGate, Evaluation, FeatureContext,
    OutcomeStats, SignalClassifier, SignalEngine, StreakStore,
};
