//! Signal pipeline tests
//!
//! End-to-end scenarios through the public API:
//! - Reversal, gate and insufficient-history outcomes
//! - Cooldown suppression across batch scans
//! - Failure isolation and global ranking in a batch

use omen::config::{BatchConfig, EngineConfig};
use omen::services::{BatchScanner, SignalEngine};
use omen::sources::MemoryCandleSource;
use omen::types::*;
use omen::SignalError;
use std::sync::Arc;

mod common {
    use omen::types::{PriceBar, Series};

    pub const START: i64 = 1_700_000_000_000;
    pub const STEP: i64 = 300_000;

    /// Steady uptrend that classifies as a trend continuation long.
    pub fn trending(count: usize) -> Series {
        let bars = (0..count)
            .map(|i| {
                let drift = i as f64 * 0.4;
                let wiggle = if i % 3 == 2 { -0.6 } else { 0.3 };
                let close = 100.0 + drift + wiggle;
                let open = close - wiggle * 0.5;
                PriceBar::new(
                    START + i as i64 * STEP,
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

    /// Choppy decline (two steps down, one up) ending in a low sweep on
    /// double volume that closes back above the prior low.
    pub fn low_sweep() -> Series {
        let mut bars = Vec::new();
        let mut close = 120.0;
        for i in 0..79 {
            let step = if i % 3 == 2 { 0.3 } else { -0.4 };
            let open = close;
            close += step;
            bars.push(PriceBar::new(
                START + i as i64 * STEP,
                open,
                open.max(close) + 0.2,
                open.min(close) - 0.2,
                close,
                100.0,
            ));
        }

        let prior_low = bars[60..79]
            .iter()
            .map(|b| b.low)
            .fold(f64::MAX, f64::min);
        let open = close;
        let sweep_close = prior_low + 0.05;
        bars.push(PriceBar::new(
            START + 79 * STEP,
            open,
            open.max(sweep_close) + 0.1,
            prior_low - 1.0,
            sweep_close,
            200.0,
        ));
        Series::new(bars).unwrap()
    }

    /// Quiet market whose last bar spans several ATRs.
    pub fn wide_last_bar() -> Series {
        let mut bars: Vec<PriceBar> = (0..79)
            .map(|i| PriceBar::new(START + i as i64 * STEP, 100.0, 100.5, 99.5, 100.0, 5.0))
            .collect();
        bars.push(PriceBar::new(START + 79 * STEP, 100.0, 105.0, 96.0, 101.0, 5.0));
        Series::new(bars).unwrap()
    }
}

fn primary_only() -> BatchConfig {
    BatchConfig {
        higher_timeframes: Vec::new(),
        fetch_timeout_ms: 1_000,
        ..Default::default()
    }
}

// =============================================================================
// Single-instrument scenarios
// =============================================================================

#[test]
fn test_low_sweep_reversal_long() {
    let engine = SignalEngine::new(EngineConfig::default());
    let eval = engine
        .evaluate("BTCUSDT", &common::low_sweep(), &[], 0)
        .unwrap();

    assert!(eval.context.sweep_low);
    assert!(eval.context.vol_climax);
    assert!(eval.context.rsi < 35.0);

    let signal = &eval.signals[0];
    assert_eq!(signal.rule, RuleKind::Reversal);
    assert_eq!(signal.side, Side::Long);
    assert!(signal.confidence >= 0.58);
    assert!(signal.stop_price.unwrap() < signal.entry_price);
    assert!(signal.take_price.unwrap() > signal.entry_price);
    assert!(signal.reason.contains("climax"));
}

#[test]
fn test_wide_bar_blocked_by_gate() {
    let engine = SignalEngine::new(EngineConfig::default());
    let eval = engine
        .evaluate("ETHUSDT", &common::wide_last_bar(), &[], 0)
        .unwrap();

    assert!(eval.signals.is_empty());
    assert!(eval.suppressed.is_empty());
    match eval.no_trade_reason() {
        Some(NoTradeReason::VolatilityGate { range_atr }) => assert!(*range_atr > 3.5),
        other => panic!("expected volatility gate, got {:?}", other),
    }
}

#[test]
fn test_short_history_is_an_error_not_a_panic() {
    let engine = SignalEngine::new(EngineConfig::default());
    let err = engine
        .evaluate("SOLUSDT", &common::trending(10), &[], 0)
        .unwrap_err();
    assert!(matches!(
        err,
        SignalError::InsufficientHistory {
            required: 60,
            actual: 10
        }
    ));
}

#[test]
fn test_higher_timeframe_disagreement_blocks_trend() {
    let engine = SignalEngine::new(EngineConfig::default());
    let falling: Vec<PriceBar> = (0..40)
        .map(|i| {
            let base = 300.0 - i as f64;
            PriceBar::new(
                common::START + i as i64 * 3_600_000,
                base,
                base + 0.5,
                base - 1.5,
                base - 1.0,
                10.0,
            )
        })
        .collect();
    let higher = vec![(Timeframe::H1, Series::new(falling).unwrap())];

    let eval = engine
        .evaluate("BTCUSDT", &common::trending(120), &higher, 0)
        .unwrap();
    assert_eq!(eval.context.htf_bias, HtfBias::Down);
    assert!(eval
        .signals
        .iter()
        .all(|s| s.rule != RuleKind::TrendContinuation));
}

// =============================================================================
// Batch scenarios
// =============================================================================

#[tokio::test]
async fn test_second_scan_within_cooldown_is_suppressed() {
    let source = MemoryCandleSource::new().with_series("BTCUSDT", Timeframe::M5, common::trending(120));
    let scanner = BatchScanner::new(
        SignalEngine::new(EngineConfig::default()),
        Arc::new(source),
        primary_only(),
    );
    let instruments = vec!["BTCUSDT".to_string()];

    let first = scanner.scan(&instruments).await;
    assert_eq!(first.signals.len(), 1);

    let second = scanner.scan(&instruments).await;
    assert!(second.signals.is_empty());
    assert_eq!(second.suppressed.len(), 1);
    assert_eq!(second.suppressed[0].side, first.signals[0].side);
}

#[tokio::test]
async fn test_failures_do_not_abort_batch() {
    let source = MemoryCandleSource::new()
        .with_series("AAAUSDT", Timeframe::M5, common::trending(120))
        .with_series("BBBUSDT", Timeframe::M5, common::trending(120))
        .with_failure("BBBUSDT", "connection reset")
        .with_series("CCCUSDT", Timeframe::M5, common::trending(10))
        .with_series("DDDUSDT", Timeframe::M5, common::trending(120));
    let scanner = BatchScanner::new(
        SignalEngine::new(EngineConfig::default()),
        Arc::new(source),
        primary_only(),
    );

    let instruments: Vec<String> = ["AAAUSDT", "BBBUSDT", "CCCUSDT", "DDDUSDT", "EEEUSDT"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let report = scanner.scan(&instruments).await;

    assert_eq!(report.instruments, 5);
    assert_eq!(report.signals.len(), 2);
    assert_eq!(report.skipped.len(), 3);

    let skipped: Vec<&str> = report
        .skipped
        .iter()
        .map(|s| s.instrument.as_str())
        .collect();
    assert_eq!(skipped, vec!["BBBUSDT", "CCCUSDT", "EEEUSDT"]);
    assert_eq!(
        report.skipped[1].reason,
        SkipReason::InsufficientHistory {
            required: 60,
            actual: 10
        }
    );
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::Retrieval { .. }
    ));
}

#[tokio::test]
async fn test_ranking_by_confidence_then_input_order() {
    let source = MemoryCandleSource::new()
        .with_series("AAAUSDT", Timeframe::M5, common::trending(120))
        .with_series("BBBUSDT", Timeframe::M5, common::trending(120))
        .with_series("CCCUSDT", Timeframe::M5, common::trending(120));
    let engine = SignalEngine::new(EngineConfig::default());
    engine.register_outcome("CCCUSDT", true);
    engine.register_outcome("CCCUSDT", true);

    let scanner = BatchScanner::new(engine, Arc::new(source), primary_only());
    let instruments: Vec<String> = ["AAAUSDT", "BBBUSDT", "CCCUSDT"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let report = scanner.scan(&instruments).await;

    let order: Vec<&str> = report
        .signals
        .iter()
        .map(|s| s.instrument.as_str())
        .collect();
    assert_eq!(order, vec!["CCCUSDT", "AAAUSDT", "BBBUSDT"]);
    assert!(report.signals[0].confidence > report.signals[1].confidence);
    assert_eq!(report.signals[1].confidence, report.signals[2].confidence);
}

#[tokio::test]
async fn test_report_serializes_camel_case() {
    let source = MemoryCandleSource::new().with_series("BTCUSDT", Timeframe::M5, common::trending(120));
    let scanner = BatchScanner::new(
        SignalEngine::new(EngineConfig::default()),
        Arc::new(source),
        primary_only(),
    );
    let report = scanner.scan(&["BTCUSDT".to_string()]).await;

    let json = serde_json::to_value(&report).unwrap();
    assert!(json.get("noTrade").is_some());
    assert_eq!(json["signals"][0]["side"], "LONG");
    assert_eq!(json["signals"][0]["rule"], "trend_continuation");
    assert!(json["signals"][0].get("entryPrice").is_some());
}
