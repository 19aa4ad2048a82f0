//! Concurrent scan across many instruments with a global ranking.

use crate::config::BatchConfig;
use crate::error::{Result, SignalError};
use crate::services::signals::engine::{Evaluation, SignalEngine};
use crate::sources::{CandleSource, InstrumentUniverse};
use crate::types::{
    BatchReport, NoTradeInstrument, Series, SkipReason, SkippedInstrument, Timeframe,
};
use futures_util::future::try_join_all;
use futures_util::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Cheap to clone; every instrument runs on its own task with a clone.
#[derive(Clone)]
pub struct BatchScanner {
    engine: Arc<SignalEngine>,
    source: Arc<dyn CandleSource>,
    config: Arc<BatchConfig>,
}

impl BatchScanner {
    pub fn new(engine: Arc<SignalEngine>, source: Arc<dyn CandleSource>, config: BatchConfig) -> Self {
        Self {
            engine,
            source,
            config: Arc::new(config),
        }
    }

    /// Fetch one timeframe, bounded by the fetch timeout.
    async fn fetch(&self, instrument: &str, timeframe: Timeframe) -> Result<Series> {
        let timeout_ms = self.config.fetch_timeout_ms;
        let fetch = self
            .source
            .fetch(instrument, timeframe, self.config.candle_count);
        match tokio::time::timeout(Duration::from_millis(timeout_ms), fetch).await {
            Ok(result) => result,
            Err(_) => Err(SignalError::Timeout {
                instrument: instrument.to_string(),
                timeframe,
                timeout_ms,
            }),
        }
    }

    async fn scan_one(&self, instrument: &str) -> Result<Evaluation> {
        let primary = self.fetch(instrument, self.config.primary_timeframe).await?;
        let higher = try_join_all(self.config.higher_timeframes.iter().map(|tf| async move {
            let series = self.fetch(instrument, *tf).await?;
            Ok::<_, SignalError>((*tf, series))
        }))
        .await?;

        let now = chrono::Utc::now().timestamp_millis();
        self.engine.evaluate(instrument, &primary, &higher, now)
    }

    /// Run `scan_one` on a spawned task so a panic is contained to its
    /// instrument and reported as a retrieval failure.
    async fn scan_isolated(&self, instrument: String) -> Result<Evaluation> {
        let scanner = self.clone();
        let task_instrument = instrument.clone();
        let handle = tokio::spawn(async move { scanner.scan_one(&task_instrument).await });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Scan task for {} failed: {}", instrument, e);
                Err(SignalError::Retrieval {
                    instrument,
                    timeframe: self.config.primary_timeframe,
                    message: format!("scan task failed: {}", e),
                })
            }
        }
    }

    /// Scan `instruments` with at most `max_concurrency` in flight.
    ///
    /// Individual failures are recorded in the report and never abort the
    /// batch. Signals are ranked by confidence, ties kept in input order.
    pub async fn scan(&self, instruments: &[String]) -> BatchReport {
        let started_at = chrono::Utc::now().timestamp_millis();

        let mut results: Vec<(usize, String, Result<Evaluation>)> =
            stream::iter(instruments.iter().enumerate())
                .map(|(index, instrument)| async move {
                    let instrument = instrument.to_uppercase();
                    let result = self.scan_isolated(instrument.clone()).await;
                    (index, instrument, result)
                })
                .buffer_unordered(self.config.max_concurrency.max(1))
                .collect()
                .await;
        results.sort_by_key(|(index, _, _)| *index);

        let mut report = BatchReport {
            instruments: instruments.len(),
            started_at,
            ..Default::default()
        };

        for (_, instrument, result) in results {
            match result {
                Ok(evaluation) => {
                    if let Some(reason) = evaluation.no_trade_reason() {
                        report.no_trade.push(NoTradeInstrument {
                            instrument: instrument.clone(),
                            reason: reason.clone(),
                        });
                    }
                    report.signals.extend(evaluation.signals);
                    report.suppressed.extend(evaluation.suppressed);
                }
                Err(err) => {
                    warn!("Skipping {}: {}", instrument, err);
                    let reason = match err {
                        SignalError::InsufficientHistory { required, actual } => {
                            SkipReason::InsufficientHistory { required, actual }
                        }
                        other => SkipReason::Retrieval {
                            message: other.to_string(),
                        },
                    };
                    report.skipped.push(SkippedInstrument { instrument, reason });
                }
            }
        }

        // Stable sort keeps input order among equal confidences.
        report.signals.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        report.finished_at = chrono::Utc::now().timestamp_millis();

        info!(
            "Scanned {} instruments in {}ms: {} signals, {} suppressed, {} no-trade, {} skipped",
            report.instruments,
            report.finished_at - report.started_at,
            report.signals.len(),
            report.suppressed.len(),
            report.no_trade.len(),
            report.skipped.len()
        );

        report
    }

    /// Ask `universe` for the `limit` most liquid instruments and scan them.
    pub async fn scan_top(
        &self,
        universe: &dyn InstrumentUniverse,
        limit: usize,
    ) -> Result<BatchReport> {
        let instruments = universe.top_instruments(limit).await?;
        info!("Universe returned {} instruments", instruments.len());
        Ok(self.scan(&instruments).await)
    }
}
